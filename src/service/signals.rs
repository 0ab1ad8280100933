//! Polling-based shutdown signal handling.
//!
//! The handler only stores the signal number in an atomic; the runner loop
//! polls it with [`check_signals`] on its own tick.

use std::sync::atomic::{AtomicI32, Ordering};

use crate::error::Result;

static RECEIVED_SIGNAL: AtomicI32 = AtomicI32::new(0);

/// Name of a received shutdown signal, or `None`. Consumes the signal.
pub fn check_signals() -> Option<String> {
    match RECEIVED_SIGNAL.swap(0, Ordering::AcqRel) {
        0 => None,
        raw => Some(signal_name(raw)),
    }
}

cfg_if::cfg_if! {
    if #[cfg(unix)] {
        use nix::sys::signal::{self, SaFlags, SigAction, SigHandler, SigSet, Signal};

        use crate::error::ServiceError;

        extern "C" fn handler(sig: i32) {
            RECEIVED_SIGNAL.store(sig, Ordering::SeqCst);
        }

        /// Route SIGINT and SIGTERM to the polled flag
        pub fn install_handlers() -> Result<()> {
            let action = SigAction::new(SigHandler::Handler(handler), SaFlags::empty(), SigSet::empty());
            for sig in [Signal::SIGINT, Signal::SIGTERM] {
                // SAFETY: the handler only performs an atomic store
                unsafe { signal::sigaction(sig, &action) }.map_err(|e| {
                    ServiceError::io(format!("failed to register {sig} handler"), e.into())
                })?;
            }
            Ok(())
        }

        fn signal_name(raw: i32) -> String {
            Signal::try_from(raw)
                .map(|sig| sig.as_str().to_string())
                .unwrap_or_else(|_| format!("signal {raw}"))
        }
    } else if #[cfg(windows)] {
        use windows::core::BOOL;
        use windows::Win32::System::Console::{
            CTRL_BREAK_EVENT, CTRL_C_EVENT, CTRL_CLOSE_EVENT, CTRL_LOGOFF_EVENT,
            CTRL_SHUTDOWN_EVENT, SetConsoleCtrlHandler,
        };

        use crate::error::ServiceError;

        // console events start at 0, so store them offset by one
        unsafe extern "system" fn handler(event: u32) -> BOOL {
            RECEIVED_SIGNAL.store(event as i32 + 1, Ordering::SeqCst);
            BOOL::from(true)
        }

        /// Route console control events (Ctrl+C, close, shutdown) to the polled flag
        pub fn install_handlers() -> Result<()> {
            // SAFETY: the handler only performs an atomic store
            unsafe { SetConsoleCtrlHandler(Some(handler), true) }.map_err(|e| {
                ServiceError::io(
                    "failed to register console control handler",
                    std::io::Error::other(e),
                )
            })
        }

        fn signal_name(raw: i32) -> String {
            let event = (raw - 1) as u32;
            let name = match event {
                e if e == CTRL_C_EVENT => "CTRL_C_EVENT",
                e if e == CTRL_BREAK_EVENT => "CTRL_BREAK_EVENT",
                e if e == CTRL_CLOSE_EVENT => "CTRL_CLOSE_EVENT",
                e if e == CTRL_LOGOFF_EVENT => "CTRL_LOGOFF_EVENT",
                e if e == CTRL_SHUTDOWN_EVENT => "CTRL_SHUTDOWN_EVENT",
                _ => return format!("console event {event}"),
            };
            name.to_string()
        }
    } else {
        pub fn install_handlers() -> Result<()> {
            Ok(())
        }

        fn signal_name(raw: i32) -> String {
            format!("signal {raw}")
        }
    }
}

/// Serialises tests that share the process-wide signal flag
#[cfg(test)]
pub(crate) static TEST_SIGNAL_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

/// Record `raw` as if its handler had fired
#[cfg(test)]
pub(crate) fn simulate(raw: i32) {
    RECEIVED_SIGNAL.store(raw, Ordering::SeqCst);
}
