//! The runner's main loop: a startup line, a heartbeat on every tick and a
//! farewell line once a shutdown signal is polled.

use std::io::Write;
use std::time::Duration;

use chrono::{DateTime, Utc};
use crossbeam_channel::{select, tick};

use crate::error::{Result, ServiceError};

/// `YYYY-MM-DD HH:MM:SS: <message>` in UTC
pub fn format_line(at: DateTime<Utc>, message: &str) -> String {
    format!("{}: {message}\n", at.format("%Y-%m-%d %H:%M:%S"))
}

pub struct Heartbeat<W: Write> {
    out: W,
    interval: Duration,
    signal_poll: Duration,
}

impl<W: Write> Heartbeat<W> {
    pub fn new(out: W, interval: Duration, signal_poll: Duration) -> Self {
        Self {
            out,
            interval,
            signal_poll,
        }
    }

    fn log(&mut self, message: &str) -> Result<()> {
        let line = format_line(Utc::now(), message);
        self.out
            .write_all(line.as_bytes())
            .and_then(|()| self.out.flush())
            .map_err(|e| ServiceError::io("failed to write runner log", e))
    }

    /// Run until `shutdown` yields the name of a received signal
    pub fn run(&mut self, mut shutdown: impl FnMut() -> Option<String>) -> Result<()> {
        self.log("Service started")?;

        let heartbeat_tick = tick(self.interval);
        let sig_tick = tick(self.signal_poll);
        let mut first_tick = true;

        loop {
            select! {
                recv(heartbeat_tick) -> _ => {
                    if first_tick {
                        self.log("I'm alive")?;
                        first_tick = false;
                    } else {
                        self.log("Staying alive")?;
                    }
                }
                recv(sig_tick) -> _ => {
                    if let Some(sig) = shutdown() {
                        log::info!("signal {sig} - orderly shutdown");
                        self.log(&format!("Received signal: {sig}, shutting down. Bye!"))?;
                        return Ok(());
                    }
                }
            }
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}
