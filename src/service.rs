//! Service mode: what the native manager actually launches (`<binary> run`).

pub mod heartbeat;
pub mod rolling_log;
pub mod signals;

use log::info;

use crate::config::RunnerConfig;
use crate::error::Result;
use crate::install::file_ops;
use crate::paths::ServicePaths;

pub use heartbeat::Heartbeat;
pub use rolling_log::{RollingLog, open_rolling, tail_log};

/// Bytes of the runner log shown by `logs` when no size is given
pub const DEFAULT_TAIL_BYTES: u64 = 2000;

/// Heartbeat into `~/.<name>/<name>.log` until SIGINT/SIGTERM
pub fn run(paths: &ServicePaths, config: &RunnerConfig) -> Result<()> {
    file_ops::create_dir_all(&paths.data_dir()?)?;
    let log_path = paths.runner_log()?;
    let log_file = open_rolling(&log_path, config.rotation)?;

    signals::install_handlers()?;
    info!("runner logging to {}", log_path.display());

    Heartbeat::new(log_file, config.heartbeat_interval, config.signal_poll_interval)
        .run(signals::check_signals)
}

/// Tail of the runner's own log
pub fn read_log(paths: &ServicePaths, max_bytes: u64) -> Result<String> {
    tail_log(&paths.runner_log()?, max_bytes)
}
