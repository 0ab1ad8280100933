use clap::{Parser, Subcommand};

use taskrunner::service::DEFAULT_TAIL_BYTES;

#[derive(Parser, Debug)]
#[command(version, about = "Background task runner and its service manager")]
pub struct Args {
    #[command(subcommand)]
    pub sub: Cmd,
}

#[derive(Subcommand, Debug)]
pub enum Cmd {
    /// Run as a service (invoked by the native service manager)
    Run,
    /// Install the service (never starts it)
    Install {
        /// Install machine-wide, running as the invoking user
        #[arg(long)]
        system: bool,
    },
    /// Uninstall the service from every scope it is installed in
    Uninstall,
    /// Start the service
    Start,
    /// Stop the service
    Stop,
    /// Check service status
    Status {
        /// Print machine-readable JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the tail of the runner's log
    Logs {
        /// Number of trailing bytes to print
        #[arg(long, default_value_t = DEFAULT_TAIL_BYTES)]
        bytes: u64,
    },
}
