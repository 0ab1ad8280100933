mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use taskrunner::config::{RunnerConfig, ServiceIdentity};
use taskrunner::control::ServiceManager;
use taskrunner::paths::ServicePaths;
use taskrunner::service;

fn main() {
    // Initialize logger with the same format in CLI and service mode
    env_logger::Builder::new()
        .format(|buf, record| {
            use std::io::Write;
            writeln!(
                buf,
                "[{} {} {}:{}] {}",
                buf.timestamp_millis(),
                record.level(),
                record.file().unwrap_or("unknown"),
                record.line().unwrap_or(0),
                record.args()
            )
        })
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    let args = cli::Args::parse();
    if let Err(e) = real_main(args.sub) {
        eprintln!("{e:#}");
        std::process::exit(1);
    }
}

fn real_main(cmd: cli::Cmd) -> Result<()> {
    let identity = ServiceIdentity::default();

    match cmd {
        cli::Cmd::Run => {
            let paths = ServicePaths::detect(identity);
            service::run(&paths, &RunnerConfig::default()).context("Failed to run service")
        }
        cli::Cmd::Install { system } => {
            let manager = ServiceManager::for_current_os(identity);
            let installed = if system {
                manager.install_system()
            } else {
                manager.install()
            };
            installed.context("Failed to install service")?;
            println!("Service installed successfully");
            Ok(())
        }
        cli::Cmd::Uninstall => {
            ServiceManager::for_current_os(identity)
                .uninstall()
                .context("Failed to uninstall service")?;
            println!("Service uninstalled successfully");
            Ok(())
        }
        cli::Cmd::Start => {
            ServiceManager::for_current_os(identity)
                .start()
                .context("Failed to start service")?;
            println!("Service started successfully");
            Ok(())
        }
        cli::Cmd::Stop => {
            ServiceManager::for_current_os(identity)
                .stop()
                .context("Failed to stop service")?;
            println!("Service stopped successfully");
            Ok(())
        }
        cli::Cmd::Status { json } => handle_status(identity, json),
        cli::Cmd::Logs { bytes } => {
            let paths = ServicePaths::detect(identity);
            let text = service::read_log(&paths, bytes).context("Failed to read logs")?;
            print!("{text}");
            Ok(())
        }
    }
}

fn handle_status(identity: ServiceIdentity, json: bool) -> Result<()> {
    let status = ServiceManager::for_current_os(identity)
        .status()
        .context("Failed to get service status")?;

    if json {
        let report = serde_json::to_string_pretty(&status.report())
            .context("Failed to serialize service status")?;
        println!("{report}");
    } else {
        println!("Service status: {status}");
    }
    Ok(())
}
