//! Install, control and run a background task runner as a native OS service.
//!
//! [`control::ServiceManager`] hides systemd, launchd and the Windows SCM
//! behind one lifecycle contract; [`service::run`] is what those managers
//! launch.

pub mod config;
pub mod control;
pub mod error;
pub mod install;
pub mod paths;
pub mod process;
pub mod service;

pub use config::{RotationPolicy, RunnerConfig, ServiceIdentity};
pub use control::{ServiceControl, ServiceManager, ServiceStatus};
pub use error::{Result, ServiceError};
pub use paths::{Scope, ServicePaths};
