use std::time::Duration;

/// Fixed identifiers of the managed service.
///
/// `name` is used verbatim in every unit name, plist label, SCM service name and
/// derived path. Changing it orphans descriptors installed under the old name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceIdentity {
    pub name: String,
    pub display_name: String,
    pub description: String,
    /// File name of the installed binary copy (macOS)
    pub binary_name: String,
}

impl Default for ServiceIdentity {
    fn default() -> Self {
        Self {
            name: "taskrunner".to_string(),
            display_name: "Task Runner Service".to_string(),
            description: "Background task runner".to_string(),
            binary_name: "taskrunner".to_string(),
        }
    }
}

impl ServiceIdentity {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            binary_name: name.clone(),
            name,
            ..Self::default()
        }
    }

    /// systemd unit name (`<name>.service`)
    pub fn unit_name(&self) -> String {
        format!("{}.service", self.name)
    }

    /// Hidden per-user directory holding the runner's own log files
    pub fn data_dir_name(&self) -> String {
        format!(".{}", self.name)
    }
}

/// Rotation policy of the runner's own log file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RotationPolicy {
    pub max_size_bytes: u64,
    pub max_backups: usize,
    pub max_age: Duration,
    pub compress: bool,
}

impl Default for RotationPolicy {
    fn default() -> Self {
        Self {
            max_size_bytes: 5 * 1024 * 1024,
            max_backups: 3,
            max_age: Duration::from_secs(28 * 24 * 60 * 60),
            compress: true,
        }
    }
}

/// Behaviour of `run` mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunnerConfig {
    pub heartbeat_interval: Duration,
    /// How often the signal flag is polled
    pub signal_poll_interval: Duration,
    pub rotation: RotationPolicy,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(10),
            signal_poll_interval: Duration::from_millis(200),
            rotation: RotationPolicy::default(),
        }
    }
}
