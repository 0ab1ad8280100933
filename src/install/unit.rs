//! systemd unit file generation.

use std::path::Path;

use crate::config::ServiceIdentity;

/// Account a system-scope unit runs as
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RunAs<'a> {
    pub user: &'a str,
    pub home: &'a Path,
}

/// Render the unit for `binary_path run`.
///
/// User units hang off `default.target`; system units run as `run_as` with
/// `HOME` pointing at that user's home and hang off `multi-user.target`.
pub(crate) fn render_unit(
    identity: &ServiceIdentity,
    binary_path: &Path,
    run_as: Option<&RunAs<'_>>,
) -> String {
    let mut content = String::with_capacity(512);

    content.push_str("[Unit]\n");
    content.push_str(&format!("Description={}\n", identity.display_name));
    content.push_str("After=network.target\n");
    content.push('\n');

    content.push_str("[Service]\n");
    content.push_str("Type=simple\n");
    if let Some(run_as) = run_as {
        content.push_str(&format!("User={}\n", run_as.user));
        content.push_str(&format!("Environment=\"HOME={}\"\n", run_as.home.display()));
    }
    content.push_str(&format!("ExecStart={} run\n", binary_path.display()));
    content.push_str("Restart=on-failure\n");
    content.push_str("RestartSec=10\n");
    content.push('\n');

    content.push_str("[Install]\n");
    if run_as.is_some() {
        content.push_str("WantedBy=multi-user.target\n");
    } else {
        content.push_str("WantedBy=default.target\n");
    }

    content
}
