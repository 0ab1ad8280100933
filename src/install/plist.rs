//! launchd plist file generation.

use std::path::Path;

use ::plist::{Dictionary, Value};

use crate::config::ServiceIdentity;
use crate::error::{Result, ServiceError};

/// Inputs for one launchd job description
#[derive(Debug, Clone)]
pub(crate) struct LaunchdJob<'a> {
    pub program: &'a Path,
    pub stdout: &'a Path,
    pub stderr: &'a Path,
    /// `UserName` for LaunchDaemons; `None` for LaunchAgents
    pub user_name: Option<&'a str>,
}

/// Render the job as an XML plist.
///
/// No `RunAtLoad`/`KeepAlive`: registering the job must not start it, start
/// is an explicit operation.
pub(crate) fn generate_plist(identity: &ServiceIdentity, job: &LaunchdJob<'_>) -> Result<Vec<u8>> {
    let mut plist = Dictionary::new();

    plist.insert("Label".to_string(), Value::String(identity.name.clone()));

    let program_args = vec![
        Value::String(job.program.display().to_string()),
        Value::String("run".to_string()),
    ];
    plist.insert("ProgramArguments".to_string(), Value::Array(program_args));

    if let Some(user) = job.user_name {
        plist.insert("UserName".to_string(), Value::String(user.to_string()));
    }

    plist.insert(
        "StandardOutPath".to_string(),
        Value::String(job.stdout.display().to_string()),
    );
    plist.insert(
        "StandardErrorPath".to_string(),
        Value::String(job.stderr.display().to_string()),
    );

    let mut buf = Vec::new();
    ::plist::to_writer_xml(&mut buf, &Value::Dictionary(plist))
        .map_err(|e| ServiceError::io("failed to generate plist", std::io::Error::other(e)))?;
    Ok(buf)
}
