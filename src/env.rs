//! Process environment normalization
//!
//! On Unix the installer re-executes itself once with a scrubbed
//! environment, so hook scripts and probes never see the caller's locale,
//! aliases or build variables. The re-executed process is recognised by
//! `ENVCLEANED` being set.

use std::ffi::OsString;

use crate::error::Result;

/// Marks a process that already runs in the cleaned environment
pub const ENV_CLEANED: &str = "ENVCLEANED";

/// Variables carried over into the cleaned environment when set
pub const PRESERVED_ENVS: [&str; 9] = [
    "HOME",
    "TERM",
    "ICECC_PATH",
    "http_proxy",
    "https_proxy",
    "ftp_proxy",
    "no_proxy",
    "all_proxy",
    "GIT_PROXY_COMMAND",
];

/// Log filter override, kept so `RUST_LOG` still applies after re-executing
const LOG_FILTER_ENV: &str = "RUST_LOG";

const EXTRA_PATH_ENTRIES: [&str; 2] = ["/usr/sbin", "/sbin"];

/// Drop `.` and empty entries, then make sure the sbin directories are present
pub fn sanitize_path(path: &str) -> String {
    let mut entries: Vec<&str> = path
        .split(':')
        .filter(|entry| !entry.is_empty() && *entry != ".")
        .collect();
    for extra in EXTRA_PATH_ENTRIES {
        if !entries.contains(&extra) {
            entries.push(extra);
        }
    }
    entries.join(":")
}

/// The complete environment of the re-executed process
pub fn clean_environment(
    lookup: impl Fn(&str) -> Option<OsString>,
) -> Vec<(OsString, OsString)> {
    let mut vars = vec![
        (OsString::from(ENV_CLEANED), OsString::from("1")),
        (OsString::from("LC_ALL"), OsString::from("en_US.UTF8")),
    ];
    if let Some(filter) = lookup(LOG_FILTER_ENV) {
        vars.push((OsString::from(LOG_FILTER_ENV), filter));
    }
    for name in PRESERVED_ENVS {
        if let Some(value) = lookup(name) {
            vars.push((OsString::from(name), value));
        }
    }
    let path = lookup("PATH").unwrap_or_default();
    vars.push((
        OsString::from("PATH"),
        OsString::from(sanitize_path(&path.to_string_lossy())),
    ));
    vars
}

/// Re-execute in the cleaned environment unless that already happened
///
/// Only returns on Windows, in the re-executed process, or on failure.
#[cfg(unix)]
pub fn normalize_environment() -> Result<()> {
    use std::os::unix::process::CommandExt;

    if std::env::var_os(ENV_CLEANED).is_some() {
        return Ok(());
    }

    let exe = std::env::current_exe()?;
    let vars = clean_environment(|name| std::env::var_os(name));
    tracing::debug!("Re-executing '{}' with a cleaned environment", exe.display());

    let err = std::process::Command::new(&exe)
        .args(std::env::args_os().skip(1))
        .env_clear()
        .envs(vars)
        .exec();
    Err(crate::error::InstallerError::CommandSpawnFailed {
        command: exe.display().to_string(),
        reason: err.to_string(),
    })
}

#[cfg(not(unix))]
pub fn normalize_environment() -> Result<()> {
    Ok(())
}
