//! External command execution
//!
//! Version probes and hook scripts run through here so that every command is
//! logged the same way and failures map onto the same error variants.

use std::process::{Command, ExitStatus, Stdio};

use crate::error::{InstallerError, Result};

fn describe(program: &str, args: &[&str]) -> String {
    std::iter::once(program)
        .chain(args.iter().copied())
        .collect::<Vec<_>>()
        .join(" ")
}

fn status_text(status: ExitStatus) -> String {
    match status.code() {
        Some(code) => format!("exit code {code}"),
        None => "a signal".to_string(),
    }
}

fn spawn_failed(command: String, err: &std::io::Error) -> InstallerError {
    InstallerError::CommandSpawnFailed {
        command,
        reason: err.to_string(),
    }
}

/// Run a command with inherited stdio, failing on a non-zero exit
pub fn run_command(program: &str, args: &[&str]) -> Result<()> {
    let command = describe(program, args);
    tracing::info!("Running '{command}'");

    let status = Command::new(program)
        .args(args)
        .status()
        .map_err(|e| spawn_failed(command.clone(), &e))?;

    if !status.success() {
        tracing::info!("Command failed with {}", status_text(status));
        return Err(InstallerError::CommandFailed {
            command,
            status: status_text(status),
        });
    }
    Ok(())
}

/// Run a command and return its standard output
///
/// Standard error is passed through so the tool's own diagnostics reach
/// the user.
pub fn capture_command(program: &str, args: &[&str]) -> Result<String> {
    let command = describe(program, args);
    tracing::info!("Running '{command}'");

    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stderr(Stdio::inherit())
        .output()
        .map_err(|e| spawn_failed(command.clone(), &e))?;

    if !output.status.success() {
        tracing::info!("Command failed with {}", status_text(output.status));
        return Err(InstallerError::CommandFailed {
            command,
            status: status_text(output.status),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn test_capture_stdout() {
        let output = capture_command("/bin/sh", &["-c", "echo 5.15.0-91-generic"]).unwrap();
        assert_eq!(output.trim_end(), "5.15.0-91-generic");
    }

    #[test]
    fn test_nonzero_exit_is_failure() {
        let result = run_command("/bin/sh", &["-c", "exit 3"]);
        match result {
            Err(InstallerError::CommandFailed { command, status }) => {
                assert_eq!(command, "/bin/sh -c exit 3");
                assert_eq!(status, "exit code 3");
            }
            other => panic!("expected CommandFailed, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_program() {
        let result = capture_command("/nonexistent/sdk-installer-probe", &[]);
        assert!(matches!(
            result,
            Err(InstallerError::CommandSpawnFailed { .. })
        ));
    }
}
