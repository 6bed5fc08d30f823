//! Error types and handling for the SDK installer
//!
//! Uses `thiserror` for error definitions and `miette` for pretty diagnostics.
//!
//! Every error is fatal to the run. Variants fall into four families:
//! - precondition failures (host compatibility, destination validation),
//!   raised before anything is written
//! - permission failures raised while extracting
//! - external tool failures (version probes and hook scripts)
//! - the user declining a prompt

use miette::Diagnostic;
use thiserror::Error;

/// Main error type for installer operations
#[derive(Error, Diagnostic, Debug)]
pub enum InstallerError {
    // Compatibility errors
    #[error("The SDK needs a kernel > {required}")]
    #[diagnostic(
        code(sdk_installer::compat::kernel_too_old),
        help("Your kernel is {found}. Install on a newer host.")
    )]
    KernelTooOld { found: String, required: String },

    #[error(
        "Incompatible SDK installer! Your host is {host} and this SDK was built for {sdk} hosts."
    )]
    #[diagnostic(code(sdk_installer::compat::arch))]
    IncompatibleArch { host: String, sdk: String },

    #[error(
        "Incompatible SDK installer! Your host gcc version is {host} and this SDK was built by gcc higher version."
    )]
    #[diagnostic(code(sdk_installer::compat::compiler))]
    IncompatibleCompiler { host: String },

    // Destination errors
    #[error("The target directory path is too long!!!")]
    #[diagnostic(
        code(sdk_installer::destination::too_long),
        help("Paths are limited to {limit} characters")
    )]
    DestinationTooLong { length: usize, limit: usize },

    #[error("The target directory path ({path}) contains whitespace. Abort!")]
    #[diagnostic(code(sdk_installer::destination::whitespace))]
    DestinationWhitespace { path: String },

    #[error("Failed to resolve target directory '{path}': {reason}")]
    #[diagnostic(code(sdk_installer::destination::resolve_failed))]
    DestinationResolveFailed { path: String, reason: String },

    // Permission errors
    #[error("Permission denied: {path}: {reason}")]
    #[diagnostic(
        code(sdk_installer::fs::permission_denied),
        help("Please try re-running with {remedy}")
    )]
    PermissionDenied {
        path: String,
        reason: String,
        remedy: &'static str,
    },

    // External tool errors
    #[error("Command '{command}' failed with {status}")]
    #[diagnostic(code(sdk_installer::command::failed))]
    CommandFailed { command: String, status: String },

    #[error("Failed to run '{command}': {reason}")]
    #[diagnostic(
        code(sdk_installer::command::spawn_failed),
        help("Check that the program is installed and on PATH")
    )]
    CommandSpawnFailed { command: String, reason: String },

    #[error("{hook} script failed with {status}")]
    #[diagnostic(code(sdk_installer::hook::failed))]
    HookFailed { hook: String, status: String },

    // Payload errors
    #[error("Failed to open installer payload: {path}")]
    #[diagnostic(
        code(sdk_installer::payload::open_failed),
        help("Pass the SDK payload with --payload, or run the self-extracting installer")
    )]
    PayloadOpenFailed { path: String, reason: String },

    #[error("Installer payload has no member '{name}'")]
    #[diagnostic(code(sdk_installer::payload::member_missing))]
    PayloadMemberMissing { name: String },

    #[error("Failed to parse installer manifest: {reason}")]
    #[diagnostic(code(sdk_installer::payload::manifest_invalid))]
    ManifestParseFailed { reason: String },

    #[error("Failed to read SDK archive: {reason}")]
    #[diagnostic(code(sdk_installer::payload::archive_read_failed))]
    ArchiveReadFailed { reason: String },

    // File system errors
    #[error("Failed to read file: {path}")]
    #[diagnostic(code(sdk_installer::fs::read_failed))]
    FileReadFailed { path: String, reason: String },

    #[error("Failed to write file: {path}: {reason}")]
    #[diagnostic(code(sdk_installer::fs::write_failed))]
    FileWriteFailed { path: String, reason: String },

    #[error("IO error: {message}")]
    #[diagnostic(code(sdk_installer::fs::io_error))]
    IoError { message: String },

    // Interaction
    #[error("Failed to read answer: {reason}")]
    #[diagnostic(code(sdk_installer::prompt::failed))]
    PromptFailed { reason: String },

    #[error("Installation aborted!")]
    #[diagnostic(code(sdk_installer::aborted))]
    Aborted,
}

impl InstallerError {
    /// Remediation for permission failures on this platform
    pub fn privilege_remedy() -> &'static str {
        if cfg!(windows) {
            "Administrative privileges"
        } else {
            "'sudo'"
        }
    }

    /// Build a write error, promoting permission failures to [`InstallerError::PermissionDenied`]
    pub fn write_failed(path: &std::path::Path, err: &std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::PermissionDenied {
            return InstallerError::PermissionDenied {
                path: path.display().to_string(),
                reason: err.to_string(),
                remedy: Self::privilege_remedy(),
            };
        }
        InstallerError::FileWriteFailed {
            path: path.display().to_string(),
            reason: err.to_string(),
        }
    }

    /// Build a read error for a file
    pub fn read_failed(path: &std::path::Path, err: &std::io::Error) -> Self {
        InstallerError::FileReadFailed {
            path: path.display().to_string(),
            reason: err.to_string(),
        }
    }
}

impl From<std::io::Error> for InstallerError {
    fn from(err: std::io::Error) -> Self {
        InstallerError::IoError {
            message: err.to_string(),
        }
    }
}

impl From<serde_yaml::Error> for InstallerError {
    fn from(err: serde_yaml::Error) -> Self {
        InstallerError::ManifestParseFailed {
            reason: err.to_string(),
        }
    }
}

impl From<zip::result::ZipError> for InstallerError {
    fn from(err: zip::result::ZipError) -> Self {
        InstallerError::ArchiveReadFailed {
            reason: err.to_string(),
        }
    }
}

impl From<inquire::InquireError> for InstallerError {
    fn from(err: inquire::InquireError) -> Self {
        match err {
            inquire::InquireError::OperationCanceled
            | inquire::InquireError::OperationInterrupted => InstallerError::Aborted,
            other => InstallerError::PromptFailed {
                reason: other.to_string(),
            },
        }
    }
}

/// Result type alias using miette for error handling
pub type Result<T> = miette::Result<T, InstallerError>;
