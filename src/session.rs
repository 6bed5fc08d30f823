//! Per-run install state
//!
//! An [`InstallSession`] is created once the destination is known and is
//! handed explicitly to the extractor and the relocator. The destination is
//! resolved and validated when the session is built, so an invalid path is
//! rejected before anything touches the filesystem.

use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};

use crate::error::{InstallerError, Result};
use crate::progress::CheckpointCounter;

/// Longest destination path accepted
pub const MAX_DESTINATION_LEN: usize = 2048;

/// State shared by the extraction and relocation steps of one install
#[derive(Debug)]
pub struct InstallSession {
    destination: PathBuf,
    exclude: Vec<String>,
    progress: CheckpointCounter,
    relocate: bool,
    save_scripts: bool,
}

impl InstallSession {
    /// Create a session for an already resolved destination
    pub fn new(
        destination: PathBuf,
        exclude: Vec<String>,
        relocate: bool,
        save_scripts: bool,
    ) -> Result<Self> {
        validate_destination(&destination)?;
        Ok(Self {
            destination,
            exclude,
            progress: CheckpointCounter::new(),
            relocate,
            save_scripts,
        })
    }

    pub fn destination(&self) -> &Path {
        &self.destination
    }

    /// Destination as the text written into relocated scripts
    pub fn destination_str(&self) -> String {
        self.destination.to_string_lossy().into_owned()
    }

    pub fn relocate(&self) -> bool {
        self.relocate
    }

    pub fn save_scripts(&self) -> bool {
        self.save_scripts
    }

    /// Whether an entry name contains any excluded fragment
    ///
    /// Matching is on raw substrings, so excluding `sstate-cache` drops the
    /// whole subtree of that name wherever it appears.
    pub fn is_excluded(&self, name: &str) -> bool {
        self.exclude.iter().any(|fragment| name.contains(fragment.as_str()))
    }

    /// Account for an extracted entry; returns the progress ticks now due
    pub fn record_extracted(&mut self, size: u64) -> u64 {
        self.progress.add(size)
    }

    pub fn bytes_extracted(&self) -> u64 {
        self.progress.bytes()
    }

    pub fn checkpoints(&self) -> u64 {
        self.progress.checkpoints()
    }
}

/// Reject destinations that are too long or contain whitespace
pub fn validate_destination(path: &Path) -> Result<()> {
    let text = path.to_string_lossy();
    let length = text.chars().count();
    if length > MAX_DESTINATION_LEN {
        return Err(InstallerError::DestinationTooLong {
            length,
            limit: MAX_DESTINATION_LEN,
        });
    }
    if text.chars().any(char::is_whitespace) {
        return Err(InstallerError::DestinationWhitespace {
            path: text.into_owned(),
        });
    }
    Ok(())
}

/// Turn user input into an absolute, symlink-free destination path
///
/// A leading `~` is expanded, the path is made absolute and normalized, and
/// the longest existing ancestor is canonicalized. The destination itself
/// does not need to exist.
pub fn resolve_destination(input: &str) -> Result<PathBuf> {
    let expanded = expand_home(input);
    let absolute =
        std::path::absolute(&expanded).map_err(|e| InstallerError::DestinationResolveFailed {
            path: input.to_string(),
            reason: e.to_string(),
        })?;
    Ok(canonicalize_existing_prefix(&normalize_lexically(&absolute)))
}

fn expand_home(input: &str) -> PathBuf {
    let home_relative = input
        .strip_prefix("~/")
        .or_else(|| (input == "~").then_some(""));
    match (home_relative, dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(input),
    }
}

fn normalize_lexically(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

fn canonicalize_existing_prefix(path: &Path) -> PathBuf {
    let mut missing: Vec<OsString> = Vec::new();
    let mut existing = path;
    loop {
        if let Ok(mut resolved) = dunce::canonicalize(existing) {
            for name in missing.iter().rev() {
                resolved.push(name);
            }
            return resolved;
        }
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                missing.push(name.to_os_string());
                existing = parent;
            }
            _ => return path.to_path_buf(),
        }
    }
}
