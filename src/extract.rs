//! Streaming extraction of the SDK archive
//!
//! Entries are materialized in archive order straight from the stream. Any
//! existing non-directory at an entry's path (including a symlink to a
//! directory) is unlinked first, so extraction never writes through a stale
//! or planted link to somewhere outside the destination.

use std::fs;
use std::io::Write;
use std::path::{Component, Path, PathBuf};

use tracing::debug;

use crate::error::{InstallerError, Result};
use crate::payload::{ArchiveEntry, EntryInfo, SdkArchive};
use crate::session::InstallSession;

fn archive_error(e: &std::io::Error) -> InstallerError {
    InstallerError::ArchiveReadFailed {
        reason: e.to_string(),
    }
}

/// Extract every non-excluded entry into the session destination
///
/// `on_progress` receives the number of new checkpoint ticks and the running
/// byte total whenever at least one checkpoint has been crossed. Returns the
/// total size of the extracted entries.
pub fn extract(
    archive: &mut SdkArchive<'_>,
    session: &mut InstallSession,
    mut on_progress: impl FnMut(u64, u64),
) -> Result<u64> {
    let destination = session.destination().to_path_buf();
    fs::create_dir_all(&destination).map_err(|e| InstallerError::write_failed(&destination, &e))?;

    for entry in archive.entries()? {
        let mut entry = entry.map_err(|e| archive_error(&e))?;
        let info = EntryInfo::read(&entry)?;

        if session.is_excluded(&info.name) {
            debug!("Skipping excluded '{}'", info.name);
            continue;
        }

        extract_entry(&mut entry, &info, &destination)?;

        let ticks = session.record_extracted(info.size);
        if ticks > 0 {
            on_progress(ticks, session.bytes_extracted());
        }
    }

    Ok(session.bytes_extracted())
}

/// Write the names of the entries that would be extracted, without extracting
pub fn list(
    archive: &mut SdkArchive<'_>,
    session: &InstallSession,
    out: &mut impl Write,
) -> Result<usize> {
    let mut listed = 0;
    for entry in archive.entries()? {
        let entry = entry.map_err(|e| archive_error(&e))?;
        let info = EntryInfo::read(&entry)?;
        if session.is_excluded(&info.name) {
            continue;
        }
        writeln!(out, "{}", info.listing())?;
        listed += 1;
    }
    Ok(listed)
}

fn extract_entry(entry: &mut ArchiveEntry<'_, '_>, info: &EntryInfo, destination: &Path) -> Result<()> {
    let dest = entry_destination(destination, &info.name)?;
    if dest == destination {
        return Ok(());
    }

    remove_conflicting(&dest)?;

    debug!("Extracting '{}'", dest.display());
    let unpacked = entry
        .unpack_in(destination)
        .map_err(|e| InstallerError::write_failed(&dest, &e))?;
    if !unpacked {
        debug!("Refused to unpack '{}'", info.name);
    }
    Ok(())
}

/// Join an archive name onto the destination, refusing to leave it
fn entry_destination(destination: &Path, name: &str) -> Result<PathBuf> {
    let mut dest = destination.to_path_buf();
    for component in Path::new(name).components() {
        match component {
            Component::Normal(part) => dest.push(part),
            Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
            Component::ParentDir => {
                return Err(InstallerError::ArchiveReadFailed {
                    reason: format!("refusing to extract '{name}' outside the destination"),
                });
            }
        }
    }
    Ok(dest)
}

/// Unlink whatever non-directory currently occupies `path`
///
/// Symlinks are removed without being followed, even when they point at a
/// directory.
fn remove_conflicting(path: &Path) -> Result<()> {
    let Ok(meta) = fs::symlink_metadata(path) else {
        return Ok(());
    };
    if meta.file_type().is_symlink() || !meta.is_dir() {
        debug!("Removing '{}'", path.display());
        fs::remove_file(path).map_err(|e| InstallerError::write_failed(path, &e))?;
    }
    Ok(())
}
