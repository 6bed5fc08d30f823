//! Relocation of generated scripts
//!
//! The SDK is built for a fixed install path that ends up literally inside
//! its generated scripts. Relocation rewrites that path to the chosen
//! destination. Files are rewritten into a sibling temporary file which is
//! then renamed over the original, so a reader never observes a half-written
//! script.

use std::fs;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info};
use wax::{Glob, Pattern};

use crate::error::{InstallerError, Result};

/// Naming prefix shared by the generated environment scripts
pub const ENV_SETUP_PREFIX: &str = "environment-setup-";

/// Line content that marks the canonical environment setup script
pub const CANONICAL_MARKER: &str = "OECORE_NATIVE_SYSROOT=";

/// Relocation helpers removed after install unless scripts are kept
pub const RELOCATION_HELPERS: [&str; 2] = ["relocate_sdk.py", "relocate_sdk.sh"];

/// Replace every occurrence of `old_prefix` in `line` with `new_prefix`
///
/// Occurrences that are already part of `new_prefix` are left alone, which
/// keeps the rewrite stable when the new path extends the old one. The cost
/// is that when `new_prefix` contains `old_prefix`, text that already reads
/// as `new_prefix` is never rewritten, even on the first pass: relocating
/// `/opt/sdk` to `/opt/sdk/x` leaves `/opt/sdk/xyz` as it is.
pub fn relocate_line(line: &str, old_prefix: &str, new_prefix: &str) -> String {
    if old_prefix.is_empty() || old_prefix == new_prefix {
        return line.to_string();
    }
    if new_prefix.contains(old_prefix) {
        return line
            .split(new_prefix)
            .map(|part| part.replace(old_prefix, new_prefix))
            .collect::<Vec<_>>()
            .join(new_prefix);
    }
    line.replace(old_prefix, new_prefix)
}

/// Rewrite `old_prefix` to `new_prefix` throughout `path`
///
/// Returns whether the file carries [`CANONICAL_MARKER`]. Running this twice
/// with the same prefixes leaves the file as the first run produced it.
pub fn relocate_file(path: &Path, old_prefix: &str, new_prefix: &str) -> Result<bool> {
    info!("Relocating '{}'", path.display());

    let source = fs::File::open(path).map_err(|e| InstallerError::read_failed(path, &e))?;
    let permissions = source
        .metadata()
        .map_err(|e| InstallerError::read_failed(path, &e))?
        .permissions();

    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut tmp = tempfile::Builder::new()
        .prefix(&format!(".{file_name}."))
        .suffix(".tmp")
        .tempfile_in(parent)
        .map_err(|e| InstallerError::write_failed(parent, &e))?;

    let mut is_canonical = false;
    {
        let mut reader = BufReader::new(source);
        let mut writer = BufWriter::new(tmp.as_file_mut());
        let mut line = String::new();
        loop {
            line.clear();
            let read = reader
                .read_line(&mut line)
                .map_err(|e| InstallerError::read_failed(path, &e))?;
            if read == 0 {
                break;
            }
            if line.contains(CANONICAL_MARKER) {
                is_canonical = true;
            }
            writer
                .write_all(relocate_line(&line, old_prefix, new_prefix).as_bytes())
                .map_err(|e| InstallerError::write_failed(path, &e))?;
        }
        writer
            .flush()
            .map_err(|e| InstallerError::write_failed(path, &e))?;
    }

    fs::set_permissions(tmp.path(), permissions)
        .map_err(|e| InstallerError::write_failed(tmp.path(), &e))?;
    tmp.persist(path)
        .map_err(|e| InstallerError::write_failed(path, &e.error))?;

    Ok(is_canonical)
}

/// Generated environment scripts at the destination root, sorted by name
pub fn environment_setup_scripts(destination: &Path) -> Result<Vec<PathBuf>> {
    let entries = match fs::read_dir(destination) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(InstallerError::read_failed(destination, &e)),
    };

    let pattern = format!("{ENV_SETUP_PREFIX}*");
    let glob = Glob::new(&pattern).map_err(|e| InstallerError::IoError {
        message: format!("invalid script pattern '{pattern}': {e}"),
    })?;

    let mut scripts = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| InstallerError::read_failed(destination, &e))?;
        let name = entry.file_name();
        if glob.is_match(Path::new(&name)) && entry.path().is_file() {
            scripts.push(entry.path());
        }
    }
    scripts.sort();
    Ok(scripts)
}

/// Result of relocating the environment scripts of an install
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelocatedScripts {
    /// Every script that was rewritten, in name order
    pub scripts: Vec<PathBuf>,
    /// The last script found to carry the canonical marker
    pub canonical: Option<PathBuf>,
}

impl RelocatedScripts {
    /// Script to hand to hooks: the canonical one, else the last by name
    pub fn env_setup_script(&self) -> Option<&Path> {
        self.canonical
            .as_deref()
            .or_else(|| self.scripts.last().map(PathBuf::as_path))
    }
}

/// Relocate every environment setup script under `destination`
pub fn relocate_environment_scripts(
    destination: &Path,
    old_prefix: &str,
    new_prefix: &str,
) -> Result<RelocatedScripts> {
    let scripts = environment_setup_scripts(destination)?;
    let mut canonical = None;
    for script in &scripts {
        if relocate_file(script, old_prefix, new_prefix)? {
            canonical = Some(script.clone());
        }
    }
    if let Some(script) = &canonical {
        info!("Environment setup script is '{}'", script.display());
    }
    Ok(RelocatedScripts { scripts, canonical })
}

/// Delete the relocation helpers found in `dir`; missing ones are skipped
pub fn remove_relocation_helpers(dir: &Path) -> Vec<PathBuf> {
    let mut removed = Vec::new();
    for helper in RELOCATION_HELPERS {
        let path = dir.join(helper);
        info!("Deleting '{}'", path.display());
        match fs::remove_file(&path) {
            Ok(()) => removed.push(path),
            Err(e) => debug!("Could not delete '{}': {}", path.display(), e),
        }
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn temp_dir() -> TempDir {
        TempDir::new_in(crate::temp::temp_dir_base()).unwrap()
    }

    #[test]
    fn test_relocate_line_rewrites_sysroot() {
        assert_eq!(
            relocate_line(
                "OECORE_NATIVE_SYSROOT=/opt/sdk/sysroots/x86_64\n",
                "/opt/sdk",
                "/home/u/mysdk"
            ),
            "OECORE_NATIVE_SYSROOT=/home/u/mysdk/sysroots/x86_64\n"
        );
    }

    #[test]
    fn test_relocate_line_every_occurrence() {
        assert_eq!(
            relocate_line("PATH=/opt/sdk/bin:/opt/sdk/sbin:$PATH", "/opt/sdk", "/sdk"),
            "PATH=/sdk/bin:/sdk/sbin:$PATH"
        );
    }

    #[test]
    fn test_relocate_line_new_prefix_extends_old() {
        let once = relocate_line("SDK=/opt/sdk/sysroots", "/opt/sdk", "/opt/sdk2");
        assert_eq!(once, "SDK=/opt/sdk2/sysroots");
        assert_eq!(relocate_line(&once, "/opt/sdk", "/opt/sdk2"), once);
    }

    #[test]
    fn test_relocate_line_keeps_text_matching_new_prefix() {
        assert_eq!(
            relocate_line("X=/opt/sdk/xyz Y=/opt/sdk/bin", "/opt/sdk", "/opt/sdk/x"),
            "X=/opt/sdk/xyz Y=/opt/sdk/x/bin"
        );
    }

    #[test]
    fn test_relocate_line_empty_old_prefix_is_noop() {
        assert_eq!(relocate_line("abc", "", "/x"), "abc");
    }

    #[test]
    fn test_relocate_file_detects_marker() {
        let temp = temp_dir();
        let script = temp.path().join("environment-setup-core2-64-poky-linux");
        fs::write(
            &script,
            "export SDKTARGETSYSROOT=/opt/sdk/sysroots/core2-64\n\
             export OECORE_NATIVE_SYSROOT=/opt/sdk/sysroots/x86_64\n",
        )
        .unwrap();

        let canonical = relocate_file(&script, "/opt/sdk", "/home/u/mysdk").unwrap();

        assert!(canonical);
        assert_eq!(
            fs::read_to_string(&script).unwrap(),
            "export SDKTARGETSYSROOT=/home/u/mysdk/sysroots/core2-64\n\
             export OECORE_NATIVE_SYSROOT=/home/u/mysdk/sysroots/x86_64\n"
        );
    }

    #[test]
    fn test_relocate_file_is_idempotent() {
        let temp = temp_dir();
        let script = temp.path().join("environment-setup-a");
        fs::write(&script, "A=/opt/sdk/a\nB=/opt/sdk\nno trailing newline /opt/sdk").unwrap();

        relocate_file(&script, "/opt/sdk", "/home/u/mysdk").unwrap();
        let once = fs::read_to_string(&script).unwrap();
        relocate_file(&script, "/opt/sdk", "/home/u/mysdk").unwrap();
        let twice = fs::read_to_string(&script).unwrap();

        assert_eq!(once, twice);
        assert_eq!(
            once,
            "A=/home/u/mysdk/a\nB=/home/u/mysdk\nno trailing newline /home/u/mysdk"
        );
    }

    #[test]
    fn test_relocate_file_without_marker() {
        let temp = temp_dir();
        let script = temp.path().join("environment-setup-custom");
        fs::write(&script, "export FOO=/opt/sdk\n").unwrap();
        assert!(!relocate_file(&script, "/opt/sdk", "/srv/sdk").unwrap());
    }

    #[cfg(unix)]
    #[test]
    fn test_relocate_file_keeps_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let temp = temp_dir();
        let script = temp.path().join("post-relocate-setup.sh");
        fs::write(&script, "#!/bin/sh\necho /opt/sdk\n").unwrap();
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();

        relocate_file(&script, "/opt/sdk", "/srv/sdk").unwrap();

        let mode = fs::metadata(&script).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
    }

    #[test]
    fn test_relocate_file_leaves_no_temp_files() {
        let temp = temp_dir();
        let script = temp.path().join("environment-setup-a");
        fs::write(&script, "X=/opt/sdk\n").unwrap();
        relocate_file(&script, "/opt/sdk", "/srv/sdk").unwrap();

        let names: Vec<_> = fs::read_dir(temp.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names.len(), 1);
    }

    #[test]
    fn test_scripts_sorted_and_filtered() {
        let temp = temp_dir();
        fs::write(temp.path().join("environment-setup-b"), "").unwrap();
        fs::write(temp.path().join("environment-setup-a"), "").unwrap();
        fs::write(temp.path().join("version-a"), "").unwrap();
        fs::create_dir(temp.path().join("environment-setup-dir")).unwrap();

        let scripts = environment_setup_scripts(temp.path()).unwrap();
        let names: Vec<_> = scripts
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["environment-setup-a", "environment-setup-b"]);
    }

    #[test]
    fn test_canonical_script_preferred_over_last() {
        let temp = temp_dir();
        fs::write(
            temp.path().join("environment-setup-a"),
            "export OECORE_NATIVE_SYSROOT=/opt/sdk/sysroots/x86_64\n",
        )
        .unwrap();
        fs::write(
            temp.path().join("environment-setup-z-custom"),
            "export EXTRA=/opt/sdk/extra\n",
        )
        .unwrap();

        let relocated = relocate_environment_scripts(temp.path(), "/opt/sdk", "/srv/sdk").unwrap();

        assert_eq!(relocated.scripts.len(), 2);
        assert_eq!(
            relocated.env_setup_script(),
            Some(temp.path().join("environment-setup-a").as_path())
        );
        assert_eq!(
            fs::read_to_string(temp.path().join("environment-setup-z-custom")).unwrap(),
            "export EXTRA=/srv/sdk/extra\n"
        );
    }

    #[test]
    fn test_marker_in_later_script_selected() {
        let temp = temp_dir();
        fs::write(temp.path().join("environment-setup-a"), "export A=1\n").unwrap();
        fs::write(
            temp.path().join("environment-setup-b"),
            "export OECORE_NATIVE_SYSROOT=/opt/sdk/sysroots/x86_64\n",
        )
        .unwrap();

        let relocated = relocate_environment_scripts(temp.path(), "/opt/sdk", "/srv/sdk").unwrap();
        assert_eq!(
            relocated.canonical,
            Some(temp.path().join("environment-setup-b"))
        );
    }

    #[test]
    fn test_no_marker_falls_back_to_last() {
        let relocated = RelocatedScripts {
            scripts: vec![PathBuf::from("/d/environment-setup-a"), PathBuf::from("/d/environment-setup-b")],
            canonical: None,
        };
        assert_eq!(
            relocated.env_setup_script(),
            Some(Path::new("/d/environment-setup-b"))
        );
        assert_eq!(RelocatedScripts::default().env_setup_script(), None);
    }

    #[test]
    fn test_remove_relocation_helpers() {
        let temp = temp_dir();
        fs::write(temp.path().join("relocate_sdk.py"), "").unwrap();

        let removed = remove_relocation_helpers(temp.path());

        assert_eq!(removed, vec![temp.path().join("relocate_sdk.py")]);
        assert!(!temp.path().join("relocate_sdk.py").exists());
    }
}
