//! Base directory for generated hook scripts and test scratch space.
//!
//! Hook scripts must never land inside the install destination or the current
//! working directory (e.g. when TMPDIR=tmp), so relative temp dirs are ignored.

use std::env;
use std::path::PathBuf;

/// Returns an absolute directory suitable for temporary files.
pub fn temp_dir_base() -> PathBuf {
    let t = env::temp_dir();
    if t.is_absolute() {
        return t;
    }

    #[cfg(windows)]
    {
        env::var("TEMP")
            .or_else(|_| env::var("TMP"))
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Windows\\Temp"))
    }
    #[cfg(not(windows))]
    {
        PathBuf::from("/tmp")
    }
}
