//! Host compatibility gate
//!
//! Checks run once, before the destination is chosen or created:
//! - the host kernel must not be older than the oldest kernel the SDK
//!   supports (skipped on Windows)
//! - the normalized host architecture must match the SDK's, except that an
//!   `ix86` SDK may be installed on an `x86_64` host
//! - for extensible SDKs, a few known-bad host/SDK gcc pairings are refused
//!
//! Host facts come from a [`HostProbe`] so the checks themselves stay pure.

use std::cmp::Ordering;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::command::capture_command;
use crate::config::PayloadManifest;
use crate::error::{InstallerError, Result};

static IX86: Lazy<Regex> = Lazy::new(|| Regex::new(r"i[3-6]86").unwrap());
static X86_64: Lazy<Regex> = Lazy::new(|| Regex::new(r"x86[-_]64").unwrap());
static AMD64: Lazy<Regex> = Lazy::new(|| Regex::new(r"AMD64").unwrap());
static GCC_VERSION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^.* ([0-9]+\.[0-9]+)\.[0-9]+").unwrap());

/// Source of host facts
pub trait HostProbe {
    /// Running kernel release, e.g. `5.15.0-91-generic`
    fn kernel_version(&self) -> Result<String>;

    /// Raw machine name, e.g. `x86_64` or `i686`
    fn machine(&self) -> Result<String>;

    /// `major.minor` of the host gcc, `None` when its output is not understood
    fn gcc_version(&self) -> Result<Option<String>>;
}

/// Probes the running system with `uname` and `gcc`
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemProbe;

impl HostProbe for SystemProbe {
    fn kernel_version(&self) -> Result<String> {
        Ok(capture_command("uname", &["-r"])?.trim_end().to_string())
    }

    fn machine(&self) -> Result<String> {
        if cfg!(windows) {
            return Ok(std::env::consts::ARCH.to_string());
        }
        Ok(capture_command("uname", &["-m"])?.trim_end().to_string())
    }

    fn gcc_version(&self) -> Result<Option<String>> {
        let output = capture_command("gcc", &["--version"])?;
        let version = parse_gcc_version(&output);
        if version.is_none() {
            tracing::info!(
                "Could not determine gcc version from '{}'",
                output.lines().next().unwrap_or_default()
            );
        }
        Ok(version)
    }
}

/// Extract `major.minor` from the first line of `gcc --version`
pub fn parse_gcc_version(output: &str) -> Option<String> {
    let first = output.lines().next()?;
    GCC_VERSION
        .captures(first)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Canonical architecture name
pub fn normalize_arch(arch: &str) -> String {
    let arch = IX86.replace_all(arch, "ix86");
    let arch = X86_64.replace_all(&arch, "x86_64");
    AMD64.replace_all(&arch, "x86_64").into_owned()
}

fn char_order(c: Option<u8>) -> i32 {
    match c {
        None => 0,
        Some(c) if c.is_ascii_digit() => 0,
        Some(c) if c.is_ascii_alphabetic() => i32::from(c),
        Some(b'~') => -1,
        Some(c) => i32::from(c) + 256,
    }
}

fn is_digit(c: Option<&u8>) -> bool {
    c.is_some_and(u8::is_ascii_digit)
}

fn version_order(a: &[u8], b: &[u8]) -> Ordering {
    let (mut i, mut j) = (0, 0);
    while i < a.len() || j < b.len() {
        while (i < a.len() && !a[i].is_ascii_digit()) || (j < b.len() && !b[j].is_ascii_digit())
        {
            let ac = char_order(a.get(i).copied());
            let bc = char_order(b.get(j).copied());
            if ac != bc {
                return ac.cmp(&bc);
            }
            i += 1;
            j += 1;
        }

        while a.get(i) == Some(&b'0') {
            i += 1;
        }
        while b.get(j) == Some(&b'0') {
            j += 1;
        }

        let mut first_diff = Ordering::Equal;
        while is_digit(a.get(i)) && is_digit(b.get(j)) {
            if first_diff == Ordering::Equal {
                first_diff = a[i].cmp(&b[j]);
            }
            i += 1;
            j += 1;
        }
        if is_digit(a.get(i)) {
            return Ordering::Greater;
        }
        if is_digit(b.get(j)) {
            return Ordering::Less;
        }
        if first_diff != Ordering::Equal {
            return first_diff;
        }
    }
    Ordering::Equal
}

/// Order two version strings the way `sort -V` does
///
/// Non-digit runs compare character by character (`~` first, then the end
/// of the string, then letters, then everything else); digit runs compare
/// numerically. Strings that order equal fall back to byte order.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    version_order(a.as_bytes(), b.as_bytes()).then_with(|| a.cmp(b))
}

/// Strictly-less-than under version ordering
pub fn version_lt(a: &str, b: &str) -> bool {
    a != b && compare_versions(a, b) == Ordering::Less
}

pub fn check_kernel(found: &str, oldest: &str) -> Result<()> {
    if version_lt(found, oldest) {
        return Err(InstallerError::KernelTooOld {
            found: found.to_string(),
            required: oldest.to_string(),
        });
    }
    Ok(())
}

/// Compare normalized host and SDK architectures
pub fn check_arch(host: &str, sdk: &str) -> Result<()> {
    let host = normalize_arch(host);
    let sdk = normalize_arch(sdk);
    if host == sdk || (host == "x86_64" && sdk == "ix86") {
        return Ok(());
    }
    Err(InstallerError::IncompatibleArch { host, sdk })
}

/// Refuse known-bad gcc pairings; an empty SDK version means "unknown, newer"
pub fn check_compiler(host: Option<&str>, sdk: &str) -> Result<()> {
    let Some(host) = host else {
        return Ok(());
    };
    let refused = matches!((host, sdk), ("4.8", "4.9") | ("4.8", "") | ("4.9", ""));
    if refused {
        return Err(InstallerError::IncompatibleCompiler {
            host: host.to_string(),
        });
    }
    Ok(())
}

/// Run every check that applies to this payload
pub fn check_host(manifest: &PayloadManifest, probe: &dyn HostProbe) -> Result<()> {
    if !cfg!(windows) {
        let kernel = probe.kernel_version()?;
        tracing::info!("Kernel version is {kernel}");
        check_kernel(&kernel, &manifest.oldest_kernel)?;
    }

    let machine = probe.machine()?;
    tracing::info!("Host arch is {}", normalize_arch(&machine));
    check_arch(&machine, &manifest.arch)?;

    if manifest.extensible {
        let gcc = probe.gcc_version()?;
        if let Some(gcc) = &gcc {
            tracing::info!("Host gcc version is {gcc}");
        }
        check_compiler(gcc.as_deref(), &manifest.gcc_version)?;
    }
    Ok(())
}
