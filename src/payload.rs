//! Payload container and the SDK archive streamed out of it
//!
//! The container is a small zip file (usually appended to the installer
//! executable) with random access to its members. The SDK archive is one of
//! those members: a tar stream, optionally gzip/xz/zstd compressed, that is
//! decoded straight out of the zip member without being buffered or spooled
//! to disk. That makes the SDK archive forward-only: entries come out in
//! archive order and each one can be consumed exactly once.

use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{InstallerError, Result};

/// Byte stream feeding the tar decoder
pub type PayloadStream<'a> = Box<dyn Read + 'a>;

/// One entry of the SDK archive, valid until the next entry is requested
pub type ArchiveEntry<'e, 'a> = tar::Entry<'e, PayloadStream<'a>>;

/// Compression wrapped around the SDK tarball
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TarCompression {
    None,
    Gzip,
    Xz,
    Zstd,
}

impl TarCompression {
    /// Identify the compression from the first bytes of the stream
    pub fn detect(magic: &[u8]) -> Self {
        match magic {
            [0x1F, 0x8B, ..] => Self::Gzip,
            [0xFD, 0x37, 0x7A, 0x58, 0x5A, 0x00, ..] => Self::Xz,
            [0x28, 0xB5, 0x2F, 0xFD, ..] => Self::Zstd,
            _ => Self::None,
        }
    }

    fn decoder<'a, R: BufRead + 'a>(self, reader: R) -> Result<PayloadStream<'a>> {
        Ok(match self {
            Self::None => Box::new(reader),
            Self::Gzip => Box::new(flate2::bufread::GzDecoder::new(reader)),
            Self::Xz => Box::new(xz2::bufread::XzDecoder::new(reader)),
            Self::Zstd => Box::new(zstd::stream::read::Decoder::with_buffer(reader).map_err(
                |e| InstallerError::ArchiveReadFailed {
                    reason: e.to_string(),
                },
            )?),
        })
    }
}

/// Kind of filesystem object an archive entry materializes as
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
    Symlink,
    Other,
}

impl EntryKind {
    pub fn of(header: &tar::Header) -> Self {
        let entry_type = header.entry_type();
        if entry_type.is_dir() {
            Self::Directory
        } else if entry_type.is_symlink() {
            Self::Symlink
        } else if entry_type.is_file() {
            Self::File
        } else {
            Self::Other
        }
    }
}

/// Header data of an archive entry, detached from its content stream
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EntryInfo {
    pub name: String,
    pub size: u64,
    pub mode: u32,
    pub kind: EntryKind,
    pub link_target: Option<String>,
}

impl EntryInfo {
    /// Read the header fields of `entry` without touching its content
    pub fn read(entry: &ArchiveEntry<'_, '_>) -> Result<Self> {
        let name = entry
            .path()
            .map_err(|e| InstallerError::ArchiveReadFailed {
                reason: e.to_string(),
            })?
            .to_string_lossy()
            .into_owned();
        let header = entry.header();
        let link_target = entry
            .link_name()
            .ok()
            .flatten()
            .map(|target| target.to_string_lossy().into_owned());

        Ok(Self {
            name,
            size: entry.size(),
            mode: header.mode().unwrap_or(0),
            kind: EntryKind::of(header),
            link_target,
        })
    }

    /// `ls -l` style listing line
    pub fn listing(&self) -> String {
        let type_char = match self.kind {
            EntryKind::Directory => 'd',
            EntryKind::Symlink => 'l',
            EntryKind::File => '-',
            EntryKind::Other => '?',
        };
        let mut line = format!(
            "{}{} {:>12} {}",
            type_char,
            permission_string(self.mode),
            self.size,
            self.name
        );
        if let Some(target) = &self.link_target {
            line.push_str(" -> ");
            line.push_str(target);
        }
        line
    }
}

fn permission_string(mode: u32) -> String {
    const FLAGS: [(u32, char); 9] = [
        (0o400, 'r'),
        (0o200, 'w'),
        (0o100, 'x'),
        (0o040, 'r'),
        (0o020, 'w'),
        (0o010, 'x'),
        (0o004, 'r'),
        (0o002, 'w'),
        (0o001, 'x'),
    ];
    FLAGS
        .iter()
        .map(|&(bit, c)| if mode & bit != 0 { c } else { '-' })
        .collect()
}

/// The SDK archive, decoded on the fly from a forward-only stream
pub struct SdkArchive<'a> {
    archive: tar::Archive<PayloadStream<'a>>,
}

impl<'a> SdkArchive<'a> {
    /// Wrap a forward-only reader, sniffing its compression from the first bytes
    pub fn from_reader(reader: impl Read + 'a) -> Result<Self> {
        let mut reader = BufReader::new(reader);
        let compression = {
            let magic = reader.fill_buf().map_err(|e| InstallerError::ArchiveReadFailed {
                reason: e.to_string(),
            })?;
            TarCompression::detect(magic)
        };
        debug!("SDK archive compression is {:?}", compression);

        let mut archive = tar::Archive::new(compression.decoder(reader)?);
        archive.set_preserve_permissions(true);
        archive.set_preserve_mtime(true);
        archive.set_overwrite(true);
        Ok(Self { archive })
    }

    /// Iterate entries in archive order
    ///
    /// The underlying stream cannot seek, so this may only be consumed once.
    pub fn entries(&mut self) -> Result<tar::Entries<'_, PayloadStream<'a>>> {
        self.archive
            .entries()
            .map_err(|e| InstallerError::ArchiveReadFailed {
                reason: e.to_string(),
            })
    }
}

/// The outer payload container
pub struct PayloadContainer {
    path: PathBuf,
    archive: zip::ZipArchive<File>,
}

impl PayloadContainer {
    /// Open a container for member lookup
    pub fn open(path: &Path) -> Result<Self> {
        let open_failed = |reason: String| InstallerError::PayloadOpenFailed {
            path: path.display().to_string(),
            reason,
        };
        let file = File::open(path).map_err(|e| open_failed(e.to_string()))?;
        let archive = zip::ZipArchive::new(file).map_err(|e| open_failed(e.to_string()))?;
        debug!(
            "Opened payload '{}' with {} members",
            path.display(),
            archive.len()
        );

        Ok(Self {
            path: path.to_path_buf(),
            archive,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn has_member(&self, name: &str) -> bool {
        self.archive.index_for_name(name).is_some()
    }

    /// Read a text member in full
    pub fn read_text(&mut self, name: &str) -> Result<String> {
        let location = format!("{}:{}", self.path.display(), name);
        let mut member = self.member(name)?;
        let mut text = String::new();
        member
            .read_to_string(&mut text)
            .map_err(|e| InstallerError::FileReadFailed {
                path: location,
                reason: e.to_string(),
            })?;
        Ok(text)
    }

    /// Read a text member, treating a missing member as empty
    pub fn read_text_or_empty(&mut self, name: &str) -> Result<String> {
        if self.has_member(name) {
            self.read_text(name)
        } else {
            Ok(String::new())
        }
    }

    /// Open the named member as a streamed SDK archive
    ///
    /// The returned archive borrows the container, so both are released
    /// together when it goes out of scope.
    pub fn open_sdk_archive(&mut self, name: &str) -> Result<SdkArchive<'_>> {
        let member = self.member(name)?;
        SdkArchive::from_reader(member)
    }

    fn member(&mut self, name: &str) -> Result<impl Read + '_> {
        match self.archive.by_name(name) {
            Ok(member) => Ok(member),
            Err(zip::result::ZipError::FileNotFound) => Err(InstallerError::PayloadMemberMissing {
                name: name.to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }
}
