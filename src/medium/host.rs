//! Card emulated by a host directory.
//!
//! The directory stands in for the card's filesystem root, so the card path
//! `/images/img_001.jpg` resolves to `<root>/images/img_001.jpg`.

use std::fs::{self, File, ReadDir};
use std::io;
use std::path::{Component, Path, PathBuf};

use log::warn;

use super::{not_mounted, CardInfo, CardType, MediumEntry, StorageMedium};

/// Reported card capacity unless overridden: a common 8 GiB card.
pub const DEFAULT_CARD_SIZE: u64 = 8 * 1024 * 1024 * 1024;

#[derive(Debug)]
pub struct HostMedium {
    root:      PathBuf,
    card_size: u64,
    mounted:   bool,
}

impl HostMedium {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self::with_card_size(root, DEFAULT_CARD_SIZE)
    }

    pub fn with_card_size<P: AsRef<Path>>(root: P, card_size: u64) -> Self {
        Self {
            root:      root.as_ref().to_owned(),
            card_size,
            mounted:   false,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a card path onto the host, refusing anything that escapes the root.
    fn resolve(&self, path: &str) -> io::Result<PathBuf> {
        if !self.mounted {
            return Err(not_mounted());
        }
        let rel = Path::new(path.trim_start_matches('/'));
        if rel.components().any(|c| !matches!(c, Component::Normal(_) | Component::CurDir)) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("path escapes card root: {path}"),
            ));
        }
        Ok(self.root.join(rel))
    }
}

impl StorageMedium for HostMedium {
    type File = File;
    type Entries = HostEntries;

    fn mount(&mut self) -> io::Result<()> {
        if !self.root.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("card root {} is not a directory", self.root.display()),
            ));
        }
        self.mounted = true;
        Ok(())
    }

    fn unmount(&mut self) {
        self.mounted = false;
    }

    fn card_info(&self) -> CardInfo {
        let kind = if self.mounted && self.root.is_dir() {
            CardType::from_capacity(self.card_size)
        } else {
            CardType::None
        };
        CardInfo { kind, size_bytes: self.card_size }
    }

    fn read_dir(&mut self, path: &str) -> io::Result<HostEntries> {
        let dir = self.resolve(path)?;
        Ok(HostEntries(fs::read_dir(dir)?))
    }

    fn open(&mut self, path: &str) -> io::Result<File> {
        let file = File::open(self.resolve(path)?)?;
        if file.metadata()?.is_dir() {
            return Err(io::Error::new(io::ErrorKind::Other, format!("{path} is a directory")));
        }
        Ok(file)
    }
}

/// Directory listing in the host's enumeration order.
///
/// Names that are not valid UTF-8 cannot be expressed as card paths and are
/// skipped with a warning.
pub struct HostEntries(ReadDir);

impl Iterator for HostEntries {
    type Item = io::Result<MediumEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let entry = match self.0.next()? {
                Ok(e)  => e,
                Err(e) => return Some(Err(e)),
            };
            let name = match entry.file_name().into_string() {
                Ok(name) => name,
                Err(raw) => {
                    warn!("Skipping {}: name is not valid UTF-8", raw.to_string_lossy());
                    continue;
                }
            };
            return Some(entry.metadata().map(|meta| MediumEntry {
                name,
                is_dir: meta.is_dir(),
                size:   meta.len(),
            }));
        }
    }
}
