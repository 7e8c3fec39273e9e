//! Storage media: a card with filesystem semantics behind the bus.
//!
//! # Backends
//! - [`HostMedium`] maps the card root onto a host directory.
//! - [`MemoryMedium`] keeps the whole card in RAM, with fault injection
//!   for exercising the error paths.
//!
//! Paths handed to a medium are absolute card paths such as
//! `/images/img_001.jpg`.

pub mod host;
pub mod memory;

use std::fmt;
use std::io::{self, Read, Seek};

pub use host::HostMedium;
pub use memory::MemoryMedium;

/// Card type as reported by the card's identification registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardType {
    /// Slot empty, or the card did not answer.
    None,
    Mmc,
    /// Standard capacity, up to 2 GiB.
    Sdsc,
    /// High capacity, above 2 GiB.
    Sdhc,
    Unknown,
}

impl CardType {
    /// Classify an SD card by capacity.
    pub fn from_capacity(size_bytes: u64) -> Self {
        if size_bytes <= 2 * 1024 * 1024 * 1024 {
            CardType::Sdsc
        } else {
            CardType::Sdhc
        }
    }
}

impl fmt::Display for CardType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CardType::None    => "NONE",
            CardType::Mmc     => "MMC",
            CardType::Sdsc    => "SDSC",
            CardType::Sdhc    => "SDHC",
            CardType::Unknown => "UNKNOWN",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CardInfo {
    pub kind:       CardType,
    pub size_bytes: u64,
}

impl CardInfo {
    pub fn size_mb(&self) -> u64 {
        self.size_bytes / (1024 * 1024)
    }
}

/// One entry of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediumEntry {
    /// Bare file name, no directory part.
    pub name:   String,
    pub is_dir: bool,
    pub size:   u64,
}

pub trait StorageMedium {
    type File: Read + Seek;
    type Entries: Iterator<Item = io::Result<MediumEntry>>;

    /// Mount the filesystem.  Only called with the bus powered.
    fn mount(&mut self) -> io::Result<()>;

    /// Release the filesystem.  Idempotent.
    fn unmount(&mut self);

    fn card_info(&self) -> CardInfo;

    /// Enumerate `path` lazily; fails if it is missing or not a directory.
    fn read_dir(&mut self, path: &str) -> io::Result<Self::Entries>;

    fn open(&mut self, path: &str) -> io::Result<Self::File>;
}

pub(crate) fn not_mounted() -> io::Error {
    io::Error::new(io::ErrorKind::Other, "filesystem not mounted")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_by_capacity() {
        assert_eq!(CardType::from_capacity(1 << 30), CardType::Sdsc);
        assert_eq!(CardType::from_capacity(8 << 30), CardType::Sdhc);
        assert_eq!(CardType::Sdhc.to_string(), "SDHC");
    }

    #[test]
    fn size_in_mebibytes() {
        let info = CardInfo { kind: CardType::Sdhc, size_bytes: 8 << 30 };
        assert_eq!(info.size_mb(), 8192);
    }
}
