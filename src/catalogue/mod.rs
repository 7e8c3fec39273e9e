//! In-memory image catalogue.
//!
//! The catalogue is a fixed array of [`MAX_IMAGES`] entries plus a count.
//! It is filled by [`scanner::scan_directory`] on mount and wiped on
//! unmount; nothing about it is ever written back to the card.

pub mod scanner;

use std::fmt;

use serde::{Serialize, Serializer};

use crate::block::total_blocks;
use crate::config::{BLOCK_SIZE, MAX_IMAGES, MAX_PATH_LEN};
use crate::error::{Result, StorageError};

// ── EntryPath ─────────────────────────────────────────────────────────────────

/// Full card path of an image, stored inline (no heap).
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct EntryPath {
    buf: [u8; MAX_PATH_LEN],
    len: u8,
}

impl EntryPath {
    pub const EMPTY: EntryPath = EntryPath { buf: [0u8; MAX_PATH_LEN], len: 0 };

    /// `None` if `path` does not fit in [`MAX_PATH_LEN`] bytes.
    pub fn new(path: &str) -> Option<Self> {
        let bytes = path.as_bytes();
        if bytes.len() > MAX_PATH_LEN {
            return None;
        }
        let mut buf = [0u8; MAX_PATH_LEN];
        buf[..bytes.len()].copy_from_slice(bytes);
        Some(Self { buf, len: bytes.len() as u8 })
    }

    /// Join `dir` and `name` with a single `/`.
    pub fn join(dir: &str, name: &str) -> Option<Self> {
        let dir = dir.trim_end_matches('/');
        let total = dir.len() + 1 + name.len();
        if total > MAX_PATH_LEN {
            return None;
        }
        let mut buf = [0u8; MAX_PATH_LEN];
        buf[..dir.len()].copy_from_slice(dir.as_bytes());
        buf[dir.len()] = b'/';
        buf[dir.len() + 1..total].copy_from_slice(name.as_bytes());
        Some(Self { buf, len: total as u8 })
    }

    pub fn as_str(&self) -> &str {
        // Only ever built from whole `&str` values.
        std::str::from_utf8(&self.buf[..self.len as usize]).unwrap_or_default()
    }

    /// The part after the last `/`.
    pub fn file_name(&self) -> &str {
        let s = self.as_str();
        s.rsplit('/').next().unwrap_or(s)
    }
}

impl fmt::Debug for EntryPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self.as_str(), f)
    }
}

impl fmt::Display for EntryPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl Serialize for EntryPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

// ── CatalogueEntry ────────────────────────────────────────────────────────────

/// Metadata for one image.  Handed out by value; callers never see the
/// catalogue's own copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CatalogueEntry {
    pub path:         EntryPath,
    pub file_size:    u32,
    pub total_blocks: u32,
    /// Fletcher-16 of the whole file; 0 until computed.
    pub checksum:     u16,
}

impl CatalogueEntry {
    pub const EMPTY: CatalogueEntry = CatalogueEntry {
        path:         EntryPath::EMPTY,
        file_size:    0,
        total_blocks: 0,
        checksum:     0,
    };

    pub fn new(path: EntryPath, file_size: u32) -> Self {
        Self {
            path,
            file_size,
            total_blocks: total_blocks(file_size),
            checksum:     0,
        }
    }
}

// ── Catalogue ─────────────────────────────────────────────────────────────────

pub struct Catalogue {
    entries: [CatalogueEntry; MAX_IMAGES],
    count:   usize,
}

impl Catalogue {
    pub const fn new() -> Self {
        Self { entries: [CatalogueEntry::EMPTY; MAX_IMAGES], count: 0 }
    }

    pub fn clear(&mut self) {
        self.entries = [CatalogueEntry::EMPTY; MAX_IMAGES];
        self.count = 0;
    }

    /// Append an entry.  Returns `false` (and drops it) when full.
    pub fn push(&mut self, entry: CatalogueEntry) -> bool {
        if self.is_full() {
            return false;
        }
        self.entries[self.count] = entry;
        self.count += 1;
        true
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn is_full(&self) -> bool {
        self.count == MAX_IMAGES
    }

    pub fn get(&self, index: usize) -> Result<CatalogueEntry> {
        self.as_slice()
            .get(index)
            .copied()
            .ok_or(StorageError::IndexOutOfRange { index, count: self.count })
    }

    pub fn as_slice(&self) -> &[CatalogueEntry] {
        &self.entries[..self.count]
    }

    pub fn iter(&self) -> impl Iterator<Item = CatalogueEntry> + '_ {
        self.as_slice().iter().copied()
    }
}

impl Default for Catalogue {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Catalogue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.as_slice()).finish()
    }
}

// ── Manifest ──────────────────────────────────────────────────────────────────

/// Serializable snapshot of the catalogue for the transfer side.
#[derive(Debug, Clone, Serialize)]
pub struct Manifest {
    pub block_size: usize,
    pub count:      usize,
    pub entries:    Vec<CatalogueEntry>,
}

impl From<&Catalogue> for Manifest {
    fn from(c: &Catalogue) -> Self {
        Manifest {
            block_size: BLOCK_SIZE,
            count:      c.len(),
            entries:    c.iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, size: u32) -> CatalogueEntry {
        CatalogueEntry::new(EntryPath::join("/images", name).unwrap(), size)
    }

    #[test]
    fn path_join_and_bounds() {
        let p = EntryPath::join("/images/", "img_001.jpg").unwrap();
        assert_eq!(p.as_str(), "/images/img_001.jpg");
        assert_eq!(p.file_name(), "img_001.jpg");

        let longest = "x".repeat(MAX_PATH_LEN - "/images/".len());
        assert!(EntryPath::join("/images", &longest).is_some());
        let too_long = "x".repeat(MAX_PATH_LEN);
        assert!(EntryPath::join("/images", &too_long).is_none());
        assert!(EntryPath::new(&too_long).is_some());
        assert!(EntryPath::new(&format!("{too_long}x")).is_none());
    }

    #[test]
    fn entry_derives_block_count() {
        let e = entry("a.jpg", BLOCK_SIZE as u32 * 2 + 1);
        assert_eq!(e.total_blocks, 3);
        assert_eq!(e.checksum, 0);
    }

    #[test]
    fn push_stops_at_capacity() {
        let mut c = Catalogue::new();
        for i in 0..MAX_IMAGES {
            assert!(c.push(entry(&format!("{i}.jpg"), 10)));
        }
        assert!(c.is_full());
        assert!(!c.push(entry("extra.jpg", 10)));
        assert_eq!(c.len(), MAX_IMAGES);
    }

    #[test]
    fn get_out_of_range_fails() {
        let mut c = Catalogue::new();
        c.push(entry("a.jpg", 1));
        assert_eq!(c.get(0).unwrap().path.file_name(), "a.jpg");
        assert!(matches!(
            c.get(1),
            Err(StorageError::IndexOutOfRange { index: 1, count: 1 })
        ));
        c.clear();
        assert!(c.is_empty());
        assert!(c.get(0).is_err());
    }

    #[test]
    fn manifest_serializes_paths_as_strings() {
        let mut c = Catalogue::new();
        c.push(entry("a.jpg", 600));
        let json = serde_json::to_value(Manifest::from(&c)).unwrap();
        assert_eq!(json["block_size"], BLOCK_SIZE);
        assert_eq!(json["entries"][0]["path"], "/images/a.jpg");
        assert_eq!(json["entries"][0]["total_blocks"], 2);
    }
}
