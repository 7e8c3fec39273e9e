use std::io;
use thiserror::Error;

use crate::bus::BusError;

pub type Result<T> = std::result::Result<T, StorageError>;

/// Failure category, independent of the concrete variant.
///
/// End-of-data has no kind: exhausting a stream is reported as
/// `Ok(None)` by [`crate::StorageReader::read_next_block`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bus init, filesystem mount or card detection failed.  The bus is
    /// powered down again and no catalogue exists.
    Medium,
    /// The card is mounted but the image directory yielded nothing usable.
    Scan,
    /// Caller misuse: not mounted, no open stream, or an index out of range.
    Precondition,
    /// Open/seek/read failed on a mounted card.  The catalogue stays valid.
    Io,
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("storage bus init failed: {0}")]
    Bus(#[from] BusError),
    #[error("filesystem mount failed: {0}")]
    Mount(#[source] io::Error),
    #[error("no storage card detected")]
    NoMedium,
    #[error("cannot open image directory {path}: {source}")]
    DirectoryUnavailable {
        path:   String,
        #[source]
        source: io::Error,
    },
    #[error("no eligible images in {0}")]
    NoImages(String),
    #[error("storage is not mounted")]
    NotMounted,
    #[error("no image stream is open")]
    NoStreamOpen,
    #[error("catalogue index {index} out of range (count {count})")]
    IndexOutOfRange { index: usize, count: usize },
    #[error("block {block} out of range (total {total})")]
    BlockOutOfRange { block: u32, total: u32 },
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl StorageError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StorageError::Bus(_) | StorageError::Mount(_) | StorageError::NoMedium => ErrorKind::Medium,
            StorageError::DirectoryUnavailable { .. } | StorageError::NoImages(_) => ErrorKind::Scan,
            StorageError::NotMounted
            | StorageError::NoStreamOpen
            | StorageError::IndexOutOfRange { .. }
            | StorageError::BlockOutOfRange { .. } => ErrorKind::Precondition,
            StorageError::Io(_) => ErrorKind::Io,
        }
    }

    /// True when the caller may go straight to deep sleep: the bus is off.
    pub fn bus_released(&self) -> bool {
        self.kind() == ErrorKind::Medium
    }
}
