//! Block stream engine: one open image, read in `BLOCK_SIZE` pieces.
//!
//! # Access modes
//! Sequential reads ([`BlockStream::read_next`]) walk a cursor from block 0
//! to the last block and then report end-of-data as `Ok(None)`.  Random
//! reads ([`BlockStream::read_at`]) seek to any block and leave that cursor
//! alone, which is how a lost or NACKed block is re-served mid-transfer.
//! Both modes share one file handle; the engine tracks the handle's byte
//! position and re-seeks only when the next read does not start there.
//!
//! # State
//! The engine is either `Closed` or `Open`.  Opening replaces (and drops)
//! any previous handle, so at most one file is ever open.

use std::io::{self, Read, Seek, SeekFrom};

use log::error;

use crate::block::{block_length, block_offset, BlockReadResult};
use crate::catalogue::CatalogueEntry;
use crate::error::{Result, StorageError};

// ── State ─────────────────────────────────────────────────────────────────────

struct OpenStream<F> {
    index:    usize,
    entry:    CatalogueEntry,
    /// Next block `read_next` will deliver.
    cursor:   u32,
    /// Byte position of `file`; `None` after a failed seek.
    position: Option<u64>,
    file:     F,
}

enum StreamState<F> {
    Closed,
    Open(OpenStream<F>),
}

pub struct BlockStream<F: Read + Seek> {
    state: StreamState<F>,
}

impl<F: Read + Seek> BlockStream<F> {
    pub fn new() -> Self {
        Self { state: StreamState::Closed }
    }

    /// Start streaming `file`, the image catalogued at `index`.
    pub fn open(&mut self, index: usize, entry: CatalogueEntry, file: F) {
        self.state = StreamState::Open(OpenStream {
            index,
            entry,
            cursor:   0,
            position: Some(0),
            file,
        });
    }

    /// Drop the file handle.  Idempotent.
    pub fn close(&mut self) {
        self.state = StreamState::Closed;
    }

    pub fn is_open(&self) -> bool {
        matches!(self.state, StreamState::Open(_))
    }

    /// Catalogue index of the open image.
    pub fn active_index(&self) -> Option<usize> {
        self.current().map(|s| s.index)
    }

    pub fn entry(&self) -> Option<&CatalogueEntry> {
        self.current().map(|s| &s.entry)
    }

    /// Sequential cursor of the open image.
    pub fn cursor(&self) -> Option<u32> {
        self.current().map(|s| s.cursor)
    }

    // ── Reads ────────────────────────────────────────────────────────────────

    /// Next sequential block, `Ok(None)` once every block has been served.
    pub fn read_next(&mut self) -> Result<Option<BlockReadResult>> {
        let mut out = BlockReadResult::empty();
        Ok(self.read_next_into(&mut out)?.then_some(out))
    }

    /// Like [`read_next`](Self::read_next) but fills a caller-owned buffer.
    /// Returns `false` at end-of-data, leaving `out` untouched.
    pub fn read_next_into(&mut self, out: &mut BlockReadResult) -> Result<bool> {
        let stream = self.current_mut()?;
        if stream.cursor >= stream.entry.total_blocks {
            return Ok(false);
        }
        let block = stream.cursor;
        stream.fill(block, false, out)?;
        stream.cursor += 1;
        Ok(true)
    }

    /// Block `block_index`, regardless of the sequential cursor.
    pub fn read_at(&mut self, block_index: u32) -> Result<BlockReadResult> {
        let mut out = BlockReadResult::empty();
        self.read_at_into(block_index, &mut out)?;
        Ok(out)
    }

    pub fn read_at_into(&mut self, block_index: u32, out: &mut BlockReadResult) -> Result<()> {
        let stream = self.current_mut()?;
        let total = stream.entry.total_blocks;
        if block_index >= total {
            return Err(StorageError::BlockOutOfRange { block: block_index, total });
        }
        stream.fill(block_index, true, out)
    }

    fn current(&self) -> Option<&OpenStream<F>> {
        match &self.state {
            StreamState::Open(s) => Some(s),
            StreamState::Closed  => None,
        }
    }

    fn current_mut(&mut self) -> Result<&mut OpenStream<F>> {
        match &mut self.state {
            StreamState::Open(s) => Ok(s),
            StreamState::Closed  => Err(StorageError::NoStreamOpen),
        }
    }
}

impl<F: Read + Seek> Default for BlockStream<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: Read + Seek> OpenStream<F> {
    /// Read block `block` into `out`.  With `force_seek` the handle is always
    /// repositioned; otherwise only when it is not already at the block.
    fn fill(&mut self, block: u32, force_seek: bool, out: &mut BlockReadResult) -> Result<()> {
        let total = self.entry.total_blocks;
        let expected = block_length(self.entry.file_size, block)
            .ok_or(StorageError::BlockOutOfRange { block, total })?;
        let offset = block_offset(block);

        if force_seek || self.position != Some(offset) {
            if let Err(e) = self.file.seek(SeekFrom::Start(offset)) {
                error!("Seek to offset {offset} in {} failed: {e}", self.entry.path);
                self.position = None;
                return Err(e.into());
            }
            self.position = Some(offset);
        }

        let n = match read_full(&mut self.file, &mut out.data[..expected]) {
            Ok(n)  => n,
            Err(e) => {
                self.position = None;
                return Err(e.into());
            }
        };
        self.position = Some(offset + n as u64);
        if n < expected {
            return Err(StorageError::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("{} shrank since scan: block {block} has {n} of {expected} bytes", self.entry.path),
            )));
        }

        out.length      = n;
        out.block_index = block;
        out.is_last     = block + 1 == total;
        Ok(())
    }
}

/// Read until `buf` is full or the reader hits EOF.
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0)  => break,
            Ok(n)  => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
