//! Block arithmetic and the per-read result type.
//!
//! A file of `n` bytes is split into `ceil(n / BLOCK_SIZE)` blocks.  Block
//! `k` starts at byte `k * BLOCK_SIZE`; every block is full except possibly
//! the last, which carries the remainder.

use crate::config::BLOCK_SIZE;

/// Number of blocks needed to cover `file_size` bytes.
pub fn total_blocks(file_size: u32) -> u32 {
    file_size.div_ceil(BLOCK_SIZE as u32)
}

/// Byte offset of block `block_index`.
pub fn block_offset(block_index: u32) -> u64 {
    block_index as u64 * BLOCK_SIZE as u64
}

/// Payload length of block `block_index` in a file of `file_size` bytes,
/// or `None` if the block lies past the end.
pub fn block_length(file_size: u32, block_index: u32) -> Option<usize> {
    let start = block_offset(block_index);
    let size = file_size as u64;
    if start >= size {
        return None;
    }
    Some((size - start).min(BLOCK_SIZE as u64) as usize)
}

/// One block read from the open image.
///
/// Only `data[..length]` is meaningful.  The value is a fresh copy; it never
/// aliases the reader's internal buffers.
#[derive(Clone, PartialEq, Eq)]
pub struct BlockReadResult {
    pub data:        [u8; BLOCK_SIZE],
    pub length:      usize,
    pub block_index: u32,
    pub is_last:     bool,
}

impl BlockReadResult {
    pub fn empty() -> Self {
        Self {
            data:        [0u8; BLOCK_SIZE],
            length:      0,
            block_index: 0,
            is_last:     false,
        }
    }

    pub fn payload(&self) -> &[u8] {
        &self.data[..self.length]
    }
}

impl Default for BlockReadResult {
    fn default() -> Self {
        Self::empty()
    }
}

impl std::fmt::Debug for BlockReadResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockReadResult")
            .field("block_index", &self.block_index)
            .field("length", &self.length)
            .field("is_last", &self.is_last)
            .finish()
    }
}
