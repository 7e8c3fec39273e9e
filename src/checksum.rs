//! Fletcher-16 over a whole image.
//!
//! Advisory integrity metadata for the gateway that reassembles a transfer,
//! not a cryptographic digest.  The hasher is incremental so a file can be
//! fed through a single `BLOCK_SIZE` buffer.

use std::io::{self, Read};

use crate::config::BLOCK_SIZE;

#[derive(Debug, Clone, Copy, Default)]
pub struct Fletcher16 {
    sum1: u16,
    sum2: u16,
}

impl Fletcher16 {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.sum1 = (self.sum1 + b as u16) % 255;
            self.sum2 = (self.sum2 + self.sum1) % 255;
        }
    }

    /// `sum2` in the high byte, `sum1` in the low byte.
    pub fn finalize(&self) -> u16 {
        (self.sum2 << 8) | self.sum1
    }
}

pub fn fletcher16(bytes: &[u8]) -> u16 {
    let mut h = Fletcher16::new();
    h.update(bytes);
    h.finalize()
}

/// Hash everything `reader` yields until EOF, one block at a time.
pub fn fletcher16_reader<R: Read>(mut reader: R) -> io::Result<u16> {
    let mut h = Fletcher16::new();
    let mut buf = [0u8; BLOCK_SIZE];
    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        h.update(&buf[..n]);
    }
    Ok(h.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn known_vector() {
        // sum1 = 6, sum2 = 1 + 3 + 6 = 10
        assert_eq!(fletcher16(&[1, 2, 3]), 0x0A06);
    }

    #[test]
    fn empty_input_is_zero() {
        assert_eq!(fletcher16(&[]), 0);
    }

    #[test]
    fn sums_wrap_modulo_255() {
        assert_eq!(fletcher16(&[255]), 0);
        assert_eq!(fletcher16(b"abcde"), 0xC8F0);
    }

    #[test]
    fn incremental_matches_one_shot() {
        let data: Vec<u8> = (0..3000u32).map(|i| (i * 7 % 256) as u8).collect();
        let mut h = Fletcher16::new();
        for chunk in data.chunks(333) {
            h.update(chunk);
        }
        assert_eq!(h.finalize(), fletcher16(&data));
        assert_eq!(fletcher16_reader(Cursor::new(&data)).unwrap(), fletcher16(&data));
    }
}
