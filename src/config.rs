//! Build-time tunables and bus wiring.
//!
//! Everything here is fixed when the firmware image is built.  Nothing is
//! read from the card or from the environment at runtime: the catalogue is
//! derived purely from the directory listing on every mount.

/// Payload bytes per block.  Matches CoAP Block2 SZX=5 (RFC 7959), so one
/// block maps onto one protocol chunk without re-slicing.
pub const BLOCK_SIZE: usize = 512;

/// Catalogue capacity.  Eligible files beyond this are silently ignored.
pub const MAX_IMAGES: usize = 32;

/// The single directory scanned for images.
pub const IMAGE_DIR: &str = "/images";

/// Accepted file extensions, compared case-insensitively.
pub const IMAGE_EXTENSIONS: [&str; 2] = ["jpg", "jpeg"];

/// Names starting with this byte are treated as hidden.
pub const HIDDEN_PREFIX: char = '.';

/// Longest full path (e.g. `/images/img_001.jpg`) a catalogue entry can hold.
pub const MAX_PATH_LEN: usize = 63;

// ── Bus wiring ────────────────────────────────────────────────────────────────

pub const DEFAULT_SD_CLK:  u8  = 14;
pub const DEFAULT_SD_MISO: u8  = 2;
pub const DEFAULT_SD_MOSI: u8  = 11;
pub const DEFAULT_SD_CS:   u8  = 13;
/// 4 MHz keeps the link stable over long jumper wires.
pub const DEFAULT_SPI_FREQ_HZ: u32 = 4_000_000;

/// SPI wiring between the MCU and the card slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusConfig {
    pub clk:     u8,
    pub miso:    u8,
    pub mosi:    u8,
    pub cs:      u8,
    pub freq_hz: u32,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            clk:     DEFAULT_SD_CLK,
            miso:    DEFAULT_SD_MISO,
            mosi:    DEFAULT_SD_MOSI,
            cs:      DEFAULT_SD_CS,
            freq_hz: DEFAULT_SPI_FREQ_HZ,
        }
    }
}

impl BusConfig {
    /// Returns the first pin assigned to more than one signal, if any.
    pub fn conflicting_pin(&self) -> Option<u8> {
        let pins = [self.clk, self.miso, self.mosi, self.cs];
        pins.iter()
            .enumerate()
            .find(|&(i, p)| pins[i + 1..].contains(p))
            .map(|(_, p)| *p)
    }
}
