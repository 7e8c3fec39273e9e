//! [`StorageReader`], the embedding surface.
//!
//! ```no_run
//! use vsensor::{HostReader, StorageReader};
//!
//! let mut reader: HostReader = StorageReader::host("/mnt/sdcard");
//! reader.mount()?;
//! reader.open_stream(0)?;
//! while let Some(block) = reader.read_next_block()? {
//!     // hand block.payload() to the transfer layer
//!     # let _ = block;
//! }
//! let resend = reader.read_block_at(3)?; // NACKed block
//! # let _ = resend;
//! reader.close_stream();
//! reader.unmount(); // always, before deep sleep
//! # Ok::<(), vsensor::StorageError>(())
//! ```
//!
//! The reader owns the bus, the medium, the catalogue and the single open
//! stream.  Nothing survives [`StorageReader::unmount`], and there is no
//! `Drop` hook: powering the bus down is the caller's job.

use std::path::Path;

use log::{error, info, warn};

use crate::block::BlockReadResult;
use crate::bus::{SimBus, StorageBus};
use crate::catalogue::{scanner, Catalogue, CatalogueEntry, Manifest};
use crate::checksum::fletcher16_reader;
use crate::config::{BusConfig, IMAGE_DIR};
use crate::error::{Result, StorageError};
use crate::medium::{CardInfo, CardType, HostMedium, StorageMedium};
use crate::stream::BlockStream;

/// Reader over a host directory acting as the card.
pub type HostReader = StorageReader<SimBus, HostMedium>;

pub struct StorageReader<B: StorageBus, M: StorageMedium> {
    bus:        B,
    medium:     M,
    bus_config: BusConfig,
    mounted:    bool,
    catalogue:  Catalogue,
    stream:     BlockStream<M::File>,
}

impl StorageReader<SimBus, HostMedium> {
    pub fn host<P: AsRef<Path>>(card_root: P) -> Self {
        Self::new(SimBus::new(), HostMedium::new(card_root))
    }
}

impl<B: StorageBus, M: StorageMedium> StorageReader<B, M> {
    pub fn new(bus: B, medium: M) -> Self {
        Self::with_bus_config(bus, medium, BusConfig::default())
    }

    pub fn with_bus_config(bus: B, medium: M, bus_config: BusConfig) -> Self {
        Self {
            bus,
            medium,
            bus_config,
            mounted:   false,
            catalogue: Catalogue::new(),
            stream:    BlockStream::new(),
        }
    }

    // ── Lifecycle ────────────────────────────────────────────────────────────

    /// Power the bus, mount the card and scan [`IMAGE_DIR`].
    ///
    /// Returns the number of catalogued images.  Already mounted: succeeds
    /// without rescanning (unmount first to force a rescan).
    ///
    /// Bus, mount and card-detect failures power the bus back down.  A scan
    /// failure leaves the card mounted with an empty catalogue.
    pub fn mount(&mut self) -> Result<usize> {
        if self.mounted {
            warn!("Card already mounted");
            return Ok(self.catalogue.len());
        }

        if let Err(e) = self.bus.begin(&self.bus_config) {
            error!("Bus init failed: {e}");
            self.bus.end();
            return Err(e.into());
        }

        if let Err(e) = self.medium.mount() {
            error!("Card mount failed, check wiring / card format (FAT32): {e}");
            self.bus.end();
            return Err(StorageError::Mount(e));
        }

        let card = self.medium.card_info();
        if card.kind == CardType::None {
            error!("No card detected");
            self.medium.unmount();
            self.bus.end();
            return Err(StorageError::NoMedium);
        }
        info!("Card mounted, type: {}, size: {} MB", card.kind, card.size_mb());
        self.mounted = true;

        match scanner::scan_directory(&mut self.medium, IMAGE_DIR, &mut self.catalogue) {
            Ok(n) => {
                info!("Found {n} image(s) in {IMAGE_DIR}");
                Ok(n)
            }
            Err(e) => {
                error!("Image scan failed: {e}");
                Err(e)
            }
        }
    }

    /// Close any stream, unmount and power the bus down.  Idempotent.
    pub fn unmount(&mut self) {
        self.close_stream();
        if !self.mounted {
            return;
        }
        self.medium.unmount();
        self.bus.end();
        self.catalogue.clear();
        self.mounted = false;
        info!("Card unmounted, bus released, ready for deep sleep");
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    /// Card type and size, while mounted.
    pub fn card_info(&self) -> Option<CardInfo> {
        self.mounted.then(|| self.medium.card_info())
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    /// Direct access to the medium for fault injection in tests.
    #[cfg(test)]
    fn medium_mut(&mut self) -> &mut M {
        &mut self.medium
    }

    // ── Catalogue ────────────────────────────────────────────────────────────

    pub fn count(&self) -> usize {
        self.catalogue.len()
    }

    pub fn entry_at(&self, index: usize) -> Result<CatalogueEntry> {
        self.catalogue.get(index)
    }

    pub fn entries(&self) -> impl Iterator<Item = CatalogueEntry> + '_ {
        self.catalogue.iter()
    }

    pub fn manifest(&self) -> Manifest {
        Manifest::from(&self.catalogue)
    }

    // ── Streaming ────────────────────────────────────────────────────────────

    /// Open image `index` for block reads, closing any open stream first.
    ///
    /// An invalid index fails before the current stream is touched.  A
    /// failed open leaves no stream open, but the catalogue intact.
    pub fn open_stream(&mut self, index: usize) -> Result<()> {
        if !self.mounted {
            return Err(StorageError::NotMounted);
        }
        let entry = self.catalogue.get(index)?;

        self.stream.close();
        let file = self.medium.open(entry.path.as_str()).map_err(|e| {
            error!("Failed to open {}: {e}", entry.path);
            StorageError::Io(e)
        })?;
        self.stream.open(index, entry, file);

        info!(
            "Opened {} ({} bytes, {} blocks)",
            entry.path, entry.file_size, entry.total_blocks
        );
        Ok(())
    }

    /// Next block of the open image; `Ok(None)` at end-of-data.
    pub fn read_next_block(&mut self) -> Result<Option<BlockReadResult>> {
        self.stream.read_next()
    }

    /// Fill `out` with the next block.  `Ok(false)` at end-of-data.
    pub fn read_next_block_into(&mut self, out: &mut BlockReadResult) -> Result<bool> {
        self.stream.read_next_into(out)
    }

    /// Re-read any block of the open image without moving the sequential
    /// cursor.
    pub fn read_block_at(&mut self, block_index: u32) -> Result<BlockReadResult> {
        self.stream.read_at(block_index)
    }

    pub fn close_stream(&mut self) {
        self.stream.close();
    }

    pub fn is_stream_open(&self) -> bool {
        self.stream.is_open()
    }

    /// Catalogue index of the open image.
    pub fn active_index(&self) -> Option<usize> {
        self.stream.active_index()
    }

    /// Next block index `read_next_block` will deliver.
    pub fn stream_cursor(&self) -> Option<u32> {
        self.stream.cursor()
    }

    // ── Checksum ─────────────────────────────────────────────────────────────

    /// Fletcher-16 of image `index`, or 0 if it cannot be computed.
    ///
    /// 0 is also the checksum of an empty file; check `file_size` before
    /// treating 0 as a failure.
    pub fn checksum(&mut self, index: usize) -> u16 {
        match self.try_checksum(index) {
            Ok(sum) => sum,
            Err(e)  => {
                warn!("Checksum of image {index} failed: {e}");
                0
            }
        }
    }

    /// Checksum with the failure reason.  Uses its own file handle, so an
    /// open stream is neither used nor disturbed.
    pub fn try_checksum(&mut self, index: usize) -> Result<u16> {
        if !self.mounted {
            return Err(StorageError::NotMounted);
        }
        let entry = self.catalogue.get(index)?;
        let file = self.medium.open(entry.path.as_str())?;
        Ok(fletcher16_reader(file)?)
    }

    /// Copy of entry `index` with its checksum filled in.  The catalogue's
    /// own entry is not modified.
    pub fn entry_with_checksum(&mut self, index: usize) -> Result<CatalogueEntry> {
        let mut entry = self.entry_at(index)?;
        entry.checksum = self.try_checksum(index)?;
        Ok(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BLOCK_SIZE, MAX_IMAGES};
    use crate::error::ErrorKind;
    use crate::medium::MemoryMedium;

    type MemReader = StorageReader<SimBus, MemoryMedium>;

    fn image(len: usize, seed: u8) -> Vec<u8> {
        (0..len).map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed)).collect()
    }

    fn reader_with(files: &[(&str, Vec<u8>)]) -> MemReader {
        let mut card = MemoryMedium::new();
        card.add_dir(IMAGE_DIR);
        for (name, data) in files {
            card.add_file(&format!("{IMAGE_DIR}/{name}"), data);
        }
        StorageReader::new(SimBus::new(), card)
    }

    fn mounted(files: &[(&str, Vec<u8>)]) -> MemReader {
        let mut r = reader_with(files);
        r.mount().unwrap();
        r
    }

    #[test]
    fn mount_scans_and_powers_bus() {
        let mut r = reader_with(&[("a.jpg", image(1000, 1)), ("b.jpeg", image(10, 2))]);
        assert_eq!(r.mount().unwrap(), 2);
        assert!(r.is_mounted());
        assert!(r.bus().is_powered());
        assert_eq!(r.card_info().unwrap().kind, CardType::Sdsc);
        assert_eq!(r.entry_at(0).unwrap().total_blocks, 2);
    }

    #[test]
    fn second_mount_does_not_rescan() {
        let mut r = mounted(&[("a.jpg", image(10, 1))]);
        r.medium_mut().add_file("/images/b.jpg", &[1, 2]);
        assert_eq!(r.mount().unwrap(), 1);

        r.unmount();
        assert_eq!(r.mount().unwrap(), 2);
    }

    #[test]
    fn bus_failure_leaves_everything_off() {
        let mut r = reader_with(&[("a.jpg", image(10, 1))]);
        r.bus.set_init_fault(Some("no ack"));
        let err = r.mount().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Medium);
        assert!(err.bus_released());
        assert!(!r.is_mounted());
        assert!(!r.bus().is_powered());
        assert_eq!(r.count(), 0);
    }

    #[test]
    fn mount_fault_powers_bus_down() {
        let mut r = reader_with(&[("a.jpg", image(10, 1))]);
        r.medium_mut().set_mount_fault(true);
        assert!(matches!(r.mount(), Err(StorageError::Mount(_))));
        assert!(!r.bus().is_powered());
        assert_eq!(r.bus().power_cycles(), 1);
    }

    #[test]
    fn missing_card_powers_bus_down() {
        let mut r = reader_with(&[("a.jpg", image(10, 1))]);
        r.medium_mut().set_present(false);
        assert!(matches!(r.mount(), Err(StorageError::NoMedium)));
        assert!(!r.bus().is_powered());
        assert!(!r.medium_mut().is_mounted());
        assert_eq!(r.card_info(), None);
    }

    #[test]
    fn scan_failure_stays_mounted() {
        let mut r = reader_with(&[]);
        r.medium_mut().add_file("/images/notes.txt", b"x");
        let err = r.mount().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Scan);
        assert!(r.is_mounted());
        assert!(r.bus().is_powered());
        assert_eq!(r.count(), 0);

        r.unmount();
        assert!(!r.bus().is_powered());
    }

    #[test]
    fn unmount_is_idempotent_and_forgets() {
        let mut r = mounted(&[("a.jpg", image(600, 1))]);
        r.open_stream(0).unwrap();
        r.unmount();
        assert!(!r.is_stream_open());
        assert_eq!(r.count(), 0);
        assert!(!r.is_mounted());
        r.unmount();
        assert_eq!(r.bus().power_cycles(), 1);
        assert!(matches!(r.open_stream(0), Err(StorageError::NotMounted)));
    }

    #[test]
    fn stream_roundtrips_file() {
        let data = image(3 * BLOCK_SIZE + 7, 9);
        let mut r = mounted(&[("a.jpg", data.clone())]);
        r.open_stream(0).unwrap();

        let mut out = Vec::new();
        let mut last_flags = 0;
        while let Some(b) = r.read_next_block().unwrap() {
            out.extend_from_slice(b.payload());
            last_flags += b.is_last as usize;
        }
        assert_eq!(out, data);
        assert_eq!(last_flags, 1);
        assert_eq!(r.stream_cursor(), Some(4));
    }

    #[test]
    fn read_without_stream_is_precondition() {
        let mut r = mounted(&[("a.jpg", image(10, 1))]);
        let err = r.read_next_block().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Precondition);
        assert!(matches!(r.read_block_at(0), Err(StorageError::NoStreamOpen)));
    }

    #[test]
    fn invalid_index_keeps_open_stream() {
        let mut r = mounted(&[("a.jpg", image(2 * BLOCK_SIZE, 1))]);
        r.open_stream(0).unwrap();
        r.read_next_block().unwrap();

        assert!(matches!(
            r.open_stream(5),
            Err(StorageError::IndexOutOfRange { index: 5, count: 1 })
        ));
        assert!(r.is_stream_open());
        assert_eq!(r.stream_cursor(), Some(1));
        assert!(r.entry_at(5).is_err());
        assert_eq!(r.count(), 1);
    }

    #[test]
    fn removed_file_fails_open_but_keeps_catalogue() {
        let mut r = mounted(&[("a.jpg", image(10, 1)), ("b.jpg", image(10, 2))]);
        r.open_stream(1).unwrap();
        r.medium_mut().remove("/images/a.jpg");

        let err = r.open_stream(0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
        assert!(!r.is_stream_open());
        assert_eq!(r.count(), 2);
        assert!(r.open_stream(1).is_ok());
    }

    #[test]
    fn seek_fault_fails_random_read_only() {
        let mut r = mounted(&[("a.jpg", image(3 * BLOCK_SIZE, 1))]);
        r.open_stream(0).unwrap();
        r.read_next_block().unwrap();

        r.medium_mut().set_seek_fault(true);
        assert_eq!(r.read_block_at(0).unwrap_err().kind(), ErrorKind::Io);
        assert!(r.is_mounted());
        assert_eq!(r.count(), 1);

        r.medium_mut().set_seek_fault(false);
        let b = r.read_next_block().unwrap().unwrap();
        assert_eq!(b.block_index, 1);
    }

    #[test]
    fn checksum_does_not_disturb_stream() {
        let mut r = mounted(&[("a.jpg", vec![1, 2, 3]), ("b.jpg", image(2 * BLOCK_SIZE, 4))]);
        r.open_stream(1).unwrap();
        r.read_next_block().unwrap();

        assert_eq!(r.checksum(0), 0x0A06);
        assert_eq!(r.checksum(0), 0x0A06);
        assert_eq!(r.active_index(), Some(1));
        assert_eq!(r.stream_cursor(), Some(1));
        assert_eq!(r.read_next_block().unwrap().unwrap().block_index, 1);
    }

    #[test]
    fn checksum_failures_are_zero() {
        let mut r = mounted(&[("a.jpg", vec![1, 2, 3]), ("e.jpg", vec![])]);
        assert_eq!(r.checksum(1), 0);
        assert_eq!(r.checksum(9), 0);
        r.medium_mut().remove("/images/a.jpg");
        assert_eq!(r.checksum(0), 0);
        assert!(r.try_checksum(0).is_err());

        r.unmount();
        assert!(matches!(r.try_checksum(0), Err(StorageError::NotMounted)));
    }

    #[test]
    fn checksum_is_not_cached_in_catalogue() {
        let mut r = mounted(&[("a.jpg", vec![1, 2, 3])]);
        assert_eq!(r.entry_with_checksum(0).unwrap().checksum, 0x0A06);
        assert_eq!(r.entry_at(0).unwrap().checksum, 0);
    }

    #[test]
    fn catalogue_is_capped() {
        let files: Vec<(String, Vec<u8>)> = (0..MAX_IMAGES + 3)
            .map(|i| (format!("img_{i:03}.jpg"), vec![i as u8]))
            .collect();
        let borrowed: Vec<(&str, Vec<u8>)> = files.iter().map(|(n, d)| (n.as_str(), d.clone())).collect();
        let r = mounted(&borrowed);
        assert_eq!(r.count(), MAX_IMAGES);
        assert_eq!(r.manifest().entries.len(), MAX_IMAGES);
    }
}
