//! Directory scan: build the catalogue from a single directory listing.
//!
//! # Rules
//!
//! | Entry | Outcome |
//! |-------|---------|
//! | subdirectory | skipped |
//! | name starting with `.` | skipped |
//! | extension not `.jpg` / `.jpeg` (any case) | skipped |
//! | path longer than `MAX_PATH_LEN` | skipped, with a warning |
//! | file larger than `u32::MAX` bytes | skipped, with a warning |
//! | anything else | catalogued |
//!
//! Enumeration stops as soon as the catalogue is full; further eligible
//! files are ignored without error.  Checksums are never computed here so
//! that mounting stays fast.

use log::{debug, warn};

use super::{Catalogue, CatalogueEntry, EntryPath};
use crate::config::{HIDDEN_PREFIX, IMAGE_EXTENSIONS, MAX_PATH_LEN};
use crate::error::{Result, StorageError};
use crate::medium::{MediumEntry, StorageMedium};

/// True if `name` carries one of the accepted image extensions.
pub fn has_image_extension(name: &str) -> bool {
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => {
            IMAGE_EXTENSIONS.iter().any(|e| ext.eq_ignore_ascii_case(e))
        }
        _ => false,
    }
}

/// Directory and hidden-file filter plus the extension check.
pub fn is_eligible(entry: &MediumEntry) -> bool {
    !entry.is_dir && !entry.name.starts_with(HIDDEN_PREFIX) && has_image_extension(&entry.name)
}

/// Replace the contents of `catalogue` with the eligible files in `dir`.
///
/// Returns the number of entries catalogued (always ≥ 1 on success).  On
/// failure the catalogue is left empty.
pub fn scan_directory<M: StorageMedium>(
    medium:    &mut M,
    dir:       &str,
    catalogue: &mut Catalogue,
) -> Result<usize> {
    catalogue.clear();

    let entries = medium.read_dir(dir)
        .map_err(|source| StorageError::DirectoryUnavailable { path: dir.to_owned(), source })?;

    for item in entries {
        if catalogue.is_full() {
            break;
        }
        let entry = match item {
            Ok(e)  => e,
            Err(e) => {
                // A listing error ends enumeration, like running off the end.
                warn!("Listing {dir} stopped early: {e}");
                break;
            }
        };
        if !is_eligible(&entry) {
            continue;
        }

        let Some(path) = EntryPath::join(dir, &entry.name) else {
            warn!("Skipping {}: path longer than {} bytes", entry.name, MAX_PATH_LEN);
            continue;
        };
        let Ok(file_size) = u32::try_from(entry.size) else {
            warn!("Skipping {path}: {} bytes exceeds 4 GiB", entry.size);
            continue;
        };

        let record = CatalogueEntry::new(path, file_size);
        debug!(
            " [{}] {} - {} B, {} blocks",
            catalogue.len(), record.path, record.file_size, record.total_blocks
        );
        catalogue.push(record);
    }

    if catalogue.is_empty() {
        return Err(StorageError::NoImages(dir.to_owned()));
    }
    Ok(catalogue.len())
}
