pub mod config;
pub mod error;
pub mod bus;
pub mod medium;
pub mod block;
pub mod checksum;
pub mod catalogue;
pub mod stream;
pub mod reader;

pub use error::{ErrorKind, Result, StorageError};
pub use bus::{BusError, SimBus, StorageBus};
pub use medium::{CardInfo, CardType, HostMedium, MemoryMedium, StorageMedium};
pub use block::BlockReadResult;
pub use catalogue::{CatalogueEntry, Manifest};
pub use reader::{HostReader, StorageReader};
