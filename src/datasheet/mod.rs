//! Datasheet engine: column schemas, row validation, import planning,
//! export rendering and the storage seam.

pub mod error;
pub mod export;
pub mod importer;
pub mod memory;
pub mod schema;
pub mod store;
pub mod validator;

pub use error::{DatasheetError, DatasheetResult, ErrorKind};
pub use export::{ExportFile, ExportFormat};
pub use memory::MemoryStore;
pub use store::{DatasheetStore, StoreRead, StoreTx};
