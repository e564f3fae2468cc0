//! Library entry for app-inventory: the installed-apps synchronization core and its
//! storage, enumeration and CLI adapters.

pub mod args;
pub mod config;
pub mod error;
pub mod model;
pub mod serializer;
pub mod source;
pub mod store;
pub mod sync;
pub mod util;

pub use error::{EnumerationError, StoreError, StoreErrorKind, SyncError, SyncResult};
pub use model::{App, PackageId};
pub use sync::{
    Completion, InventorySynchronizer, PopulateCompletion, PopulateOutcome, RepairReport,
    Repositories, SyncOptions,
};
