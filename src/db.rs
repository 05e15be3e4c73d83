pub use self::catalog::{Catalog, TableSpec};
pub use self::error::DatabaseError;
pub use self::manager::DatabaseManager;
pub use self::models::{AuditEntry, EntityKind};
pub use self::stores::{AuditStore, RecordStore, SequenceReport, SequenceStatus, TableReport};

pub mod catalog;
pub mod error;
pub mod manager;
pub mod models;
pub mod pool;
pub mod schema;
pub mod sql;
pub mod stores;
