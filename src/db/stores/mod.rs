use async_trait::async_trait;

use super::DatabaseError;
use super::models::AuditEntry;

pub use self::audit::SqlAuditStore;
pub use self::records::RecordStore;
pub use self::sequences::{SequenceReport, SequenceStatus, SequenceStore, TableReport};

mod audit;
mod records;
mod sequences;

/// Read access to the audit trail. Newest entries come first.
#[async_trait]
pub trait AuditStore: Send + Sync {
    async fn recent(&self, limit: i64) -> Result<Vec<AuditEntry>, DatabaseError>;
    /// Entries for one table, matched case-insensitively.
    async fn by_table(&self, table: &str, limit: i64) -> Result<Vec<AuditEntry>, DatabaseError>;
    async fn get(&self, id: i64) -> Result<Option<AuditEntry>, DatabaseError>;
}
