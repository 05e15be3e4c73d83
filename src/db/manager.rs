use std::sync::Arc;

use tracing::info;

use crate::config::{DatabaseConfig, DbType};
use crate::db::DatabaseError;
use crate::db::catalog::Catalog;
use crate::db::pool::{ConnectionPool, with_conn};
use crate::db::schema::bootstrap_statements;
use crate::db::sql::{Executor, Scalar};
use crate::db::stores::{AuditStore, RecordStore, SequenceStore, SqlAuditStore};

#[derive(Clone)]
pub struct DatabaseManager {
    pool: ConnectionPool,
    catalog: Arc<Catalog>,
    records: RecordStore,
    audit_store: Arc<dyn AuditStore>,
    sequences: SequenceStore,
}

impl DatabaseManager {
    pub async fn new(config: &DatabaseConfig, catalog: Catalog) -> Result<Self, DatabaseError> {
        let config = config.clone();
        let pool = tokio::task::spawn_blocking(move || ConnectionPool::build(&config))
            .await
            .map_err(|e| DatabaseError::Connection(format!("pool task failed: {e}")))??;

        let catalog = Arc::new(catalog);
        let records = RecordStore::new(pool.clone(), catalog.clone());
        let audit_store = Arc::new(SqlAuditStore::new(pool.clone(), catalog.audit_table()));
        let sequences = SequenceStore::new(pool.clone(), catalog.clone());

        Ok(Self {
            pool,
            catalog,
            records,
            audit_store,
            sequences,
        })
    }

    /// Creates the role's tables, its audit table and the key sequence table
    /// when they are missing.
    pub async fn migrate(&self) -> Result<(), DatabaseError> {
        let statements = bootstrap_statements(&self.catalog);
        let count = statements.len();
        with_conn!(self.pool, |conn| {
            for statement in &statements {
                conn.execute_sql(statement, &[])
                    .map_err(|e| DatabaseError::Migration(e.to_string()))?;
            }
            Ok(())
        })?;
        info!(role = %self.catalog.role(), statements = count, "schema ready");
        Ok(())
    }

    pub async fn ping(&self) -> Result<(), DatabaseError> {
        with_conn!(self.pool, |conn| {
            conn.load_sql::<Scalar>("SELECT CAST(1 AS BIGINT) AS value", &[]).map(|_| ())
        })
    }

    pub fn records(&self) -> &RecordStore {
        &self.records
    }

    pub fn audit_store(&self) -> Arc<dyn AuditStore> {
        self.audit_store.clone()
    }

    pub fn sequences(&self) -> &SequenceStore {
        &self.sequences
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn db_type(&self) -> DbType {
        self.pool.db_type()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use tempfile::NamedTempFile;

    use super::DatabaseManager;
    use crate::config::{DatabaseConfig, ServiceRole, SiteConfig};
    use crate::db::catalog::Catalog;

    /// A migrated manager over a fresh SQLite file. Keep the file alive for
    /// as long as the manager is used.
    pub(crate) async fn sqlite_manager(role: ServiceRole) -> (NamedTempFile, DatabaseManager) {
        pooled_sqlite_manager(role, 1).await
    }

    pub(crate) async fn pooled_sqlite_manager(
        role: ServiceRole,
        connections: u32,
    ) -> (NamedTempFile, DatabaseManager) {
        let file = NamedTempFile::new().expect("temp sqlite file");
        let mut config = DatabaseConfig::sqlite(file.path().to_string_lossy().to_string());
        config.max_connections = Some(connections);
        config.min_connections = Some(1);

        let audit_user = match role {
            ServiceRole::Primary => "master",
            ServiceRole::Replica => "esclavo",
        };
        let catalog = Catalog::new(
            role,
            &SiteConfig::default(),
            audit_user,
            role == ServiceRole::Replica,
        );
        let manager = DatabaseManager::new(&config, catalog).await.expect("db manager");
        manager.migrate().await.expect("migrate");
        (file, manager)
    }
}
