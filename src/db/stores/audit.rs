use async_trait::async_trait;

use crate::db::DatabaseError;
use crate::db::models::AuditEntry;
use crate::db::pool::{ConnectionPool, with_conn};
use crate::db::sql::{Executor, SqlValue};

use super::AuditStore;

const NEWEST_FIRST: &str = "ORDER BY fecha DESC, id_auditoria DESC";

/// Reads the audit table of the running role.
pub struct SqlAuditStore {
    pool: ConnectionPool,
    table: String,
}

impl SqlAuditStore {
    pub fn new(pool: ConnectionPool, table: impl Into<String>) -> Self {
        Self {
            pool,
            table: table.into(),
        }
    }
}

fn select_list(table: &str) -> String {
    format!("SELECT {} FROM {}", AuditEntry::COLUMNS.join(", "), table)
}

fn load_recent<C: Executor>(
    conn: &mut C,
    table: &str,
    limit: i64,
) -> Result<Vec<AuditEntry>, DatabaseError> {
    let sql = format!("{} {NEWEST_FIRST} LIMIT {}", select_list(table), C::placeholder(1));
    conn.load_sql(&sql, &[SqlValue::BigInt(limit)])
}

fn load_by_table<C: Executor>(
    conn: &mut C,
    table: &str,
    name: &str,
    limit: i64,
) -> Result<Vec<AuditEntry>, DatabaseError> {
    let sql = format!(
        "{} WHERE UPPER(nombre_table) = UPPER({}) {NEWEST_FIRST} LIMIT {}",
        select_list(table),
        C::placeholder(1),
        C::placeholder(2)
    );
    conn.load_sql(&sql, &[SqlValue::from(name), SqlValue::BigInt(limit)])
}

fn load_one<C: Executor>(
    conn: &mut C,
    table: &str,
    id: i64,
) -> Result<Option<AuditEntry>, DatabaseError> {
    let sql = format!("{} WHERE id_auditoria = {}", select_list(table), C::placeholder(1));
    Ok(conn
        .load_sql::<AuditEntry>(&sql, &[SqlValue::BigInt(id)])?
        .into_iter()
        .next())
}

#[async_trait]
impl AuditStore for SqlAuditStore {
    async fn recent(&self, limit: i64) -> Result<Vec<AuditEntry>, DatabaseError> {
        let table = self.table.clone();
        with_conn!(self.pool, |conn| load_recent(conn, &table, limit))
    }

    async fn by_table(&self, name: &str, limit: i64) -> Result<Vec<AuditEntry>, DatabaseError> {
        let table = self.table.clone();
        let name = name.to_string();
        with_conn!(self.pool, |conn| load_by_table(conn, &table, &name, limit))
    }

    async fn get(&self, id: i64) -> Result<Option<AuditEntry>, DatabaseError> {
        let table = self.table.clone();
        with_conn!(self.pool, |conn| load_one(conn, &table, id))
    }
}
