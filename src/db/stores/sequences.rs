use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use crate::db::DatabaseError;
use crate::db::catalog::{Catalog, KEY_SEQUENCES_TABLE, TableSpec};
use crate::db::pool::{ConnectionPool, with_conn};
use crate::db::sql::{Executor, SqlValue};

use super::records::max_plus_one;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SequenceStatus {
    Created { start: i64 },
    Existing { next: i64 },
    Missing,
}

impl fmt::Display for SequenceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SequenceStatus::Created { start } => write!(f, "created, starts at {start}"),
            SequenceStatus::Existing { next } => write!(f, "next value {next}"),
            SequenceStatus::Missing => f.write_str("missing"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SequenceReport {
    pub name: String,
    pub table: String,
    #[serde(flatten)]
    pub status: SequenceStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct TableReport {
    pub table: String,
    /// Row count, or the error reading the table raised.
    pub rows: Result<i64, String>,
}

/// Key sequence provisioning and the connectivity diagnostics behind `check`.
#[derive(Clone)]
pub struct SequenceStore {
    pool: ConnectionPool,
    catalog: Arc<Catalog>,
}

/// Owned copy of what one sequence covers, so it can cross into the worker.
#[derive(Debug, Clone)]
struct SequenceTarget {
    name: String,
    table: String,
    id_column: &'static str,
}

impl SequenceTarget {
    fn report(&self, status: SequenceStatus) -> SequenceReport {
        SequenceReport {
            name: self.name.clone(),
            table: self.table.clone(),
            status,
        }
    }
}

impl From<(&str, &TableSpec)> for SequenceTarget {
    fn from((name, spec): (&str, &TableSpec)) -> Self {
        Self {
            name: name.to_string(),
            table: spec.table.clone(),
            id_column: spec.kind.id_column(),
        }
    }
}

fn peek<C: Executor>(conn: &mut C, name: &str) -> Result<Option<i64>, DatabaseError> {
    let exists = conn.scalar(
        &format!(
            "SELECT COUNT(*) AS value FROM {KEY_SEQUENCES_TABLE} WHERE name = {}",
            C::placeholder(1)
        ),
        &[SqlValue::from(name)],
    )?;
    if exists == 0 {
        return Ok(None);
    }
    conn.scalar(
        &format!(
            "SELECT next_value AS value FROM {KEY_SEQUENCES_TABLE} WHERE name = {}",
            C::placeholder(1)
        ),
        &[SqlValue::from(name)],
    )
    .map(Some)
}

fn provision_one<C: Executor>(
    conn: &mut C,
    target: &SequenceTarget,
) -> Result<SequenceReport, DatabaseError> {
    conn.atomically(|tx| {
        tx.lock_for_keys(KEY_SEQUENCES_TABLE)?;
        if let Some(next) = peek(tx, &target.name)? {
            return Ok(target.report(SequenceStatus::Existing { next }));
        }
        let start = max_plus_one(tx, &target.table, target.id_column)?;
        tx.execute_sql(
            &format!(
                "INSERT INTO {KEY_SEQUENCES_TABLE} (name, next_value) VALUES ({})",
                C::placeholders(1, 2)
            ),
            &[SqlValue::from(target.name.as_str()), SqlValue::BigInt(start)],
        )?;
        Ok(target.report(SequenceStatus::Created { start }))
    })
}

fn inspect_sequence<C: Executor>(conn: &mut C, target: &SequenceTarget) -> SequenceReport {
    match peek(conn, &target.name) {
        Ok(Some(next)) => target.report(SequenceStatus::Existing { next }),
        Ok(None) | Err(_) => target.report(SequenceStatus::Missing),
    }
}

fn count_rows<C: Executor>(conn: &mut C, table: &str) -> TableReport {
    let rows = conn
        .scalar(&format!("SELECT COUNT(*) AS value FROM {table}"), &[])
        .map_err(|e| e.to_string());
    TableReport {
        table: table.to_string(),
        rows,
    }
}

impl SequenceStore {
    pub fn new(pool: ConnectionPool, catalog: Arc<Catalog>) -> Self {
        Self { pool, catalog }
    }

    fn targets(&self) -> Vec<SequenceTarget> {
        self.catalog
            .sequences()
            .into_iter()
            .map(SequenceTarget::from)
            .collect()
    }

    /// Creates every missing sequence at `MAX(id) + 1` of its table and
    /// reports the value of the ones that already exist.
    pub async fn provision(&self) -> Result<Vec<SequenceReport>, DatabaseError> {
        let targets = self.targets();
        let reports = with_conn!(self.pool, |conn| {
            targets
                .iter()
                .map(|target| provision_one(conn, target))
                .collect::<Result<Vec<_>, _>>()
        })?;

        for report in &reports {
            info!(sequence = %report.name, table = %report.table, "{}", report.status);
        }
        Ok(reports)
    }

    /// Row counts for every table the role serves, its audit table included,
    /// plus the next value of every sequence. Nothing is consumed.
    pub async fn inspect(
        &self,
    ) -> Result<(Vec<TableReport>, Vec<SequenceReport>), DatabaseError> {
        let mut tables: Vec<String> =
            self.catalog.specs().map(|spec| spec.table.clone()).collect();
        tables.push(self.catalog.audit_table().to_string());
        let targets = self.targets();

        with_conn!(self.pool, |conn| {
            let tables: Vec<TableReport> =
                tables.iter().map(|table| count_rows(conn, table)).collect();
            let sequences: Vec<SequenceReport> = targets
                .iter()
                .map(|target| inspect_sequence(conn, target))
                .collect();
            Ok((tables, sequences))
        })
    }
}
