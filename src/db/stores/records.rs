use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use tracing::debug;

use crate::db::DatabaseError;
use crate::db::catalog::{Catalog, KEY_SEQUENCES_TABLE, KeyStrategy, TableSpec};
use crate::db::models::{AuditOperation, Draft, Entity};
use crate::db::pool::{ConnectionPool, with_conn};
use crate::db::sql::{Executor, SqlValue};

/// CRUD over any [`Entity`], routed to the table the catalog assigns it.
#[derive(Clone)]
pub struct RecordStore {
    pool: ConnectionPool,
    catalog: Arc<Catalog>,
}

impl RecordStore {
    pub fn new(pool: ConnectionPool, catalog: Arc<Catalog>) -> Self {
        Self { pool, catalog }
    }

    pub async fn list<E: Entity>(&self) -> Result<Vec<E>, DatabaseError> {
        let spec = self.catalog.spec(E::KIND).clone();
        with_conn!(self.pool, |conn| select_all::<E, _>(conn, &spec))
    }

    pub async fn get<E: Entity>(&self, id: i64) -> Result<Option<E>, DatabaseError> {
        let spec = self.catalog.spec(E::KIND).clone();
        with_conn!(self.pool, |conn| select_one::<E, _>(conn, &spec, id))
    }

    /// Inserts a row and returns its new id.
    pub async fn create<E: Entity>(&self, draft: &E::Draft) -> Result<i64, DatabaseError> {
        let spec = self.writable_spec::<E>()?;
        let audit = AuditContext::from(self.catalog.as_ref());
        let values = draft.values();
        with_conn!(self.pool, |conn| conn.atomically(|tx| {
            insert_row::<E, _>(tx, &spec, &audit, values)
        }))
    }

    /// Returns `false` when no row has `id`.
    pub async fn update<E: Entity>(
        &self,
        id: i64,
        draft: &E::Draft,
    ) -> Result<bool, DatabaseError> {
        let spec = self.writable_spec::<E>()?;
        let audit = AuditContext::from(self.catalog.as_ref());
        let values = draft.values();
        with_conn!(self.pool, |conn| conn.atomically(|tx| {
            update_row::<E, _>(tx, &spec, &audit, id, values)
        }))
    }

    /// Returns `false` when no row has `id`.
    pub async fn delete<E: Entity>(&self, id: i64) -> Result<bool, DatabaseError> {
        let spec = self.writable_spec::<E>()?;
        let audit = AuditContext::from(self.catalog.as_ref());
        with_conn!(self.pool, |conn| conn.atomically(|tx| {
            delete_row::<E, _>(tx, &spec, &audit, id)
        }))
    }

    fn writable_spec<E: Entity>(&self) -> Result<TableSpec, DatabaseError> {
        let spec = self.catalog.spec(E::KIND);
        if spec.is_writable() {
            Ok(spec.clone())
        } else {
            Err(DatabaseError::ReadOnly(E::KIND.plural().to_string()))
        }
    }
}

#[derive(Debug, Clone)]
struct AuditContext {
    table: String,
    user: String,
}

impl From<&Catalog> for AuditContext {
    fn from(catalog: &Catalog) -> Self {
        Self {
            table: catalog.audit_table().to_string(),
            user: catalog.audit_user().to_string(),
        }
    }
}

fn select_all<E: Entity, C: Executor>(
    conn: &mut C,
    spec: &TableSpec,
) -> Result<Vec<E>, DatabaseError> {
    let sql = format!(
        "SELECT {} FROM {} ORDER BY {}",
        E::COLUMNS.join(", "),
        spec.table,
        E::ID_COLUMN
    );
    conn.load_sql::<E>(&sql, &[])
}

fn select_one<E: Entity, C: Executor>(
    conn: &mut C,
    spec: &TableSpec,
    id: i64,
) -> Result<Option<E>, DatabaseError> {
    let sql = format!(
        "SELECT {} FROM {} WHERE {} = {}",
        E::COLUMNS.join(", "),
        spec.table,
        E::ID_COLUMN,
        C::placeholder(1)
    );
    Ok(conn.load_sql::<E>(&sql, &[SqlValue::BigInt(id)])?.into_iter().next())
}

/// Draws the next key for `spec`. Must run inside the insert's transaction.
pub(crate) fn next_key<E: Entity, C: Executor>(
    conn: &mut C,
    spec: &TableSpec,
) -> Result<i64, DatabaseError> {
    match &spec.key {
        KeyStrategy::Sequence(name) => {
            let advanced = conn.execute_sql(
                &format!(
                    "UPDATE {KEY_SEQUENCES_TABLE} SET next_value = next_value + 1 WHERE name = {}",
                    C::placeholder(1)
                ),
                &[SqlValue::from(name.as_str())],
            )?;
            if advanced == 0 {
                return Err(DatabaseError::SequenceMissing(name.clone()));
            }
            conn.scalar(
                &format!(
                    "SELECT next_value - 1 AS value FROM {KEY_SEQUENCES_TABLE} WHERE name = {}",
                    C::placeholder(1)
                ),
                &[SqlValue::from(name.as_str())],
            )
        }
        KeyStrategy::MaxPlusOne => {
            conn.lock_for_keys(&spec.table)?;
            max_plus_one(conn, &spec.table, E::ID_COLUMN)
        }
        KeyStrategy::None => Err(DatabaseError::ReadOnly(spec.kind.plural().to_string())),
    }
}

pub(crate) fn max_plus_one<C: Executor>(
    conn: &mut C,
    table: &str,
    id_column: &str,
) -> Result<i64, DatabaseError> {
    conn.scalar(
        &format!("SELECT COALESCE(MAX({id_column}), 0) + 1 AS value FROM {table}"),
        &[],
    )
}

fn insert_row<E: Entity, C: Executor>(
    conn: &mut C,
    spec: &TableSpec,
    audit: &AuditContext,
    values: Vec<SqlValue>,
) -> Result<i64, DatabaseError> {
    let id = next_key::<E, C>(conn, spec)?;

    let mut columns = vec![E::ID_COLUMN];
    columns.extend_from_slice(<E::Draft as Draft>::COLUMNS);
    let mut binds = Vec::with_capacity(columns.len() + 1);
    binds.push(SqlValue::BigInt(id));
    binds.extend(values);
    if let (Some(column), Some(value)) = (E::FIXED_COLUMN, spec.fixed_value.as_ref()) {
        columns.push(column);
        binds.push(SqlValue::Text(value.clone()));
    }

    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        spec.table,
        columns.join(", "),
        C::placeholders(1, binds.len())
    );
    conn.execute_sql(&sql, &binds)?;

    let inserted = select_one::<E, C>(conn, spec, id)?;
    record_audit(conn, audit, AuditOperation::Insert, &spec.table, None, inserted.as_ref())?;

    debug!(table = %spec.table, id, "row inserted");
    Ok(id)
}

fn update_row<E: Entity, C: Executor>(
    conn: &mut C,
    spec: &TableSpec,
    audit: &AuditContext,
    id: i64,
    values: Vec<SqlValue>,
) -> Result<bool, DatabaseError> {
    let Some(before) = select_one::<E, C>(conn, spec, id)? else {
        return Ok(false);
    };

    let columns = <E::Draft as Draft>::COLUMNS;
    let assignments = columns
        .iter()
        .enumerate()
        .map(|(i, column)| format!("{} = {}", column, C::placeholder(i + 1)))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!(
        "UPDATE {} SET {} WHERE {} = {}",
        spec.table,
        assignments,
        E::ID_COLUMN,
        C::placeholder(columns.len() + 1)
    );
    let mut binds = values;
    binds.push(SqlValue::BigInt(id));
    conn.execute_sql(&sql, &binds)?;

    let after = select_one::<E, C>(conn, spec, id)?;
    record_audit(
        conn,
        audit,
        AuditOperation::Update,
        &spec.table,
        Some(&before),
        after.as_ref(),
    )?;

    debug!(table = %spec.table, id, "row updated");
    Ok(true)
}

fn delete_row<E: Entity, C: Executor>(
    conn: &mut C,
    spec: &TableSpec,
    audit: &AuditContext,
    id: i64,
) -> Result<bool, DatabaseError> {
    let Some(before) = select_one::<E, C>(conn, spec, id)? else {
        return Ok(false);
    };

    let sql = format!(
        "DELETE FROM {} WHERE {} = {}",
        spec.table,
        E::ID_COLUMN,
        C::placeholder(1)
    );
    conn.execute_sql(&sql, &[SqlValue::BigInt(id)])?;
    record_audit::<E, C>(conn, audit, AuditOperation::Delete, &spec.table, Some(&before), None)?;

    debug!(table = %spec.table, id, "row deleted");
    Ok(true)
}

fn snapshot<E: Entity>(row: Option<&E>) -> Result<Option<String>, DatabaseError> {
    row.map(serde_json::to_string)
        .transpose()
        .map_err(|e| DatabaseError::Query(format!("failed to snapshot row: {e}")))
}

fn record_audit<E: Entity, C: Executor>(
    conn: &mut C,
    audit: &AuditContext,
    operation: AuditOperation,
    table: &str,
    before: Option<&E>,
    after: Option<&E>,
) -> Result<(), DatabaseError> {
    // Every write ends here, so the audit lock is always the last one taken.
    conn.lock_for_keys(&audit.table)?;
    let id = max_plus_one(conn, &audit.table, "id_auditoria")?;
    let sql = format!(
        "INSERT INTO {} \
         (id_auditoria, user_name, fecha, tipo_operacion, nombre_table, anterior, nuevo) \
         VALUES ({})",
        audit.table,
        C::placeholders(1, 7)
    );
    conn.execute_sql(
        &sql,
        &[
            SqlValue::BigInt(id),
            SqlValue::from(audit.user.as_str()),
            SqlValue::Text(Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)),
            SqlValue::from(operation.as_str()),
            SqlValue::from(table.to_uppercase()),
            SqlValue::NullableText(snapshot(before)?),
            SqlValue::NullableText(snapshot(after)?),
        ],
    )?;
    Ok(())
}
