//! Backend-neutral statement execution.
//!
//! Table and column names come from the catalog and are formatted into the
//! statement text; every value travels as a bound parameter.

use diesel::backend::Backend;
use diesel::pg::{Pg, PgConnection};
use diesel::prelude::*;
use diesel::query_builder::{BoxedSqlQuery, SqlQuery};
use diesel::serialize::ToSql;
use diesel::sql_types::{BigInt, Double, HasSqlType, Nullable, Text};
use diesel::sqlite::{Sqlite, SqliteConnection};

use super::DatabaseError;

/// A bound statement parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    BigInt(i64),
    Double(f64),
    Text(String),
    NullableText(Option<String>),
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        SqlValue::BigInt(value)
    }
}

impl From<f64> for SqlValue {
    fn from(value: f64) -> Self {
        SqlValue::Double(value)
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        SqlValue::Text(value)
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        SqlValue::Text(value.to_string())
    }
}

impl From<Option<String>> for SqlValue {
    fn from(value: Option<String>) -> Self {
        SqlValue::NullableText(value)
    }
}

/// Rows the stores can load from either backend.
pub trait Row: QueryableByName<Pg> + QueryableByName<Sqlite> + Send + 'static {}

impl<T> Row for T where T: QueryableByName<Pg> + QueryableByName<Sqlite> + Send + 'static {}

/// Single integer column, aliased as `value` in the statement.
#[derive(Debug, QueryableByName)]
pub struct Scalar {
    #[diesel(sql_type = BigInt)]
    pub value: i64,
}

pub trait Executor: Sized {
    /// Positional parameter marker for the 1-based `index`.
    fn placeholder(index: usize) -> String;

    fn execute_sql(&mut self, sql: &str, values: &[SqlValue]) -> Result<usize, DatabaseError>;

    fn load_sql<R: Row>(
        &mut self,
        sql: &str,
        values: &[SqlValue],
    ) -> Result<Vec<R>, DatabaseError>;

    /// Runs `operation` in a transaction. On SQLite the write lock is held
    /// from the first statement.
    fn atomically<T, F>(&mut self, operation: F) -> Result<T, DatabaseError>
    where
        F: FnOnce(&mut Self) -> Result<T, DatabaseError>;

    /// Blocks other writers of `table` until the transaction ends. Taken
    /// before reading `MAX(id)` to derive a new key.
    fn lock_for_keys(&mut self, table: &str) -> Result<(), DatabaseError>;

    fn scalar(&mut self, sql: &str, values: &[SqlValue]) -> Result<i64, DatabaseError> {
        self.load_sql::<Scalar>(sql, values)?
            .into_iter()
            .next()
            .map(|row| row.value)
            .ok_or_else(|| DatabaseError::Query(format!("no row returned by: {sql}")))
    }

    /// `count` markers starting at `first`, comma separated.
    fn placeholders(first: usize, count: usize) -> String {
        (first..first + count)
            .map(Self::placeholder)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

fn bind_values<DB>(
    mut query: BoxedSqlQuery<'static, DB, SqlQuery>,
    values: &[SqlValue],
) -> BoxedSqlQuery<'static, DB, SqlQuery>
where
    DB: Backend + HasSqlType<BigInt> + HasSqlType<Double> + HasSqlType<Text>,
    i64: ToSql<BigInt, DB>,
    f64: ToSql<Double, DB>,
    String: ToSql<Text, DB>,
    Option<String>: ToSql<Nullable<Text>, DB>,
{
    for value in values {
        query = match value {
            SqlValue::BigInt(v) => query.bind::<BigInt, _>(*v),
            SqlValue::Double(v) => query.bind::<Double, _>(*v),
            SqlValue::Text(v) => query.bind::<Text, _>(v.clone()),
            SqlValue::NullableText(v) => query.bind::<Nullable<Text>, _>(v.clone()),
        };
    }
    query
}

macro_rules! impl_executor {
    (
        $conn:ty,
        $backend:ty,
        |$index:ident| $placeholder:expr,
        $transaction:ident,
        |$table:ident| $lock:expr
    ) => {
        impl Executor for $conn {
            fn placeholder($index: usize) -> String {
                $placeholder
            }

            fn execute_sql(
                &mut self,
                sql: &str,
                values: &[SqlValue],
            ) -> Result<usize, DatabaseError> {
                let query = diesel::sql_query(sql).into_boxed::<$backend>();
                Ok(bind_values(query, values).execute(self)?)
            }

            fn load_sql<R: Row>(
                &mut self,
                sql: &str,
                values: &[SqlValue],
            ) -> Result<Vec<R>, DatabaseError> {
                let query = diesel::sql_query(sql).into_boxed::<$backend>();
                Ok(bind_values(query, values).load::<R>(self)?)
            }

            fn atomically<T, F>(&mut self, operation: F) -> Result<T, DatabaseError>
            where
                F: FnOnce(&mut Self) -> Result<T, DatabaseError>,
            {
                self.$transaction(operation)
            }

            fn lock_for_keys(&mut self, $table: &str) -> Result<(), DatabaseError> {
                match $lock {
                    Some(sql) => self.execute_sql(&sql, &[]).map(|_| ()),
                    None => Ok(()),
                }
            }
        }
    };
}

impl_executor!(
    PgConnection,
    Pg,
    |index| format!("${index}"),
    transaction,
    |table| Some(format!("LOCK TABLE {table} IN SHARE ROW EXCLUSIVE MODE"))
);

// `BEGIN IMMEDIATE` takes the database write lock up front, which already
// serializes every key allocation.
impl_executor!(
    SqliteConnection,
    Sqlite,
    |_index| "?".to_string(),
    immediate_transaction,
    |_table| None::<String>
);
