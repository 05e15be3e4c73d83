use std::time::Duration;

use diesel::connection::SimpleConnection;
use diesel::pg::PgConnection;
use diesel::r2d2::{self, ConnectionManager, CustomizeConnection};
use diesel::sqlite::SqliteConnection;
use tracing::info;

use crate::config::{DatabaseConfig, DbType};
use crate::db::DatabaseError;

pub type PgPool = r2d2::Pool<ConnectionManager<PgConnection>>;
pub type SqlitePool = r2d2::Pool<ConnectionManager<SqliteConnection>>;

const SQLITE_BUSY_TIMEOUT_MS: u32 = 5000;

/// Pooled connections for whichever backend the connection string names.
///
/// Both pools validate a connection on checkout, so a connection the server
/// dropped is replaced before the statement runs.
#[derive(Clone)]
pub enum ConnectionPool {
    Postgres(PgPool),
    Sqlite(SqlitePool),
}

/// WAL lets readers run beside the single writer. The busy timeout makes
/// a writer wait for the lock instead of failing at once.
#[derive(Debug)]
struct SqlitePragmas;

impl CustomizeConnection<SqliteConnection, r2d2::Error> for SqlitePragmas {
    fn on_acquire(&self, conn: &mut SqliteConnection) -> Result<(), r2d2::Error> {
        conn.batch_execute(&format!(
            "PRAGMA busy_timeout = {SQLITE_BUSY_TIMEOUT_MS}; PRAGMA journal_mode = WAL;"
        ))
        .map_err(r2d2::Error::QueryError)
    }
}

impl ConnectionPool {
    /// Builds the pool. Blocks until `min_connections` are established or
    /// the connection timeout elapses.
    pub fn build(config: &DatabaseConfig) -> Result<Self, DatabaseError> {
        let timeout = Duration::from_secs(config.connection_timeout_secs.max(1));

        match config.db_type() {
            DbType::Postgres => {
                let manager = ConnectionManager::<PgConnection>::new(config.connection_string());
                let pool = r2d2::Pool::builder()
                    .max_size(config.max_connections())
                    .min_idle(Some(config.min_connections()))
                    .connection_timeout(timeout)
                    .test_on_check_out(true)
                    .build(manager)
                    .map_err(|e| DatabaseError::Connection(e.to_string()))?;
                info!(max = config.max_connections(), "postgres pool ready");
                Ok(ConnectionPool::Postgres(pool))
            }
            DbType::Sqlite => {
                let path = config.sqlite_path().unwrap_or_default();
                let manager = ConnectionManager::<SqliteConnection>::new(path.as_str());
                let pool = r2d2::Pool::builder()
                    .max_size(config.max_connections())
                    .min_idle(Some(config.min_connections()))
                    .connection_timeout(timeout)
                    .test_on_check_out(true)
                    .connection_customizer(Box::new(SqlitePragmas))
                    .build(manager)
                    .map_err(|e| DatabaseError::Connection(e.to_string()))?;
                info!(path = %path, "sqlite pool ready");
                Ok(ConnectionPool::Sqlite(pool))
            }
        }
    }

    pub fn db_type(&self) -> DbType {
        match self {
            ConnectionPool::Postgres(_) => DbType::Postgres,
            ConnectionPool::Sqlite(_) => DbType::Sqlite,
        }
    }
}

/// Runs `$body` on a pooled connection inside `spawn_blocking`.
///
/// `$conn` is bound to `&mut PgConnection` or `&mut SqliteConnection`, so the
/// body must only use code that is generic over [`crate::db::sql::Executor`].
/// Evaluates to `Result<T, DatabaseError>`.
macro_rules! with_conn {
    ($pool:expr, |$conn:ident| $body:expr) => {{
        let pool = $pool.clone();
        tokio::task::spawn_blocking(move || -> Result<_, $crate::db::DatabaseError> {
            match pool {
                $crate::db::pool::ConnectionPool::Postgres(pool) => {
                    let mut guard = pool.get()?;
                    let $conn: &mut diesel::pg::PgConnection = &mut guard;
                    $body
                }
                $crate::db::pool::ConnectionPool::Sqlite(pool) => {
                    let mut guard = pool.get()?;
                    let $conn: &mut diesel::sqlite::SqliteConnection = &mut guard;
                    $body
                }
            }
        })
        .await
        .map_err(|e| $crate::db::DatabaseError::Query(format!("database task failed: {e}")))?
    }};
}

pub(crate) use with_conn;
