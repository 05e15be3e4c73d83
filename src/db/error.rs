use thiserror::Error;

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("connection error: {0}")]
    Connection(String),
    #[error("query error: {0}")]
    Query(String),
    #[error("migration error: {0}")]
    Migration(String),
    #[error("{0} is read-only on this server")]
    ReadOnly(String),
    #[error("key sequence {0} does not exist; run provision-sequences")]
    SequenceMissing(String),
}

impl From<diesel::result::Error> for DatabaseError {
    fn from(value: diesel::result::Error) -> Self {
        DatabaseError::Query(value.to_string())
    }
}

impl From<diesel::r2d2::PoolError> for DatabaseError {
    fn from(value: diesel::r2d2::PoolError) -> Self {
        DatabaseError::Connection(value.to_string())
    }
}
