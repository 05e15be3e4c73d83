pub use self::parser::{Config, DatabaseConfig, DbType, LoggingConfig, ServiceRole, SiteConfig};
pub use self::validator::ConfigError;

mod parser;
mod validator;
