use super::ConfigError;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::fmt;
use std::path::Path;
use url::Url;

pub const DEFAULT_CONFIG_PATH: &str = "config.yaml";

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub site: SiteConfig,
}

/// Which side of the deployment this process serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ServiceRole {
    #[default]
    #[serde(alias = "master")]
    #[value(alias = "master")]
    Primary,
    #[serde(alias = "slave", alias = "esclavo")]
    #[value(alias = "slave", alias = "esclavo")]
    Replica,
}

impl ServiceRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceRole::Primary => "primary",
            ServiceRole::Replica => "replica",
        }
    }
}

impl fmt::Display for ServiceRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ServiceRole {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "primary" | "master" => Ok(ServiceRole::Primary),
            "replica" | "slave" | "esclavo" => Ok(ServiceRole::Replica),
            other => Err(ConfigError::InvalidConfig(format!(
                "unknown service role '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    #[serde(default)]
    pub role: ServiceRole,
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Unset means "mask on the replica only".
    #[serde(default)]
    pub mask_card_numbers: Option<bool>,
    #[serde(default = "default_audit_recent_limit")]
    pub audit_recent_limit: i64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            role: ServiceRole::default(),
            bind_address: default_bind_address(),
            port: default_port(),
            mask_card_numbers: None,
            audit_recent_limit: default_audit_recent_limit(),
        }
    }
}

impl ServiceConfig {
    pub fn masks_card_numbers(&self) -> bool {
        self.mask_card_numbers
            .unwrap_or(self.role == ServiceRole::Replica)
    }
}

#[derive(Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default = "default_db_port")]
    pub port: u16,
    #[serde(default, alias = "service_name")]
    pub name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    password: Option<String>,
    #[serde(default)]
    pub max_connections: Option<u32>,
    #[serde(default)]
    pub min_connections: Option<u32>,
    #[serde(default = "default_connection_timeout_secs")]
    pub connection_timeout_secs: u64,
    #[serde(default = "default_run_migrations")]
    pub run_migrations: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            filename: None,
            host: None,
            port: default_db_port(),
            name: None,
            username: None,
            password: None,
            max_connections: None,
            min_connections: None,
            connection_timeout_secs: default_connection_timeout_secs(),
            run_migrations: default_run_migrations(),
        }
    }
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("url", &self.url.as_ref().map(|_| "[redacted]"))
            .field("filename", &self.filename)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("name", &self.name)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "[redacted]"))
            .field("max_connections", &self.max_connections)
            .field("min_connections", &self.min_connections)
            .field("connection_timeout_secs", &self.connection_timeout_secs)
            .field("run_migrations", &self.run_migrations)
            .finish()
    }
}

impl DatabaseConfig {
    pub fn sqlite(path: impl Into<String>) -> Self {
        Self {
            filename: Some(path.into()),
            ..Self::default()
        }
    }

    pub fn db_type(&self) -> DbType {
        let url = self.connection_string();
        if url.starts_with("sqlite://") {
            DbType::Sqlite
        } else {
            DbType::Postgres
        }
    }

    pub fn password(&self) -> Option<SecretString> {
        self.password.clone().map(SecretString::from)
    }

    pub fn set_password(&mut self, password: impl Into<String>) {
        self.password = Some(password.into());
    }

    /// Resolves the connection URL: an explicit `url` wins, then a postgres DSN
    /// assembled from host/port/name, then a sqlite `filename`.
    pub fn connection_string(&self) -> String {
        if let Some(ref url) = self.url {
            url.clone()
        } else if let Some(dsn) = self.assembled_dsn() {
            dsn
        } else if let Some(ref file) = self.filename {
            format!("sqlite://{}", file)
        } else {
            String::new()
        }
    }

    fn assembled_dsn(&self) -> Option<String> {
        let host = self.host.as_deref().filter(|h| !h.is_empty())?;
        let name = self.name.as_deref().unwrap_or("postgres");
        let mut url = Url::parse(&format!("postgres://{}:{}/{}", host, self.port, name)).ok()?;
        if let Some(ref username) = self.username {
            url.set_username(username).ok()?;
        }
        if let Some(password) = self.password() {
            url.set_password(Some(password.expose_secret())).ok()?;
        }
        Some(url.to_string())
    }

    pub fn sqlite_path(&self) -> Option<String> {
        if let DbType::Sqlite = self.db_type() {
            let url = self.connection_string();
            Some(url.strip_prefix("sqlite://").unwrap_or(&url).to_string())
        } else {
            None
        }
    }

    pub fn max_connections(&self) -> u32 {
        self.max_connections.unwrap_or(10)
    }

    pub fn min_connections(&self) -> u32 {
        self.min_connections.unwrap_or(1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbType {
    Postgres,
    Sqlite,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

/// Literal values the branch office stamps on rows it inserts.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct SiteConfig {
    #[serde(default)]
    pub customer_district: Option<String>,
    #[serde(default)]
    pub branch_city: Option<String>,
    #[serde(default)]
    pub employee_zone: Option<String>,
    #[serde(default)]
    pub audit_user: Option<String>,
}

impl SiteConfig {
    pub fn customer_district(&self, role: ServiceRole) -> String {
        self.customer_district.clone().unwrap_or_else(|| {
            match role {
                ServiceRole::Primary => "Chillogallo",
                ServiceRole::Replica => "Carapungo",
            }
            .to_string()
        })
    }

    pub fn branch_city(&self, role: ServiceRole) -> String {
        self.branch_city.clone().unwrap_or_else(|| {
            match role {
                ServiceRole::Primary => "Quito-Sur",
                ServiceRole::Replica => "Quito-Norte",
            }
            .to_string()
        })
    }

    pub fn employee_zone(&self, role: ServiceRole) -> String {
        self.employee_zone.clone().unwrap_or_else(|| {
            match role {
                ServiceRole::Primary => "Sur",
                ServiceRole::Replica => "Norte",
            }
            .to_string()
        })
    }
}

impl Config {
    /// Loads the file, applies `RETAIL_*` overrides and validates. Also
    /// returns the overrides that were ignored, for logging once tracing is
    /// up.
    pub fn load(path: Option<&Path>) -> Result<(Self, Vec<String>), ConfigError> {
        let env_path = std::env::var("CONFIG_PATH").ok();
        let explicit = path
            .map(Path::to_path_buf)
            .or_else(|| env_path.map(Into::into));

        let mut config = match explicit {
            Some(path) => Self::parse_file(&path)?,
            None if Path::new(DEFAULT_CONFIG_PATH).exists() => {
                Self::parse_file(Path::new(DEFAULT_CONFIG_PATH))?
            }
            None => Config::default(),
        };

        let ignored = config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok((config, ignored))
    }

    fn parse_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// The user recorded on audit rows: the site override, else the database
    /// login, else the historical schema owner of the role.
    pub fn audit_user(&self) -> String {
        self.site
            .audit_user
            .clone()
            .or_else(|| self.database.username.clone())
            .unwrap_or_else(|| {
                match self.service.role {
                    ServiceRole::Primary => "master",
                    ServiceRole::Replica => "esclavo",
                }
                .to_string()
            })
    }

    fn apply_env_overrides(&mut self, var: impl Fn(&str) -> Option<String>) -> Vec<String> {
        let mut ignored = Vec::new();
        if let Some(value) = var("RETAIL_SERVICE_ROLE") {
            match value.parse() {
                Ok(role) => self.service.role = role,
                Err(e) => ignored.push(format!("ignoring RETAIL_SERVICE_ROLE: {e}")),
            }
        }
        if let Some(value) = var("RETAIL_DATABASE_URL") {
            self.database.url = Some(value);
        }
        if let Some(value) = var("RETAIL_DB_HOST") {
            self.database.host = Some(value);
        }
        if let Some(value) = var("RETAIL_DB_PORT") {
            match value.parse() {
                Ok(port) => self.database.port = port,
                Err(_) => ignored.push(format!("ignoring RETAIL_DB_PORT: '{value}' is not a port")),
            }
        }
        if let Some(value) = var("RETAIL_DB_NAME") {
            self.database.name = Some(value);
        }
        if let Some(value) = var("RETAIL_DB_USERNAME") {
            self.database.username = Some(value);
        }
        if let Some(value) = var("RETAIL_DB_PASSWORD") {
            self.database.set_password(value);
        }
        ignored
    }
}

fn default_port() -> u16 {
    5000
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_audit_recent_limit() -> i64 {
    100
}

fn default_db_port() -> u16 {
    5432
}

fn default_connection_timeout_secs() -> u64 {
    30
}

fn default_run_migrations() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}
