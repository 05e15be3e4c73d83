use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing::{error, info, warn};

use crate::config::{Config, ServiceRole};
use crate::db::{Catalog, DatabaseManager, SequenceStatus};
use crate::utils::logging::init_tracing;
use crate::web::WebServer;

#[derive(Debug, Parser)]
#[command(
    name = "retail-gateway",
    version,
    about = "REST gateway over the retail primary and replica databases"
)]
pub struct Cli {
    /// YAML configuration file. Defaults to ./config.yaml when present.
    #[arg(short, long, env = "CONFIG_PATH")]
    pub config: Option<PathBuf>,

    /// Overrides `service.role` from the configuration.
    #[arg(long, value_enum)]
    pub role: Option<ServiceRole>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Serve the REST API (the default).
    #[default]
    Serve,
    /// Create missing key sequences and report their current values.
    ProvisionSequences,
    /// Report table row counts and sequence values, then exit.
    Check,
}

impl Cli {
    pub fn command(&self) -> Command {
        self.command.unwrap_or_default()
    }

    /// The configuration plus the environment overrides it ignored.
    pub fn load_config(&self) -> Result<(Config, Vec<String>)> {
        let (mut config, ignored) =
            Config::load(self.config.as_deref()).context("failed to load configuration")?;
        if let Some(role) = self.role {
            config.service.role = role;
        }
        Ok((config, ignored))
    }
}

pub async fn run(cli: Cli) -> Result<()> {
    let (config, ignored) = cli.load_config()?;
    let config = Arc::new(config);
    init_tracing(&config.logging);
    for message in &ignored {
        warn!("{}", message);
    }

    info!(role = %config.service.role, command = ?cli.command(), "retail gateway starting up");
    let db_manager = connect(&config).await?;

    match cli.command() {
        Command::Serve => serve(config, db_manager).await,
        Command::ProvisionSequences => provision(&db_manager).await,
        Command::Check => check(&db_manager).await,
    }
}

async fn connect(config: &Config) -> Result<Arc<DatabaseManager>> {
    let catalog = Catalog::from_config(config);
    let db_manager = DatabaseManager::new(&config.database, catalog)
        .await
        .context("failed to connect to the database")?;
    Ok(Arc::new(db_manager))
}

async fn serve(config: Arc<Config>, db_manager: Arc<DatabaseManager>) -> Result<()> {
    if config.database.run_migrations {
        db_manager.migrate().await?;
        db_manager.sequences().provision().await?;
    }

    let web_server = WebServer::new(config.clone(), db_manager);
    let web_handle = tokio::spawn(async move {
        if let Err(e) = web_server.start().await {
            error!("web server error: {}", e);
        }
    });

    tokio::select! {
        _ = web_handle => {},
        _ = tokio::signal::ctrl_c() => {},
    }

    info!("retail gateway shutting down");
    Ok(())
}

async fn provision(db_manager: &DatabaseManager) -> Result<()> {
    let reports = db_manager.sequences().provision().await?;
    if reports.is_empty() {
        println!("no key sequences are used by the {} role", db_manager.catalog().role());
    }
    for report in reports {
        println!("{:<14} {:<22} {}", report.name, report.table, report.status);
    }
    Ok(())
}

async fn check(db_manager: &DatabaseManager) -> Result<()> {
    db_manager.ping().await.context("database is unreachable")?;
    println!("connected ({} role)", db_manager.catalog().role());

    let (tables, sequences) = db_manager.sequences().inspect().await?;
    let mut failures = 0;
    for table in &tables {
        match &table.rows {
            Ok(rows) => println!("{:<22} {rows} rows", table.table),
            Err(e) => {
                failures += 1;
                println!("{:<22} error: {e}", table.table);
            }
        }
    }
    for sequence in &sequences {
        if sequence.status == SequenceStatus::Missing {
            failures += 1;
        }
        println!("{:<14} {}", sequence.name, sequence.status);
    }

    if failures > 0 {
        bail!("{failures} check(s) failed");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::{Cli, Command};
    use crate::config::ServiceRole;

    #[test]
    fn serve_is_the_default_command() {
        let cli = Cli::try_parse_from(["retail-gateway"]).expect("parse");
        assert_eq!(cli.command(), Command::Serve);
        assert_eq!(cli.role, None);
    }

    #[test]
    fn accepts_legacy_role_names() {
        let cli =
            Cli::try_parse_from(["retail-gateway", "--role", "esclavo", "check"]).expect("parse");
        assert_eq!(cli.role, Some(ServiceRole::Replica));
        assert_eq!(cli.command(), Command::Check);

        let cli = Cli::try_parse_from(["retail-gateway", "--role", "master", "provision-sequences"])
            .expect("parse");
        assert_eq!(cli.role, Some(ServiceRole::Primary));
        assert_eq!(cli.command(), Command::ProvisionSequences);
    }

    #[test]
    fn rejects_unknown_roles() {
        assert!(Cli::try_parse_from(["retail-gateway", "--role", "backup"]).is_err());
    }
}
