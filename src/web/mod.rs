use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use salvo::cors::{AllowHeaders, AllowMethods, AllowOrigin, Cors};
use salvo::prelude::*;
use tracing::info;

use crate::config::{Config, ServiceRole};
use crate::db::DatabaseManager;

pub mod handlers;
pub mod metrics;
mod router;

pub use self::router::create_router;

/// Shared by every handler through the depot.
#[derive(Clone)]
pub struct AppState {
    pub db_manager: Arc<DatabaseManager>,
    pub role: ServiceRole,
    pub audit_limit: i64,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(config: &Config, db_manager: Arc<DatabaseManager>) -> Self {
        Self {
            db_manager,
            role: config.service.role,
            audit_limit: config.service.audit_recent_limit,
            started_at: Instant::now(),
        }
    }
}

/// The router wrapped in permissive CORS, ready to serve or to test against.
pub fn service(state: AppState) -> Service {
    let cors = Cors::new()
        .allow_origin(AllowOrigin::any())
        .allow_methods(AllowMethods::any())
        .allow_headers(AllowHeaders::any())
        .into_handler();

    Service::new(create_router(state)).hoop(cors)
}

pub struct WebServer {
    config: Arc<Config>,
    state: AppState,
}

impl WebServer {
    pub fn new(config: Arc<Config>, db_manager: Arc<DatabaseManager>) -> Self {
        let state = AppState::new(&config, db_manager);
        Self { config, state }
    }

    pub async fn start(&self) -> Result<()> {
        let bind_addr = format!(
            "{}:{}",
            self.config.service.bind_address, self.config.service.port
        );
        info!(role = %self.state.role, "starting web server on {}", bind_addr);

        let acceptor = TcpListener::new(bind_addr).bind().await;
        Server::new(acceptor).serve(service(self.state.clone())).await;

        Ok(())
    }
}
