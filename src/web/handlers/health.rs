use salvo::prelude::*;
use serde_json::json;
use tracing::warn;

use super::app_state;
use crate::config::DbType;
use crate::web::metrics::format_prometheus;

#[handler]
pub async fn server_test(res: &mut Response) {
    res.render(Json(json!({ "status": "OK", "message": "server is running" })));
}

#[handler]
pub async fn health_check(depot: &mut Depot, res: &mut Response) {
    let Some(state) = app_state(depot, res) else {
        return;
    };

    match state.db_manager.ping().await {
        Ok(()) => {
            res.render(Json(json!({
                "status": "healthy",
                "role": state.role.as_str(),
                "database": "connected",
            })));
        }
        Err(err) => {
            warn!("health check failed: {}", err);
            res.status_code(StatusCode::SERVICE_UNAVAILABLE);
            res.render(Json(json!({
                "status": "unhealthy",
                "role": state.role.as_str(),
                "database": "unreachable",
                "error": err.to_string(),
            })));
        }
    }
}

#[handler]
pub async fn get_status(depot: &mut Depot, res: &mut Response) {
    let Some(state) = app_state(depot, res) else {
        return;
    };
    let backend = match state.db_manager.db_type() {
        DbType::Postgres => "postgres",
        DbType::Sqlite => "sqlite",
    };

    res.render(Json(json!({
        "role": state.role.as_str(),
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_seconds": state.started_at.elapsed().as_secs(),
        "database": backend,
        "audit_table": state.db_manager.catalog().audit_table(),
    })));
}

#[handler]
pub async fn metrics(depot: &mut Depot, res: &mut Response) {
    let Some(state) = app_state(depot, res) else {
        return;
    };
    res.render(Text::Plain(format_prometheus(state.role.as_str(), state.started_at)));
}
