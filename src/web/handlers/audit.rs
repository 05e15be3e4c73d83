use salvo::prelude::*;
use serde_json::json;
use tracing::error;

use super::{app_state, render_error};
use crate::web::metrics::Metrics;

const MAX_AUDIT_LIMIT: i64 = 1000;

#[handler]
pub async fn list_audit(req: &mut Request, depot: &mut Depot, res: &mut Response) {
    let Some(state) = app_state(depot, res) else {
        return;
    };
    let limit = req
        .query::<i64>("limit")
        .unwrap_or(state.audit_limit)
        .clamp(1, MAX_AUDIT_LIMIT);
    let table = req.query::<String>("table").filter(|t| !t.trim().is_empty());

    let store = state.db_manager.audit_store();
    let entries = match table {
        Some(ref table) => store.by_table(table, limit).await,
        None => store.recent(limit).await,
    };

    match entries {
        Ok(entries) => {
            res.render(Json(json!({ "success": true, "data": entries })));
        }
        Err(err) => {
            error!("failed to read audit trail: {}", err);
            Metrics::database_error();
            res.status_code(StatusCode::INTERNAL_SERVER_ERROR);
            res.render(Json(json!({
                "success": false,
                "data": [],
                "error": err.to_string(),
            })));
        }
    }
}

#[handler]
pub async fn get_audit_entry(req: &mut Request, depot: &mut Depot, res: &mut Response) {
    let Some(state) = app_state(depot, res) else {
        return;
    };
    let Some(id) = req.param::<i64>("id") else {
        Metrics::bad_request();
        render_error(res, StatusCode::BAD_REQUEST, "id must be an integer");
        return;
    };

    match state.db_manager.audit_store().get(id).await {
        Ok(Some(entry)) => res.render(Json(entry)),
        Ok(None) => render_error(res, StatusCode::NOT_FOUND, "audit entry not found"),
        Err(err) => {
            error!(id, "failed to read audit entry: {}", err);
            Metrics::database_error();
            render_error(res, StatusCode::INTERNAL_SERVER_ERROR, &err.to_string());
        }
    }
}
