//! The `/api/{entity}` CRUD surface, shared by every entity kind.

use salvo::prelude::*;
use serde_json::json;
use tracing::{error, info, warn};

use super::{app_state, render_error};
use crate::db::models::{Branch, Card, Customer, Draft, Employee, Entity, Factory, Product};
use crate::db::{DatabaseError, EntityKind};
use crate::web::AppState;
use crate::web::metrics::Metrics;

/// Runs the generic operation `$op` for the concrete entity type behind `$kind`.
macro_rules! for_entity {
    ($kind:expr, $op:ident($($arg:expr),*)) => {
        match $kind {
            EntityKind::Products => $op::<Product>($($arg),*).await,
            EntityKind::Customers => $op::<Customer>($($arg),*).await,
            EntityKind::Branches => $op::<Branch>($($arg),*).await,
            EntityKind::Employees => $op::<Employee>($($arg),*).await,
            EntityKind::Cards => $op::<Card>($($arg),*).await,
            EntityKind::Factories => $op::<Factory>($($arg),*).await,
        }
    };
}

fn entity_kind(req: &Request, res: &mut Response) -> Option<EntityKind> {
    let segment = req.param::<String>("entity").unwrap_or_default();
    let kind = EntityKind::from_route(&segment);
    if kind.is_none() {
        render_error(res, StatusCode::NOT_FOUND, &format!("unknown entity '{segment}'"));
    }
    kind
}

fn record_id(req: &Request, res: &mut Response) -> Option<i64> {
    let id = req.param::<i64>("id");
    if id.is_none() {
        Metrics::bad_request();
        render_error(res, StatusCode::BAD_REQUEST, "id must be an integer");
    }
    id
}

fn render_read_only(res: &mut Response, kind: EntityKind) {
    Metrics::write_rejected();
    res.status_code(StatusCode::FORBIDDEN);
    res.render(Json(json!({
        "success": false,
        "error": format!("operation not allowed: {kind} are read-only on this server"),
        "message": "this entity is managed by the primary server",
    })));
}

fn render_db_error(res: &mut Response, kind: EntityKind, err: DatabaseError) {
    match err {
        DatabaseError::ReadOnly(_) => render_read_only(res, kind),
        err => {
            error!(entity = %kind, "database error: {}", err);
            Metrics::database_error();
            render_error(res, StatusCode::INTERNAL_SERVER_ERROR, &err.to_string());
        }
    }
}

fn render_not_found(res: &mut Response, kind: EntityKind) {
    render_error(res, StatusCode::NOT_FOUND, &format!("{} not found", kind.singular()));
}

fn is_masked<E: Entity>(state: &AppState) -> bool {
    state.db_manager.catalog().spec(E::KIND).masked
}

fn is_writable<E: Entity>(state: &AppState) -> bool {
    state.db_manager.catalog().spec(E::KIND).is_writable()
}

async fn parse_draft<E: Entity>(req: &mut Request, res: &mut Response) -> Option<E::Draft> {
    let draft = match req.parse_json::<E::Draft>().await {
        Ok(draft) => draft,
        Err(err) => {
            warn!(entity = %E::KIND, "rejected request body: {}", err);
            Metrics::bad_request();
            render_error(res, StatusCode::BAD_REQUEST, &format!("invalid request body: {err}"));
            return None;
        }
    };
    if let Err(reason) = draft.validate() {
        Metrics::bad_request();
        render_error(res, StatusCode::BAD_REQUEST, &reason);
        return None;
    }
    Some(draft)
}

async fn list_of<E: Entity>(state: &AppState, res: &mut Response) {
    match state.db_manager.records().list::<E>().await {
        Ok(mut rows) => {
            if is_masked::<E>(state) {
                rows.iter_mut().for_each(E::redact);
            }
            Metrics::records_listed();
            res.render(Json(json!({ "success": true, "data": rows })));
        }
        Err(err) => {
            error!(entity = %E::KIND, "failed to list rows: {}", err);
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

async fn get_of<E: Entity>(state: &AppState, id: i64, res: &mut Response) {
    match state.db_manager.records().get::<E>(id).await {
        Ok(Some(mut row)) => {
            if is_masked::<E>(state) {
                row.redact();
            }
            res.render(Json(row));
        }
        Ok(None) => render_not_found(res, E::KIND),
        Err(err) => render_db_error(res, E::KIND, err),
    }
}

async fn create_of<E: Entity>(state: &AppState, req: &mut Request, res: &mut Response) {
    if !is_writable::<E>(state) {
        return render_read_only(res, E::KIND);
    }
    let Some(draft) = parse_draft::<E>(req, res).await else {
        return;
    };

    match state.db_manager.records().create::<E>(&draft).await {
        Ok(id) => {
            Metrics::record_created();
            info!(entity = %E::KIND, id, "row created");
            res.render(Json(json!({
                "success": true,
                "message": format!("{} created with id {id}", E::KIND.singular()),
                "id": id,
            })));
        }
        Err(err) => render_db_error(res, E::KIND, err),
    }
}

async fn update_of<E: Entity>(state: &AppState, id: i64, req: &mut Request, res: &mut Response) {
    if !is_writable::<E>(state) {
        return render_read_only(res, E::KIND);
    }
    let Some(draft) = parse_draft::<E>(req, res).await else {
        return;
    };

    match state.db_manager.records().update::<E>(id, &draft).await {
        Ok(true) => {
            Metrics::record_updated();
            info!(entity = %E::KIND, id, "row updated");
            res.render(Json(json!({
                "success": true,
                "message": format!("{} {id} updated", E::KIND.singular()),
            })));
        }
        Ok(false) => render_not_found(res, E::KIND),
        Err(err) => render_db_error(res, E::KIND, err),
    }
}

async fn delete_of<E: Entity>(state: &AppState, id: i64, res: &mut Response) {
    if !is_writable::<E>(state) {
        return render_read_only(res, E::KIND);
    }

    match state.db_manager.records().delete::<E>(id).await {
        Ok(true) => {
            Metrics::record_deleted();
            info!(entity = %E::KIND, id, "row deleted");
            res.render(Json(json!({
                "success": true,
                "message": format!("{} {id} deleted", E::KIND.singular()),
            })));
        }
        Ok(false) => render_not_found(res, E::KIND),
        Err(err) => render_db_error(res, E::KIND, err),
    }
}

#[handler]
pub async fn list_records(req: &mut Request, depot: &mut Depot, res: &mut Response) {
    let Some(state) = app_state(depot, res) else {
        return;
    };
    let Some(kind) = entity_kind(req, res) else {
        return;
    };
    for_entity!(kind, list_of(state, res))
}

#[handler]
pub async fn get_record(req: &mut Request, depot: &mut Depot, res: &mut Response) {
    let Some(state) = app_state(depot, res) else {
        return;
    };
    let Some(kind) = entity_kind(req, res) else {
        return;
    };
    let Some(id) = record_id(req, res) else {
        return;
    };
    for_entity!(kind, get_of(state, id, res))
}

#[handler]
pub async fn create_record(req: &mut Request, depot: &mut Depot, res: &mut Response) {
    let Some(state) = app_state(depot, res) else {
        return;
    };
    let Some(kind) = entity_kind(req, res) else {
        return;
    };
    for_entity!(kind, create_of(state, req, res))
}

#[handler]
pub async fn update_record(req: &mut Request, depot: &mut Depot, res: &mut Response) {
    let Some(state) = app_state(depot, res) else {
        return;
    };
    let Some(kind) = entity_kind(req, res) else {
        return;
    };
    let Some(id) = record_id(req, res) else {
        return;
    };
    for_entity!(kind, update_of(state, id, req, res))
}

#[handler]
pub async fn delete_record(req: &mut Request, depot: &mut Depot, res: &mut Response) {
    let Some(state) = app_state(depot, res) else {
        return;
    };
    let Some(kind) = entity_kind(req, res) else {
        return;
    };
    let Some(id) = record_id(req, res) else {
        return;
    };
    for_entity!(kind, delete_of(state, id, res))
}
