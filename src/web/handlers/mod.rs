use salvo::prelude::*;
use serde_json::json;
use tracing::error;

use crate::web::AppState;

pub mod audit;
pub mod health;
pub mod records;

fn render_error(res: &mut Response, status: StatusCode, message: &str) {
    res.status_code(status);
    res.render(Json(json!({ "success": false, "error": message })));
}

/// Looks up the state injected by the router, answering 500 when it is absent.
fn app_state<'a>(depot: &'a Depot, res: &mut Response) -> Option<&'a AppState> {
    match depot.obtain::<AppState>() {
        Ok(state) => Some(state),
        Err(_) => {
            error!("application state is not injected into the depot");
            render_error(res, StatusCode::INTERNAL_SERVER_ERROR, "service state unavailable");
            None
        }
    }
}
