use salvo::affix_state;
use salvo::prelude::*;

use crate::web::AppState;
use crate::web::handlers::{
    audit::{get_audit_entry, list_audit},
    health::{get_status, health_check, metrics, server_test},
    records::{create_record, delete_record, get_record, list_records, update_record},
};

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .hoop(affix_state::inject(state))
        .push(Router::with_path("test").get(server_test))
        .push(Router::with_path("health").get(health_check))
        .push(Router::with_path("status").get(get_status))
        .push(Router::with_path("metrics").get(metrics))
        .push(
            Router::with_path("api")
                .push(Router::with_path("auditoria").get(list_audit))
                .push(Router::with_path("auditoria/{id}").get(get_audit_entry))
                .push(Router::with_path("auditoria_esclavo").get(list_audit))
                .push(
                    Router::with_path("{entity}")
                        .get(list_records)
                        .post(create_record),
                )
                .push(
                    Router::with_path("{entity}/{id}")
                        .get(get_record)
                        .put(update_record)
                        .delete(delete_record),
                ),
        )
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Instant;

    use diesel::{Connection, RunQueryDsl, SqliteConnection};
    use salvo::prelude::*;
    use salvo::test::{ResponseExt, TestClient};
    use serde_json::{Value, json};
    use tempfile::NamedTempFile;

    use crate::config::{DatabaseConfig, ServiceRole, SiteConfig};
    use crate::db::manager::testing::sqlite_manager;
    use crate::db::{Catalog, DatabaseManager};
    use crate::web::{AppState, service};

    const BASE: &str = "http://127.0.0.1:5800";

    fn state(manager: DatabaseManager, role: ServiceRole, audit_limit: i64) -> AppState {
        AppState {
            db_manager: Arc::new(manager),
            role,
            audit_limit,
            started_at: Instant::now(),
        }
    }

    async fn gateway_with_audit_limit(
        role: ServiceRole,
        audit_limit: i64,
    ) -> (NamedTempFile, Service) {
        let (file, manager) = sqlite_manager(role).await;
        if role == ServiceRole::Primary {
            manager.sequences().provision().await.expect("provision");
        }
        (file, service(state(manager, role, audit_limit)))
    }

    async fn gateway(role: ServiceRole) -> (NamedTempFile, Service) {
        gateway_with_audit_limit(role, 100).await
    }

    fn seed(file: &NamedTempFile, statement: &str) {
        let mut conn = SqliteConnection::establish(&file.path().to_string_lossy()).expect("sqlite");
        diesel::sql_query(statement).execute(&mut conn).expect("seed");
    }

    fn url(path: &str) -> String {
        format!("{BASE}{path}")
    }

    // Salvo leaves the status unset for plain 200 responses.
    fn status(res: &Response) -> StatusCode {
        res.status_code.unwrap_or(StatusCode::OK)
    }

    async fn json_body(res: &mut Response) -> Value {
        res.take_json::<Value>().await.expect("json body")
    }

    #[tokio::test]
    async fn primary_serves_full_crud_with_audit() {
        let (_file, service) = gateway(ServiceRole::Primary).await;

        let mut res = TestClient::post(url("/api/products"))
            .json(&json!({ "nombre": "Leche", "precio": 1.25 }))
            .send(&service)
            .await;
        assert_eq!(status(&res), StatusCode::OK);
        let body = json_body(&mut res).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["id"], 1);

        let mut res = TestClient::get(url("/api/products")).send(&service).await;
        let body = json_body(&mut res).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["data"][0]["NOMBRE"], "Leche");

        let mut res = TestClient::get(url("/api/products/1")).send(&service).await;
        let body = json_body(&mut res).await;
        assert_eq!(body["ID_PRODUCTO"], 1);
        assert_eq!(body["PRECIO"], 1.25);

        let mut res = TestClient::put(url("/api/products/1"))
            .json(&json!({ "nombre": "Leche entera", "precio": 1.5 }))
            .send(&service)
            .await;
        assert_eq!(status(&res), StatusCode::OK);
        assert_eq!(json_body(&mut res).await["success"], true);

        let res = TestClient::delete(url("/api/products/1")).send(&service).await;
        assert_eq!(status(&res), StatusCode::OK);

        let mut res = TestClient::get(url("/api/products/1")).send(&service).await;
        assert_eq!(status(&res), StatusCode::NOT_FOUND);
        assert_eq!(json_body(&mut res).await["success"], false);

        let res = TestClient::put(url("/api/products/1"))
            .json(&json!({ "nombre": "Pan", "precio": 0.5 }))
            .send(&service)
            .await;
        assert_eq!(status(&res), StatusCode::NOT_FOUND);

        let mut res = TestClient::get(url("/api/auditoria?table=producto"))
            .send(&service)
            .await;
        let body = json_body(&mut res).await;
        let data = body["data"].as_array().expect("audit rows");
        assert_eq!(data.len(), 3);
        assert_eq!(data[0]["TIPO_OPERACION"], "DELETE");
        assert_eq!(data[2]["TIPO_OPERACION"], "INSERT");

        let id = data[0]["ID_AUDITORIA"].as_i64().expect("audit id");
        let mut res = TestClient::get(url(&format!("/api/auditoria/{id}")))
            .send(&service)
            .await;
        assert_eq!(json_body(&mut res).await["NOMBRE_TABLE"], "PRODUCTO");
    }

    #[tokio::test]
    async fn replica_rejects_writes_to_replicated_entities() {
        let (_file, service) = gateway(ServiceRole::Replica).await;

        let mut res = TestClient::post(url("/api/tarjetas"))
            .json(&json!({ "tipo": "VISA", "numero": "4111111111111111" }))
            .send(&service)
            .await;
        assert_eq!(status(&res), StatusCode::FORBIDDEN);
        let body = json_body(&mut res).await;
        assert_eq!(body["success"], false);
        assert!(body["message"].as_str().unwrap_or_default().contains("primary server"));

        let res = TestClient::put(url("/api/fabricas/1"))
            .json(&json!({ "nombre": "Acme", "pais": "EC" }))
            .send(&service)
            .await;
        assert_eq!(status(&res), StatusCode::FORBIDDEN);

        let res = TestClient::delete(url("/api/products/1")).send(&service).await;
        assert_eq!(status(&res), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn replica_writes_local_entities_with_site_literals() {
        let (_file, service) = gateway(ServiceRole::Replica).await;

        let mut res = TestClient::post(url("/api/clientes"))
            .json(&json!({ "nombre": "Ana", "telefono": "0991" }))
            .send(&service)
            .await;
        assert_eq!(status(&res), StatusCode::OK);
        assert_eq!(json_body(&mut res).await["id"], 1);

        let mut res = TestClient::post(url("/api/sucursales"))
            .json(&json!({ "nombre": "Norte 1" }))
            .send(&service)
            .await;
        assert_eq!(status(&res), StatusCode::OK);
        assert_eq!(json_body(&mut res).await["id"], 1);

        let mut res = TestClient::get(url("/api/customers")).send(&service).await;
        let body = json_body(&mut res).await;
        assert_eq!(body["data"][0]["DIRECCION"], "Carapungo");

        let mut res = TestClient::get(url("/api/branches/1")).send(&service).await;
        let body = json_body(&mut res).await;
        assert_eq!(body["CIUDAD"], "Quito-Norte");
        assert_eq!(body["DIRECCION"], Value::Null);

        let mut res = TestClient::get(url("/api/auditoria_esclavo")).send(&service).await;
        let body = json_body(&mut res).await;
        assert_eq!(body["data"].as_array().map(Vec::len), Some(2));
        assert_eq!(body["data"][0]["USER_NAME"], "esclavo");
    }

    #[tokio::test]
    async fn replica_masks_card_numbers() {
        let (file, service) = gateway(ServiceRole::Replica).await;
        seed(
            &file,
            "INSERT INTO vw_tarjeta (id_tarjeta, tipo, numero) \
             VALUES (1, 'VISA', '4111111111111234'), (2, 'AMEX', NULL)",
        );

        let mut res = TestClient::get(url("/api/tarjetas")).send(&service).await;
        let body = json_body(&mut res).await;
        assert_eq!(body["data"][0]["NUMERO"], "****-****-****-1234");
        assert_eq!(body["data"][1]["NUMERO"], "****-****-****-****");

        let mut res = TestClient::get(url("/api/cards/1")).send(&service).await;
        assert_eq!(json_body(&mut res).await["NUMERO"], "****-****-****-1234");
    }

    #[tokio::test]
    async fn primary_returns_card_numbers_unmasked() {
        let (_file, service) = gateway(ServiceRole::Primary).await;

        let res = TestClient::post(url("/api/tarjetas"))
            .json(&json!({ "tipo": "VISA", "numero": 4111111111111234_u64 }))
            .send(&service)
            .await;
        assert_eq!(status(&res), StatusCode::OK);

        let mut res = TestClient::get(url("/api/tarjetas/1")).send(&service).await;
        assert_eq!(json_body(&mut res).await["NUMERO"], "4111111111111234");
    }

    #[tokio::test]
    async fn malformed_requests_are_rejected() {
        let (_file, service) = gateway(ServiceRole::Primary).await;

        let res = TestClient::get(url("/api/products/abc")).send(&service).await;
        assert_eq!(status(&res), StatusCode::BAD_REQUEST);

        let res = TestClient::post(url("/api/empleados"))
            .json(&json!({ "nombre": "Luis" }))
            .send(&service)
            .await;
        assert_eq!(status(&res), StatusCode::BAD_REQUEST);

        let mut res = TestClient::post(url("/api/clientes"))
            .json(&json!({ "nombre": "  ", "telefono": "0991" }))
            .send(&service)
            .await;
        assert_eq!(status(&res), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(&mut res).await["success"], false);

        let res = TestClient::get(url("/api/proveedores")).send(&service).await;
        assert_eq!(status(&res), StatusCode::NOT_FOUND);

        let res = TestClient::get(url("/api/auditoria/xyz")).send(&service).await;
        assert_eq!(status(&res), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn service_endpoints_report_state() {
        let (_file, service) = gateway(ServiceRole::Replica).await;

        let mut res = TestClient::get(url("/test")).send(&service).await;
        assert_eq!(json_body(&mut res).await["status"], "OK");

        let mut res = TestClient::get(url("/health")).send(&service).await;
        assert_eq!(status(&res), StatusCode::OK);
        assert_eq!(json_body(&mut res).await["database"], "connected");

        let mut res = TestClient::get(url("/status")).send(&service).await;
        let body = json_body(&mut res).await;
        assert_eq!(body["role"], "replica");
        assert_eq!(body["database"], "sqlite");
        assert_eq!(body["audit_table"], "auditoria_esclavo");

        let mut res = TestClient::get(url("/metrics")).send(&service).await;
        let text = res.take_string().await.expect("metrics text");
        assert!(text.contains(r#"gateway_uptime_seconds{role="replica"}"#));
    }

    #[tokio::test]
    async fn audit_limit_defaults_to_config_and_is_clamped() {
        let (_file, service) = gateway_with_audit_limit(ServiceRole::Primary, 2).await;
        for name in ["Leche", "Pan", "Arroz"] {
            let res = TestClient::post(url("/api/products"))
                .json(&json!({ "nombre": name, "precio": 1.0 }))
                .send(&service)
                .await;
            assert_eq!(status(&res), StatusCode::OK);
        }

        let cases = [
            ("/api/auditoria", 2),
            ("/api/auditoria?limit=0", 1),
            ("/api/auditoria?limit=-5", 1),
            ("/api/auditoria?limit=5000", 3),
            ("/api/auditoria?table=PRODUCTO&limit=1", 1),
        ];
        for (path, expected) in cases {
            let mut res = TestClient::get(url(path)).send(&service).await;
            assert_eq!(status(&res), StatusCode::OK, "{path}");
            let body = json_body(&mut res).await;
            assert_eq!(body["data"].as_array().map(Vec::len), Some(expected), "{path}");
        }
    }

    #[tokio::test]
    async fn health_reports_unreachable_database() {
        // Nothing listens on port 1; the pool connects lazily.
        let mut config = DatabaseConfig::default();
        config.url = Some("postgres://retail@127.0.0.1:1/retail".to_string());
        config.min_connections = Some(0);
        config.max_connections = Some(1);
        config.connection_timeout_secs = 1;
        let catalog = Catalog::new(ServiceRole::Primary, &SiteConfig::default(), "master", false);
        let manager = DatabaseManager::new(&config, catalog).await.expect("lazy pool");
        let service = service(state(manager, ServiceRole::Primary, 100));

        let mut res = TestClient::get(url("/health")).send(&service).await;
        assert_eq!(status(&res), StatusCode::SERVICE_UNAVAILABLE);
        let body = json_body(&mut res).await;
        assert_eq!(body["status"], "unhealthy");
        assert_eq!(body["database"], "unreachable");
        assert_eq!(body["role"], "primary");
    }
}
