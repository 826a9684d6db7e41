use axum::routing::{get, post};
use axum::Router;

use custody_application::AppState;

use crate::handlers::{approval_handlers, ops_handlers, shipment_handlers};

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route(
            "/v1/auto-approve",
            post(approval_handlers::trigger_auto_approval),
        )
        .route("/v1/shipments", post(shipment_handlers::register_shipment))
        .route("/v1/shipments/:id", get(shipment_handlers::get_shipment))
        .route(
            "/v1/shipments/:id/stages",
            get(shipment_handlers::list_shipment_stages),
        )
        .route(
            "/v1/shipments/:id/transitions",
            post(shipment_handlers::transition_shipment),
        )
        .route("/v1/ops/health/live", get(ops_handlers::health_live))
        .route("/v1/ops/health/ready", get(ops_handlers::health_ready))
        .route(
            "/v1/ops/metrics/prometheus",
            get(ops_handlers::metrics_prometheus),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Arc;

    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use custody_application::Metrics;
    use custody_domain::ports::{IdentityProvider, ShipmentLedger};
    use custody_domain::{ActorId, DwellHours, DwellPolicy, RuntimeConfig};
    use custody_infrastructure::{MemoryShipmentLedger, StaticRoleDirectory, TracingAuditSink};

    const SECRET: &str = "cron-secret";

    struct Sessions(HashMap<&'static str, &'static str>);

    #[async_trait]
    impl IdentityProvider for Sessions {
        async fn verify_session(&self, token: &str) -> anyhow::Result<Option<ActorId>> {
            Ok(self.0.get(token).map(|user| ActorId::new(*user)))
        }
    }

    fn app() -> (Router, Arc<MemoryShipmentLedger>) {
        let ledger = Arc::new(MemoryShipmentLedger::new());
        let state = AppState {
            config: RuntimeConfig {
                system_secret: Some(SECRET.to_string()),
                ..RuntimeConfig::default()
            },
            ledger: ledger.clone(),
            audit_sink: Arc::new(TracingAuditSink),
            identity: Arc::new(Sessions(HashMap::from([
                ("driver-token", "driver-1"),
                ("admin-token", "admin-1"),
            ]))),
            roles: Arc::new(StaticRoleDirectory::new(["admin-1"])),
            dwell_policy: Arc::new(DwellPolicy::from_hours(&DwellHours::default())),
            metrics: Arc::new(Metrics::default()),
        };
        (build_router(state), ledger)
    }

    fn request(method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("Authorization", format!("Bearer {token}"));
        }
        match body {
            Some(body) => builder
                .header("Content-Type", "application/json")
                .body(Body::from(body.to_string()))
                .expect("request"),
            None => builder.body(Body::empty()).expect("request"),
        }
    }

    async fn send(router: &Router, req: Request<Body>) -> (StatusCode, Value) {
        let response = router.clone().oneshot(req).await.expect("response");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    async fn register(router: &Router) -> String {
        let (status, body) = send(
            router,
            request(
                "POST",
                "/v1/shipments",
                Some("driver-token"),
                Some(json!({
                    "generator_company_id": "gen-1",
                    "waste_type_id": "metal",
                    "quantity": 2.0,
                    "unit": "t"
                })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        body["id"].as_str().expect("id").to_string()
    }

    #[tokio::test]
    async fn trigger_requires_a_credential() {
        let (router, _) = app();
        let (status, body) = send(&router, request("POST", "/v1/auto-approve", None, None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["success"], json!(false));

        let (status, _) = send(
            &router,
            request("POST", "/v1/auto-approve", Some("driver-token"), None),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn trigger_reports_counts() {
        let (router, _) = app();
        register(&router).await;
        let (status, body) = send(
            &router,
            request("POST", "/v1/auto-approve", Some(SECRET), None),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], json!(true));
        assert_eq!(body["advanced"], json!(0));
        assert_eq!(body["failed"], json!(0));
        assert_eq!(body["timed_out"], json!(false));
        assert!(body["timestamp"].is_string());
    }

    #[tokio::test]
    async fn manual_transition_round_trip() {
        let (router, ledger) = app();
        let id = register(&router).await;
        let uri = format!("/v1/shipments/{id}/transitions");

        let (status, body) = send(
            &router,
            request(
                "POST",
                &uri,
                Some("driver-token"),
                Some(json!({
                    "target": "in_transit",
                    "location": { "latitude": 52.1, "longitude": 5.2 }
                })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["outcome"], json!("applied"));
        assert_eq!(body["stage"]["actor_id"], json!("driver-1"));

        let (status, body) = send(
            &router,
            request(
                "POST",
                &uri,
                Some("driver-token"),
                Some(json!({ "target": "in_transit" })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["outcome"], json!("already_applied"));

        let (status, body) = send(
            &router,
            request(
                "POST",
                &uri,
                Some("driver-token"),
                Some(json!({ "target": "recycling" })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], json!("invalid_transition"));
        assert_eq!(ledger.stage_count().await, 2);

        let (status, body) = send(
            &router,
            request("GET", &format!("/v1/shipments/{id}/stages"), Some("driver-token"), None),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().map(Vec::len), Some(2));
    }

    #[tokio::test]
    async fn transition_errors_use_client_statuses() {
        let (router, ledger) = app();
        let id = register(&router).await;
        let uri = format!("/v1/shipments/{id}/transitions");

        let (status, body) = send(
            &router,
            request("POST", &uri, Some("driver-token"), Some(json!({ "target": "teleported" }))),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], json!("unknown_stage"));

        let (status, body) = send(
            &router,
            request(
                "POST",
                &uri,
                Some("driver-token"),
                Some(json!({ "target": "in_transit", "report": "manifest.pdf" })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], json!("report_not_accepted"));

        let (status, body) = send(
            &router,
            request(
                "POST",
                &uri,
                Some("driver-token"),
                Some(json!({ "target": "in_transit", "at": "2099-01-01T00:00:00Z" })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], json!("timestamp_in_future"));

        let missing = "/v1/shipments/6f1c5d4e-8a8b-4b7e-9a51-3f0f0a0b0c0d/transitions";
        let (status, _) = send(
            &router,
            request("POST", missing, Some("driver-token"), Some(json!({ "target": "in_transit" }))),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(
            &router,
            request("POST", &uri, None, Some(json!({ "target": "in_transit" }))),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(ledger.stage_count().await, 1);
    }

    #[tokio::test]
    async fn health_and_metrics() {
        let (router, ledger) = app();
        ledger.ping().await.expect("ping");
        let (status, _) = send(&router, request("GET", "/v1/ops/health/live", None, None)).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = send(&router, request("GET", "/v1/ops/health/ready", None, None)).await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) =
            send(&router, request("GET", "/v1/ops/metrics/prometheus", None, None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let response = router
            .clone()
            .oneshot(request(
                "GET",
                "/v1/ops/metrics/prometheus",
                Some("admin-token"),
                None,
            ))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let text = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        let text = String::from_utf8(text.to_vec()).expect("utf8");
        assert!(text.contains("custody_auto_approval_runs_total"));
    }
}
