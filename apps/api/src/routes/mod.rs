pub mod health;
pub mod pagination;

use axum::{
    routing::{get, post, put},
    Router,
};

use crate::sessions::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Stateless pagination
        .route("/api/v1/pagination", post(pagination::handle_calculate))
        .route(
            "/api/v1/pagination/defaults",
            get(pagination::handle_defaults),
        )
        // Editing sessions
        .route("/api/v1/sessions", post(handlers::handle_create_session))
        .route(
            "/api/v1/sessions/:id",
            get(handlers::handle_get_session).delete(handlers::handle_delete_session),
        )
        .route(
            "/api/v1/sessions/:id/document",
            put(handlers::handle_update_document),
        )
        .route(
            "/api/v1/sessions/:id/config",
            put(handlers::handle_update_config),
        )
        .route("/api/v1/sessions/:id/reorder", post(handlers::handle_reorder))
        .route("/api/v1/sessions/:id/move", post(handlers::handle_move_section))
        .route("/api/v1/sessions/:id/navigate", post(handlers::handle_navigate))
        .route(
            "/api/v1/sessions/:id/jump",
            post(handlers::handle_jump_to_section),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::{to_bytes, Body},
        http::{Method, Request, StatusCode},
        response::Response,
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::*;
    use crate::config::Config;
    use crate::document::tests::make_document;
    use crate::measure::EstimatingMeasurer;

    fn make_state() -> AppState {
        AppState::new(Config::default(), Arc::new(EstimatingMeasurer::default()))
    }

    async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> Response {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        app.clone().oneshot(request).await.unwrap()
    }

    async fn json_body(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn create_session(app: &Router) -> String {
        let response = send(
            app,
            Method::POST,
            "/api/v1/sessions",
            Some(json!({ "document": make_document() })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let body = json_body(response).await;
        body["session_id"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_health_reports_ok() {
        let app = build_router(make_state());
        let response = send(&app, Method::GET, "/health", None).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["sessions"], 0);
    }

    #[tokio::test]
    async fn test_defaults_endpoint() {
        let app = build_router(make_state());
        let body = json_body(send(&app, Method::GET, "/api/v1/pagination/defaults", None).await).await;
        assert_eq!(body["page_height"], 1123.0);
        assert_eq!(body["keep_with_next"], json!(["header"]));
    }

    #[tokio::test]
    async fn test_stateless_calculation() {
        let app = build_router(make_state());
        let response = send(
            &app,
            Method::POST,
            "/api/v1/pagination",
            Some(json!({
                "measurements": {
                    "header": { "width": 700, "height": 120 },
                    "experience": { "width": 700, "height": 980 }
                },
                "section_order": [
                    { "id": "header", "type": "header", "order": 0 },
                    { "id": "summary", "type": "summary", "order": 1 },
                    { "id": "experience", "type": "experience", "order": 2 }
                ]
            })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["state"]["total_pages"], 2);
        assert_eq!(body["metrics"]["skipped_sections"], 1);
        let kinds: Vec<&str> = body["warnings"]
            .as_array()
            .unwrap()
            .iter()
            .map(|w| w["kind"].as_str().unwrap())
            .collect();
        assert!(kinds.contains(&"skipped_section"));
    }

    #[tokio::test]
    async fn test_stateless_rejects_duplicates_and_bad_config() {
        let app = build_router(make_state());
        let duplicate = send(
            &app,
            Method::POST,
            "/api/v1/pagination",
            Some(json!({
                "measurements": {},
                "section_order": [
                    { "id": "a", "type": "summary", "order": 0 },
                    { "id": "a", "type": "skills", "order": 1 }
                ]
            })),
        )
        .await;
        assert_eq!(duplicate.status(), StatusCode::BAD_REQUEST);
        let body = json_body(duplicate).await;
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

        let bad_config = send(
            &app,
            Method::POST,
            "/api/v1/pagination",
            Some(json!({
                "config": { "page_height": 0 },
                "measurements": {},
                "section_order": []
            })),
        )
        .await;
        assert_eq!(bad_config.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_session_lifecycle() {
        let app = build_router(make_state());
        let id = create_session(&app).await;
        let uri = format!("/api/v1/sessions/{id}");

        let body = json_body(send(&app, Method::GET, &uri, None).await).await;
        assert_eq!(body["snapshot"]["revision"], 1);
        assert_eq!(body["snapshot"]["state"]["total_pages"], 1);

        let reorder = send(
            &app,
            Method::POST,
            &format!("{uri}/reorder"),
            Some(json!({ "from": 3, "to": 0 })),
        )
        .await;
        let body = json_body(reorder).await;
        assert_eq!(body["changed"], true);
        assert_eq!(body["snapshot"]["state"]["pages"][0]["sections"][0]["id"], "skills");

        let moved = send(
            &app,
            Method::POST,
            &format!("{uri}/move"),
            Some(json!({ "section_id": "skills", "direction": "up" })),
        )
        .await;
        assert_eq!(json_body(moved).await["changed"], false);

        let deleted = send(&app, Method::DELETE, &uri, None).await;
        assert_eq!(deleted.status(), StatusCode::NO_CONTENT);
        let missing = send(&app, Method::GET, &uri, None).await;
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_session_navigation_and_jump() {
        let app = build_router(make_state());
        let id = create_session(&app).await;
        let uri = format!("/api/v1/sessions/{id}");

        let navigate = send(
            &app,
            Method::POST,
            &format!("{uri}/navigate"),
            Some(json!({ "action": "page", "page": 5 })),
        )
        .await;
        assert_eq!(navigate.status(), StatusCode::OK);
        assert_eq!(json_body(navigate).await["changed"], false);

        let jump = send(
            &app,
            Method::POST,
            &format!("{uri}/jump"),
            Some(json!({ "section_id": "experience" })),
        )
        .await;
        assert_eq!(json_body(jump).await["page"], 1);

        let missing = send(
            &app,
            Method::POST,
            &format!("{uri}/jump"),
            Some(json!({ "section_id": "projects" })),
        )
        .await;
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_session_config_update_validated() {
        let app = build_router(make_state());
        let id = create_session(&app).await;
        let uri = format!("/api/v1/sessions/{id}/config");

        let invalid = send(&app, Method::PUT, &uri, Some(json!({ "margin_top": -5 }))).await;
        assert_eq!(invalid.status(), StatusCode::BAD_REQUEST);

        let valid = send(&app, Method::PUT, &uri, Some(json!({ "page_height": 300 }))).await;
        assert_eq!(valid.status(), StatusCode::OK);
        let body = json_body(valid).await;
        assert!(body["snapshot"]["state"]["total_pages"].as_u64().unwrap() >= 1);
        assert_eq!(body["snapshot"]["revision"], 2);
    }

    #[tokio::test]
    async fn test_document_update_accepted() {
        let app = build_router(make_state());
        let id = create_session(&app).await;
        let mut doc = make_document();
        doc.hobbies = vec!["Sailing".to_string()];
        let response = send(
            &app,
            Method::PUT,
            &format!("/api/v1/sessions/{id}/document"),
            Some(serde_json::to_value(doc).unwrap()),
        )
        .await;
        assert_eq!(response.status(), StatusCode::ACCEPTED);
    }

    #[tokio::test]
    async fn test_page_break_clashing_with_section_id_is_rejected() {
        let app = build_router(make_state());
        let mut doc = serde_json::to_value(make_document()).unwrap();
        doc["page_breaks"] = json!([{ "id": "experience", "after": "summary" }]);

        let create = send(&app, Method::POST, "/api/v1/sessions", Some(json!({ "document": doc.clone() }))).await;
        assert_eq!(create.status(), StatusCode::BAD_REQUEST);
        let body = json_body(create).await;
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

        let id = create_session(&app).await;
        let update = send(
            &app,
            Method::PUT,
            &format!("/api/v1/sessions/{id}/document"),
            Some(doc),
        )
        .await;
        assert_eq!(update.status(), StatusCode::BAD_REQUEST);

        let current = json_body(send(&app, Method::GET, &format!("/api/v1/sessions/{id}"), None).await).await;
        assert_eq!(current["snapshot"]["state"]["total_pages"], 1);
        assert!(current["snapshot"]["state"]["section_layout"]["experience"].is_object());
    }

    #[tokio::test]
    async fn test_unknown_session_is_not_found() {
        let app = build_router(make_state());
        let response = send(
            &app,
            Method::GET,
            "/api/v1/sessions/00000000-0000-4000-8000-000000000000",
            None,
        )
        .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
