//! HTTP API over the analysis pipeline and the library store.

mod handlers;
mod routes;

pub use routes::create_router;

use std::net::SocketAddr;
use std::sync::Arc;

use crate::config::Settings;
use crate::store::Store;

/// Shared state for the API server.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Store>,
    pub settings: Arc<Settings>,
}

impl AppState {
    pub fn new(settings: Settings) -> anyhow::Result<Self> {
        let store = Store::new(&settings.storage.db_path)?;
        Ok(Self {
            store: Arc::new(store),
            settings: Arc::new(settings),
        })
    }
}

/// Start the API server.
pub async fn serve(settings: Settings, host: &str, port: u16) -> anyhow::Result<()> {
    let state = AppState::new(settings)?;
    let app = create_router(state);

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    tracing::info!("Starting server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tempfile::tempdir;
    use tower::ServiceExt;

    use crate::analysis::AnalysisEnvelope;
    use crate::store::DEFAULT_CATEGORY;

    fn setup_test_app() -> (axum::Router, AppState, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let mut settings = Settings::default();
        settings.storage.db_path = dir.path().join("test.db");

        let state = AppState::new(settings).unwrap();
        let app = create_router(state.clone());
        (app, state, dir)
    }

    fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn sample_envelope() -> AnalysisEnvelope {
        AnalysisEnvelope {
            analysis_id: "a".repeat(64),
            url: "https://example.com/p/1".to_string(),
            keywords: vec!["음질".to_string()],
            analysis_text: r#"{"product_name":"이어폰"}"#.to_string(),
            records_collected: 10,
        }
    }

    #[tokio::test]
    async fn health_endpoint_responds() {
        let (app, _state, _dir) = setup_test_app();
        let response = app
            .oneshot(Request::get("/api/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn analyze_rejects_missing_fields() {
        let (app, _state, _dir) = setup_test_app();
        let response = app
            .oneshot(json_request(
                "POST",
                "/api/analyze",
                serde_json::json!({"keywords": ["음질"]}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn analyze_rejects_invalid_url() {
        let (app, _state, _dir) = setup_test_app();
        let response = app
            .oneshot(json_request(
                "POST",
                "/api/analyze",
                serde_json::json!({"link": "not a url", "keywords": ["음질"]}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn user_creation_conflicts_on_duplicate() {
        let (app, _state, _dir) = setup_test_app();

        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/users",
                serde_json::json!({"user_name": "민수"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = app
            .oneshot(json_request(
                "POST",
                "/api/users",
                serde_json::json!({"user_name": "민수"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn library_save_list_delete_round_trip() {
        let (app, state, _dir) = setup_test_app();
        let user = state.store.create_user("지연").unwrap();
        let envelope = sample_envelope();

        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/library",
                serde_json::json!({"user_id": user.user_id, "analysis": envelope}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = app
            .clone()
            .oneshot(
                Request::get(format!("/api/library?user_id={}", user.user_id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["data"].as_array().unwrap().len(), 1);
        assert_eq!(body["data"][0]["category_name"], DEFAULT_CATEGORY);

        let response = app
            .oneshot(
                Request::delete(format!(
                    "/api/library/{}?user_id={}",
                    "a".repeat(64),
                    user.user_id
                ))
                .body(Body::empty())
                .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        assert!(state.store.library_for_user(user.user_id).unwrap().is_empty());
    }

    #[tokio::test]
    async fn deleting_absent_library_item_is_not_found() {
        let (app, state, _dir) = setup_test_app();
        let user = state.store.create_user("현우").unwrap();

        let response = app
            .oneshot(
                Request::delete(format!("/api/library/missing?user_id={}", user.user_id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn saving_for_unknown_user_is_not_found() {
        let (app, _state, _dir) = setup_test_app();
        let response = app
            .oneshot(json_request(
                "POST",
                "/api/library",
                serde_json::json!({"user_id": 9999, "analysis": sample_envelope()}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
