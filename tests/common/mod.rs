#![allow(dead_code)]

use std::time::Duration;

use axum::{body::to_bytes, http::Request, response::Response, Router};
use route_animator::{api_router, config::Config, state::AppState};
use serde_json::Value;
use tower::ServiceExt;

pub fn test_config(upstream: &str) -> Config {
    Config {
        openaq_base_url: upstream.to_string(),
        openaq_api_key: Some("test-key".to_string()),
        mapbox_base_url: upstream.to_string(),
        mapbox_access_token: Some("pk.test".to_string()),
        sample_delay: Duration::from_millis(1),
        fetch_initial_backoff: Duration::from_millis(1),
        fetch_max_retries: 1,
        ..Config::default()
    }
}

pub fn app(config: Config) -> Router {
    api_router().with_state(AppState::new(config))
}

pub async fn spawn_upstream(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind upstream");
    let addr = listener.local_addr().expect("upstream addr");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("serve upstream");
    });
    format!("http://{addr}")
}

pub async fn get(app: &Router, uri: &str) -> Response {
    app.clone()
        .oneshot(
            Request::builder()
                .uri(uri)
                .method("GET")
                .body(axum::body::Body::empty())
                .expect("request"),
        )
        .await
        .expect("response")
}

pub async fn post_json(app: &Router, uri: &str, body: &Value) -> Response {
    app.clone()
        .oneshot(
            Request::builder()
                .uri(uri)
                .method("POST")
                .header("content-type", "application/json")
                .body(axum::body::Body::from(body.to_string()))
                .expect("request"),
        )
        .await
        .expect("response")
}

pub async fn json_body(response: Response) -> Value {
    let body = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body bytes");
    serde_json::from_slice(&body).expect("json body")
}
