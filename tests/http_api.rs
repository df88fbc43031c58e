#![cfg(feature = "server")]

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use http_body_util::BodyExt;
use og_preview::server::{AppState, build_router};
use og_preview::{ApproxMetrics, CardRenderer, PreviewGenerator, PreviewStore};
use serde_json::Value;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

struct TestApp {
    _dir: TempDir,
    store: PreviewStore,
    router: Router,
}

fn app() -> TestApp {
    let dir = TempDir::new().expect("temp dir");
    let store = PreviewStore::new(dir.path().join("previews"), "/previews");
    let renderer = CardRenderer::with_measure(ApproxMetrics::default());
    let generator = PreviewGenerator::new(store.clone(), Arc::new(renderer));
    TestApp {
        _dir: dir,
        store,
        router: build_router(AppState::new(generator)),
    }
}

impl TestApp {
    async fn send(&self, method: Method, uri: &str) -> (StatusCode, Vec<u8>, Option<String>) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .expect("request should build");
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router should respond");

        let status = response.status();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let body = response
            .into_body()
            .collect()
            .await
            .expect("body should collect")
            .to_bytes()
            .to_vec();
        (status, body, content_type)
    }

    async fn json(&self, method: Method, uri: &str) -> (StatusCode, Value) {
        let (status, body, _) = self.send(method, uri).await;
        let value = serde_json::from_slice(&body).expect("body should be JSON");
        (status, value)
    }

    async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.json(Method::GET, uri).await
    }

    async fn cached_ids(&self) -> Vec<String> {
        self.store
            .list()
            .await
            .into_iter()
            .map(|entry| entry.id.to_string())
            .collect()
    }
}

#[tokio::test]
async fn generate_then_serve_from_cache() {
    let app = app();
    let uri = "/api/og?id=blog-42&title=Great+Tool&desc=Short+desc";

    let (status, first) = app.get(uri).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["success"], true);
    assert_eq!(first["cached"], false);
    assert_eq!(first["url"], "/previews/blog-42.png");
    assert!(first["generated"].is_string());

    let (status, second) = app.get(uri).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["cached"], true);
    assert_eq!(second["url"], first["url"]);
    assert!(second.get("generated").is_none());

    assert_eq!(app.cached_ids().await, vec!["blog-42"]);
}

#[tokio::test]
async fn regenerate_renders_again() {
    let app = app();
    app.get("/api/og?id=tool-slack&title=Slack").await;

    let (status, body) = app
        .get("/api/og?id=tool-slack&title=Slack+2&regenerate=true")
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["cached"], false);
}

#[tokio::test]
async fn missing_parameters_are_rejected_with_usage() {
    let app = app();

    let (status, body) = app.get("/api/og?id=blog-1").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Missing required parameter: title");
    assert!(body["usage"].as_str().unwrap().starts_with("/api/og?"));

    let (status, body) = app.get("/api/og?title=Hello").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Missing required parameter: id");

    assert!(app.cached_ids().await.is_empty());
}

#[tokio::test]
async fn unsafe_ids_and_colors_are_rejected() {
    let app = app();

    let (status, body) = app.get("/api/og?id=..%2Fetc%2Fpasswd&title=x").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("invalid preview id"));

    let (status, _) = app.get("/api/og?id=ok&title=x&textColor=purple").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert!(app.cached_ids().await.is_empty());
}

#[tokio::test]
async fn stored_previews_are_served_as_png() {
    let app = app();

    let (status, _, _) = app.send(Method::GET, "/previews/blog-7.png").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    app.get("/api/og?id=blog-7&title=Hello&category=News").await;
    let (status, body, content_type) = app.send(Method::GET, "/previews/blog-7.png").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type.as_deref(), Some("image/png"));
    assert_eq!(&body[..8], b"\x89PNG\r\n\x1a\n");

    let image = image::load_from_memory(&body).expect("valid png");
    assert_eq!((image.width(), image.height()), (1200, 630));
}

#[tokio::test]
async fn cache_listing_and_check() {
    let app = app();
    app.get("/api/og?id=b&title=B").await;
    app.get("/api/og?id=a&title=A").await;

    let (status, body) = app.get("/api/og-cache").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["count"], 2);
    assert_eq!(body["images"][0]["filename"], "a.png");
    assert_eq!(body["images"][0]["id"], "a");
    assert_eq!(body["images"][0]["url"], "/previews/a.png");

    let (_, body) = app.get("/api/og-cache?action=check&id=a").await;
    assert_eq!(body["exists"], true);
    assert_eq!(body["url"], "/previews/a.png");

    let (_, body) = app.get("/api/og-cache?action=check&id=zzz").await;
    assert_eq!(body["exists"], false);
    assert!(body["url"].is_null());

    let (status, _) = app.get("/api/og-cache?action=check").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn delete_and_clear() {
    let app = app();
    for id in ["one", "two", "three"] {
        app.get(&format!("/api/og?id={id}&title=T")).await;
    }

    let (status, body) = app.json(Method::DELETE, "/api/og-cache?id=two").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "Deleted image: two");
    assert_eq!(body["id"], "two");

    let (status, body) = app.json(Method::DELETE, "/api/og-cache?id=two").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "Image not found: two");

    let (status, body) = app.get("/api/og-cache?action=clear").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 2);
    assert_eq!(body["message"], "Cleared 2 cached images");
    assert!(app.cached_ids().await.is_empty());

    let (status, body) = app.get("/api/og-cache").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 0);
}

#[tokio::test]
async fn cache_endpoint_rejects_bad_requests() {
    let app = app();

    let (status, _) = app.json(Method::DELETE, "/api/og-cache").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app.get("/api/og-cache?action=purge").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app.json(Method::POST, "/api/og-cache").await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(body["error"], "Method not allowed");
}

#[tokio::test]
async fn unreadable_cache_lists_as_empty() {
    let dir = TempDir::new().expect("temp dir");
    let root = dir.path().join("previews");
    std::fs::write(&root, b"not a directory").expect("write file");

    let store = PreviewStore::new(&root, "/previews");
    let renderer = CardRenderer::with_measure(ApproxMetrics::default());
    let app = TestApp {
        router: build_router(AppState::new(PreviewGenerator::new(
            store.clone(),
            Arc::new(renderer),
        ))),
        store,
        _dir: dir,
    };

    let (status, body) = app.get("/api/og-cache").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["count"], 0);
    assert_eq!(body["images"], serde_json::json!([]));

    let (status, body) = app.get("/api/og-cache?action=check&id=blog-1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["exists"], false);
}
