use std::sync::Arc;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use lessonsmith::server::{AppState, create_router};
use serde_json::{Value, json};
use tempfile::TempDir;
use tower::ServiceExt;

use test_utils::{Scripted, ScriptedModel, orchestrator_with, presentation_json, quiz_json};

const BOUNDARY: &str = "lessonsmith-test-boundary";

struct Harness {
    router: Router,
    model: Arc<ScriptedModel>,
    staging: TempDir,
}

fn harness(script: Vec<Scripted>) -> Harness {
    let model = ScriptedModel::new(script);
    let (orchestrator, _) = orchestrator_with(model.clone());
    let staging = TempDir::new().expect("temp dir");
    let state = AppState::new(
        Arc::new(orchestrator),
        staging.path().to_path_buf(),
        1024 * 1024,
    );
    Harness {
        router: create_router(Arc::new(state)),
        model,
        staging,
    }
}

fn multipart(prompt: Option<&str>, file: Option<(&str, &str, &[u8])>) -> Body {
    let mut body = Vec::new();
    if let Some(prompt) = prompt {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"prompt\"\r\n\r\n{prompt}\r\n"
            )
            .as_bytes(),
        );
    }
    if let Some((name, media_type, bytes)) = file {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{name}\"\r\nContent-Type: {media_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    Body::from(body)
}

fn multipart_request(uri: &str, body: Body) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(body)
        .expect("request")
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.expect("response");
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("json body")
    };
    (status, value)
}

fn staged_files(dir: &TempDir) -> usize {
    std::fs::read_dir(dir.path()).map_or(0, Iterator::count)
}

#[tokio::test]
async fn test_health() {
    let h = harness(vec![]);
    let request = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .expect("request");
    let (status, body) = send(&h.router, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_generate_returns_label_and_result() {
    let h = harness(vec![Scripted::json(&quiz_json(3))]);
    let request = multipart_request(
        "/api/generate",
        multipart(Some("a quiz with 3 questions"), None),
    );

    let (status, body) = send(&h.router, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["contentType"], "quiz");
    assert_eq!(body["result"]["questions"].as_array().map(Vec::len), Some(3));
}

#[tokio::test]
async fn test_generate_with_file_stages_and_cleans_up() {
    let h = harness(vec![Scripted::json(&quiz_json(1))]);
    let request = multipart_request(
        "/api/generate",
        multipart(
            Some("a quiz about this chapter"),
            Some(("chapter.txt", "text/plain", b"Chapter one")),
        ),
    );

    let (status, _) = send(&h.router, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(staged_files(&h.staging), 0);

    let sent = &h.model.requests()[0].request.contents[0];
    let blob = sent.parts[1].inline_data.as_ref().expect("inline data");
    assert_eq!(blob.mime_type, "text/plain");
}

#[tokio::test]
async fn test_missing_prompt_is_400_without_upstream_call() {
    let h = harness(vec![]);
    let request = multipart_request(
        "/api/generate",
        multipart(None, Some(("a.pdf", "application/pdf", b"%PDF"))),
    );

    let (status, body) = send(&h.router, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["kind"], "bad_request");
    assert_eq!(h.model.calls(), 0);
    assert_eq!(staged_files(&h.staging), 0);
}

#[tokio::test]
async fn test_transient_exhaustion_maps_to_503() {
    let h = harness(vec![Scripted::RateLimited; 5]);
    let request = multipart_request("/api/generate", multipart(Some("a quiz"), None));

    let (status, body) = send(&h.router, request).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"]["kind"], "transient_upstream");
    assert_eq!(h.model.calls(), 5);
}

#[tokio::test]
async fn test_malformed_output_maps_to_502() {
    let h = harness(vec![Scripted::Text("{}".to_string())]);
    let request = multipart_request("/api/generate", multipart(Some("a quiz"), None));

    let (status, body) = send(&h.router, request).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"]["kind"], "malformed_model_output");
}

#[tokio::test]
async fn test_session_lifecycle_over_http() {
    let h = harness(vec![Scripted::json(&presentation_json("Rivers"))]);

    let create = Request::builder()
        .method("POST")
        .uri("/api/sessions")
        .body(Body::empty())
        .expect("request");
    let (status, body) = send(&h.router, create).await;
    assert_eq!(status, StatusCode::CREATED);
    let id = body["sessionId"].as_str().expect("session id").to_string();

    let message = multipart_request(
        &format!("/api/sessions/{id}/messages"),
        multipart(Some("slides about rivers"), None),
    );
    let (status, body) = send(&h.router, message).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["contentType"], "presentation");
    assert_eq!(body["result"]["title"], "Rivers");

    let history = Request::builder()
        .uri(format!("/api/sessions/{id}"))
        .body(Body::empty())
        .expect("request");
    let (status, body) = send(&h.router, history).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["history"][0]["role"], "user");
    assert_eq!(body["history"][1]["role"], "model");

    let close = Request::builder()
        .method("DELETE")
        .uri(format!("/api/sessions/{id}"))
        .body(Body::empty())
        .expect("request");
    let (status, _) = send(&h.router, close).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let again = Request::builder()
        .uri(format!("/api/sessions/{id}"))
        .body(Body::empty())
        .expect("request");
    let (status, body) = send(&h.router, again).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["kind"], "unknown_session");
}

#[tokio::test]
async fn test_message_to_unknown_session_is_404() {
    let h = harness(vec![]);
    let request = multipart_request(
        "/api/sessions/does-not-exist/messages",
        multipart(Some("slides"), Some(("x.txt", "text/plain", b"x"))),
    );

    let (status, _) = send(&h.router, request).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(h.model.calls(), 0);
    assert_eq!(staged_files(&h.staging), 0);
}

#[tokio::test]
async fn test_image_endpoint() {
    let h = harness(vec![Scripted::Image {
        mime_type: "image/png".to_string(),
        data: "iVBORw0KGgo=".to_string(),
    }]);
    let request = Request::builder()
        .method("POST")
        .uri("/api/images")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json!({ "prompt": "a volcano" }).to_string()))
        .expect("request");

    let (status, body) = send(&h.router, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["mimeType"], "image/png");
    assert_eq!(body["data"], "iVBORw0KGgo=");
}

#[tokio::test]
async fn test_image_endpoint_requires_prompt() {
    let h = harness(vec![]);
    let request = Request::builder()
        .method("POST")
        .uri("/api/images")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{}"))
        .expect("request");

    let (status, _) = send(&h.router, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(h.model.calls(), 0);
}
