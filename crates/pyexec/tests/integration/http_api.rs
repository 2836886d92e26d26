use std::sync::Arc;

use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use pyexec::http::{EXECUTE_PATH, router};
use pyexec::runner::Runner;
use serde_json::{Value, json};
use tower::ServiceExt;

use super::{scratch_is_empty, test_config};

async fn execute(runner: Arc<Runner>, code: &str) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri(EXECUTE_PATH)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json!({ "code": code }).to_string()))
        .unwrap();

    let response = router(runner).oneshot(request).await.unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), 4 * 1024 * 1024).await.unwrap();
    (status, serde_json::from_slice(&body).unwrap())
}

#[tokio::test]
async fn test_hello_over_http() {
    let dir = tempfile::tempdir().unwrap();
    let runner = Arc::new(Runner::new(test_config(dir.path())));

    let (status, body) = execute(runner, "print('hi')").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"success": true, "output": "hi\n", "error": null}));
    assert!(scratch_is_empty(dir.path()));
}

#[tokio::test]
async fn test_traceback_over_http() {
    let dir = tempfile::tempdir().unwrap();
    let runner = Arc::new(Runner::new(test_config(dir.path())));

    let (status, body) = execute(runner, "print('a')\n1/0").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], false);
    assert_eq!(body["output"], "a\n");
    assert!(
        body["error"]
            .as_str()
            .unwrap()
            .contains("ZeroDivisionError")
    );
}

#[tokio::test]
async fn test_timeout_over_http() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(dir.path());
    config.limits = config.limits.with_wall_time_limit(1.0);
    let runner = Arc::new(Runner::new(config));

    let (status, body) = execute(runner, "while True: pass").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], false);
    assert!(
        body["error"]
            .as_str()
            .unwrap()
            .contains("Execution timed out after 1 second")
    );
    assert!(scratch_is_empty(dir.path()));
}
