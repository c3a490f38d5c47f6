//! Upload handlers.
//!
//! Routes are relative to the instance's base path:
//! - `PUT|POST /files/{name}` stores the request body
//! - `GET /files/{name}` returns a stored file
//! - `GET /health` reports the serving generation

use std::path::PathBuf;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::http::response::UploadError;

/// State shared by the handlers of one instance.
#[derive(Debug, Clone)]
pub struct UploadState {
    pub upload_dir: PathBuf,
    pub generation: u64,
}

/// Build the upload routes.
pub fn routes(state: UploadState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/files/{name}", get(fetch).put(store).post(store))
        .with_state(state)
}

async fn health(State(state): State<UploadState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "generation": state.generation,
    }))
}

async fn store(
    State(state): State<UploadState>,
    Path(name): Path<String>,
    body: Bytes,
) -> Result<impl IntoResponse, UploadError> {
    validate_name(&name)?;

    tokio::fs::create_dir_all(&state.upload_dir).await?;

    // Write aside and rename so readers never see a partial file.
    let staging = state.upload_dir.join(format!(".{}.part", Uuid::new_v4()));
    if let Err(e) = tokio::fs::write(&staging, &body).await {
        let _ = tokio::fs::remove_file(&staging).await;
        metrics::counter!("uploader_uploads_total", "status" => "failed").increment(1);
        return Err(e.into());
    }
    tokio::fs::rename(&staging, state.upload_dir.join(&name)).await?;

    metrics::counter!("uploader_uploads_total", "status" => "stored").increment(1);
    tracing::info!(name = %name, bytes = body.len(), generation = state.generation, "File stored");

    Ok((
        StatusCode::CREATED,
        Json(json!({ "name": name, "bytes": body.len() })),
    ))
}

async fn fetch(
    State(state): State<UploadState>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, UploadError> {
    validate_name(&name)?;

    match tokio::fs::read(state.upload_dir.join(&name)).await {
        Ok(bytes) => Ok(([(header::CONTENT_TYPE, "application/octet-stream")], bytes)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(UploadError::NotFound(name)),
        Err(e) => Err(e.into()),
    }
}

/// A stored name is a single visible path segment.
fn validate_name(name: &str) -> Result<(), UploadError> {
    let invalid = name.is_empty()
        || name.starts_with('.')
        || name.chars().any(|c| matches!(c, '/' | '\\') || c.is_control());
    if invalid {
        return Err(UploadError::InvalidName(name.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn app(dir: &std::path::Path) -> Router {
        routes(UploadState {
            upload_dir: dir.to_path_buf(),
            generation: 3,
        })
    }

    #[test]
    fn test_name_validation() {
        assert!(validate_name("report.pdf").is_ok());
        assert!(validate_name("").is_err());
        assert!(validate_name("..").is_err());
        assert!(validate_name(".hidden").is_err());
        assert!(validate_name("a\\b").is_err());
    }

    #[tokio::test]
    async fn store_then_fetch() {
        let dir = tempfile::tempdir().unwrap();

        let response = app(dir.path())
            .oneshot(
                Request::put("/files/hello.txt")
                    .body(Body::from("hello world"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = app(dir.path())
            .oneshot(Request::get("/files/hello.txt").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(&body[..], b"hello world");
    }

    #[tokio::test]
    async fn missing_file_is_404() {
        let dir = tempfile::tempdir().unwrap();
        let response = app(dir.path())
            .oneshot(Request::get("/files/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn health_reports_generation() {
        let dir = tempfile::tempdir().unwrap();
        let response = app(dir.path())
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        let value: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["generation"], 3);
    }
}
