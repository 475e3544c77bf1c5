//! Read-only HTTP dashboard over the history file.
//!
//! Serves an embedded HTML page plus a small JSON API. Handlers re-read
//! the history file per request so a running daemon's commits show up
//! without restarting the dashboard process. No authentication; bind to
//! localhost.

use axum::extract::{Path as UrlPath, Query, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

use crate::models::CommitRecord;
use crate::store::HistoryStore;

/// Errors serving the dashboard.
#[derive(Error, Debug)]
pub enum DashboardError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },

    #[error("HTTP server error: {0}")]
    Serve(std::io::Error),
}

#[derive(Clone)]
struct AppState {
    history_path: Arc<PathBuf>,
}

/// Build the dashboard router for the given history file.
pub fn router(history_path: PathBuf) -> Router {
    let state = AppState {
        history_path: Arc::new(history_path),
    };

    Router::new()
        .route("/", get(index))
        .route("/api/stats", get(stats))
        .route("/api/history", get(history))
        .route("/api/commits/:hash", get(commit_by_hash))
        .route("/api/files", get(files_by_path))
        .with_state(state)
}

/// Serve the dashboard on `127.0.0.1:<port>` until the process exits.
pub async fn serve(port: u16, history_path: PathBuf) -> Result<(), DashboardError> {
    let addr = format!("127.0.0.1:{port}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| DashboardError::Bind {
            addr: addr.clone(),
            source: e,
        })?;

    println!("GitPulse dashboard at http://{addr}");
    axum::serve(listener, router(history_path))
        .await
        .map_err(DashboardError::Serve)
}

fn load(state: &AppState) -> Result<HistoryStore, Response> {
    HistoryStore::open(state.history_path.as_ref().clone()).map_err(|e| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "error": e.to_string() })),
        )
            .into_response()
    })
}

async fn index() -> Html<&'static str> {
    Html(include_str!("static/index.html"))
}

async fn stats(State(state): State<AppState>) -> Response {
    match load(&state) {
        Ok(store) => Json(store.stats()).into_response(),
        Err(response) => response,
    }
}

async fn history(State(state): State<AppState>) -> Response {
    match load(&state) {
        Ok(store) => {
            // Newest first.
            let mut records: Vec<CommitRecord> = store.all().to_vec();
            records.reverse();
            Json(records).into_response()
        }
        Err(response) => response,
    }
}

async fn commit_by_hash(State(state): State<AppState>, UrlPath(hash): UrlPath<String>) -> Response {
    match load(&state) {
        Ok(store) => match store.get_by_hash(&hash) {
            Some(record) => Json(record).into_response(),
            None => (
                StatusCode::NOT_FOUND,
                Json(serde_json::json!({ "error": "unknown commit hash" })),
            )
                .into_response(),
        },
        Err(response) => response,
    }
}

#[derive(Deserialize)]
struct FilesQuery {
    path: Option<String>,
}

async fn files_by_path(State(state): State<AppState>, Query(query): Query<FilesQuery>) -> Response {
    let path = match query.path {
        Some(path) if !path.is_empty() => path,
        _ => {
            return (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({ "error": "path query param required" })),
            )
                .into_response()
        }
    };

    match load(&state) {
        Ok(store) => {
            let records: Vec<&CommitRecord> = store.get_by_file(&path);
            Json(records).into_response()
        }
        Err(response) => response,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FileEntry, FileStatus};
    use chrono::Utc;
    use tower::util::ServiceExt;

    fn record(hash: &str, file: &str) -> CommitRecord {
        CommitRecord {
            hash: hash.to_string(),
            message: "feat: thing".into(),
            files: vec![FileEntry {
                path: file.to_string(),
                diff: "+x\n".into(),
                lines_added: 1,
                lines_removed: 0,
                status: FileStatus::Modified,
            }],
            group_reason: "singletons".into(),
            ai_generated: true,
            review: None,
            pushed: false,
            pushed_at: None,
            remote: None,
            branch: None,
            created_at: Utc::now(),
        }
    }

    fn seeded_router(dir: &std::path::Path) -> Router {
        let path = dir.join("history.json");
        let mut store = HistoryStore::open(path.clone()).unwrap();
        store.save(record("aaa", "src/a.rs")).unwrap();
        store.save(record("bbb", "src/b.rs")).unwrap();
        router(path)
    }

    async fn get_body(router: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = router
            .oneshot(
                axum::http::Request::builder()
                    .uri(uri)
                    .body(axum::body::Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, value)
    }

    #[tokio::test]
    async fn history_is_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let (status, body) = get_body(seeded_router(dir.path()), "/api/history").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["hash"], "bbb");
        assert_eq!(body[1]["hash"], "aaa");
    }

    #[tokio::test]
    async fn stats_reports_totals() {
        let dir = tempfile::tempdir().unwrap();
        let (status, body) = get_body(seeded_router(dir.path()), "/api/stats").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total_commits"], 2);
        assert_eq!(body["ai_generated"], 2);
    }

    #[tokio::test]
    async fn commit_lookup_by_hash() {
        let dir = tempfile::tempdir().unwrap();
        let (status, body) = get_body(seeded_router(dir.path()), "/api/commits/aaa").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["hash"], "aaa");

        let (status, _) = get_body(seeded_router(dir.path()), "/api/commits/zzz").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn files_requires_path_param() {
        let dir = tempfile::tempdir().unwrap();
        let (status, _) = get_body(seeded_router(dir.path()), "/api/files").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) =
            get_body(seeded_router(dir.path()), "/api/files?path=src/a.rs").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn missing_history_file_serves_empty_data() {
        let dir = tempfile::tempdir().unwrap();
        let router = router(dir.path().join("history.json"));
        let (status, body) = get_body(router, "/api/history").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 0);
    }
}
