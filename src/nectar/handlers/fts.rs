use axum::{
    extract::{Extension, Query},
    http::{header::CONTENT_TYPE, HeaderMap, HeaderValue, StatusCode},
};
use serde::Deserialize;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, instrument};
use utoipa::IntoParams;

use super::authorize;
use crate::nectar::AppState;

/// Prefix of the FTS subtree that is served without user authentication.
const PUBLIC_PREFIX: &str = "/public";

#[derive(IntoParams, Debug, Deserialize, Default)]
#[into_params(parameter_in = Query)]
pub struct DownloadArgs {
    token: Option<String>,
    /// Path below the FTS root, e.g. `/public/readme.txt`.
    path: Option<String>,
}

type DownloadResponse = Result<(StatusCode, HeaderMap, Vec<u8>), (StatusCode, String)>;

/// Serve a file from the public FTS subtree.
///
/// Only `/public` paths are served; user-scoped file access needs per-user
/// authentication that does not exist yet, so those paths answer `501`.
#[utoipa::path(
    get,
    path = "/nectar/api/1/2/fts/download",
    params(DownloadArgs),
    responses(
        (status = 200, description = "File bytes", body = Vec<u8>),
        (status = 400, description = "Missing query items or unverifiable token", body = String),
        (status = 403, description = "No live session for the token", body = String),
        (status = 404, description = "File not found", body = String),
        (status = 501, description = "Non-public paths are not implemented", body = String)
    ),
    tag = "fts",
)]
#[instrument(skip(state, args))]
pub async fn download(
    Extension(state): Extension<Arc<AppState>>,
    Query(args): Query<DownloadArgs>,
) -> DownloadResponse {
    let (Some(token), Some(path)) = (args.token, args.path) else {
        return Err((
            StatusCode::BAD_REQUEST,
            "Missing query items: token, path".to_string(),
        ));
    };

    let claims = authorize(&state, &token)?;

    if !path.starts_with(PUBLIC_PREFIX) {
        return Err((
            StatusCode::NOT_IMPLEMENTED,
            "User based FTS and authentication is not implemented.".to_string(),
        ));
    }

    let Some(full_path) = resolve_public_path(&state.fts_root, &path) else {
        debug!("Refusing FTS path escaping the root: {path}");
        return Err((StatusCode::NOT_FOUND, "Not Found".to_string()));
    };

    match tokio::fs::read(&full_path).await {
        Ok(bytes) => {
            debug!("Serving {} ({} bytes) to {}", path, bytes.len(), claims.uuid);
            let mut headers = HeaderMap::new();
            headers.insert(
                CONTENT_TYPE,
                HeaderValue::from_static("application/octet-stream"),
            );
            Ok((StatusCode::OK, headers, bytes))
        }
        Err(err) => {
            debug!("FTS lookup failed for {path}: {err}");
            Err((StatusCode::NOT_FOUND, "Not Found".to_string()))
        }
    }
}

/// Map a `/public/...` request path onto the FTS root, rejecting any path
/// whose components could climb out of it.
fn resolve_public_path(fts_root: &Path, request_path: &str) -> Option<PathBuf> {
    let relative = request_path.trim_start_matches('/');
    let relative = Path::new(relative);

    for component in relative.components() {
        match component {
            Component::Normal(_) => {}
            _ => return None,
        }
    }

    Some(fts_root.join(relative))
}
