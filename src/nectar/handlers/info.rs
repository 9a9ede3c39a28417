use axum::{extract::Extension, response::Json};
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;

use crate::nectar::{AppState, API_VERSION_MAJOR, API_VERSION_MINOR, SOFTWARE};

/// Static server/API descriptor answered by `infoRequest`.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ServerInfo {
    software: &'static str,
    version: &'static str,
    api_major: &'static str,
    api_minor: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<SystemInfo>,
}

/// Host platform details, only disclosed when `--send-system-data` is set.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SystemInfo {
    os: &'static str,
    arch: &'static str,
    cpu_count: usize,
}

impl ServerInfo {
    /// Build the descriptor once at startup.
    #[must_use]
    pub fn collect(send_system_data: bool) -> Self {
        let system = send_system_data.then(|| SystemInfo {
            os: std::env::consts::OS,
            arch: std::env::consts::ARCH,
            cpu_count: std::thread::available_parallelism().map_or(1, usize::from),
        });

        Self {
            software: SOFTWARE,
            version: env!("CARGO_PKG_VERSION"),
            api_major: API_VERSION_MAJOR,
            api_minor: API_VERSION_MINOR,
            system,
        }
    }
}

/// Answer the server/API version descriptor.
#[utoipa::path(
    get,
    path = "/nectar/api/1/2/infoRequest",
    responses(
        (status = 200, description = "Server descriptor", body = ServerInfo)
    ),
    tag = "info",
)]
pub async fn info(Extension(state): Extension<Arc<AppState>>) -> Json<ServerInfo> {
    Json(state.info.clone())
}
