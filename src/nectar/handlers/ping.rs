use axum::{
    extract::{Extension, Query},
    http::StatusCode,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, instrument};
use utoipa::IntoParams;

use super::authorize;
use crate::nectar::AppState;
use crate::session::state::{self, PingData};

#[derive(IntoParams, Debug, Deserialize, Default)]
#[into_params(parameter_in = Query)]
pub struct PingArgs {
    token: Option<String>,
    /// JSON payload with optional `securityUpdates`/`otherUpdates` counters.
    data: Option<String>,
}

type PingResponse = Result<StatusCode, (StatusCode, String)>;

/// Record a client liveness ping, merging any counters it carries.
#[utoipa::path(
    get,
    path = "/nectar/api/1/2/client/ping",
    params(PingArgs),
    responses(
        (status = 204, description = "Ping recorded"),
        (status = 400, description = "Missing query items or unverifiable token", body = String),
        (status = 403, description = "No live session for the token", body = String)
    ),
    tag = "client",
)]
#[instrument(skip(state, args))]
pub async fn ping(
    Extension(state): Extension<Arc<AppState>>,
    Query(args): Query<PingArgs>,
) -> PingResponse {
    let (Some(token), Some(data)) = (args.token, args.data) else {
        return Err((StatusCode::BAD_REQUEST, String::new()));
    };

    let claims = authorize(&state, &token)?;

    // The original server ignores junk ping payloads rather than failing the
    // session over them; an unparsable payload degrades to an empty merge.
    let data: PingData = serde_json::from_str(&data).unwrap_or_else(|err| {
        debug!("Ignoring malformed ping data from {}: {err}", claims.uuid);
        PingData::default()
    });

    state::apply_ping(&state.sessions, &claims.uuid, &data);

    Ok(StatusCode::NO_CONTENT)
}
