use axum::{
    extract::{Extension, Query},
    http::StatusCode,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{error, info, instrument};
use utoipa::IntoParams;

use crate::nectar::AppState;
use crate::session::{now_ms, InsertError};
use crate::token::{sign_es384, SessionClaims, TOKEN_TTL_MS};

#[derive(IntoParams, Debug, Deserialize, Default)]
#[into_params(parameter_in = Query)]
pub struct TokenRequestArgs {
    /// Client-chosen identity the token will be bound to.
    uuid: Option<String>,
    /// Opaque client description; required but not interpreted.
    info: Option<String>,
}

type TokenRequestResponse = Result<(StatusCode, String), (StatusCode, String)>;

/// Issue a signed session token and register the session.
///
/// The table insert is the authority on uniqueness: an identity with a live
/// session is refused before anything is signed.
#[utoipa::path(
    get,
    path = "/nectar/api/1/2/auth/tokenRequest",
    params(TokenRequestArgs),
    responses(
        (status = 200, description = "Signed session token", body = String),
        (status = 400, description = "Missing query items or identity already has a session", body = String),
        (status = 500, description = "Token signing failed", body = String)
    ),
    tag = "auth",
)]
#[instrument(skip(state))]
pub async fn token_request(
    Extension(state): Extension<Arc<AppState>>,
    Query(args): Query<TokenRequestArgs>,
) -> TokenRequestResponse {
    let (Some(uuid), Some(_info)) = (args.uuid, args.info) else {
        return Err((
            StatusCode::BAD_REQUEST,
            "Missing query items: uuid, info".to_string(),
        ));
    };

    let session = state
        .sessions
        .insert_if_absent(&uuid, TOKEN_TTL_MS, now_ms())
        .map_err(|InsertError::AlreadyExists| {
            (
                StatusCode::BAD_REQUEST,
                "A token has already been issued to this UUID!".to_string(),
            )
        })?;

    let claims = SessionClaims {
        uuid: uuid.clone(),
        issued_at: session.issued_at,
        ttl_ms: session.ttl_ms,
    };

    let token = sign_es384(state.keys.signing(), &claims).map_err(|err| {
        // Roll the registration back, otherwise the identity is stuck
        // holding a session no client can use.
        state.sessions.remove(&uuid);
        error!("Failed to sign session token: {err}");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to sign token".to_string(),
        )
    })?;

    info!("Issued token for new client with UUID: {uuid}");

    Ok((StatusCode::OK, token))
}
