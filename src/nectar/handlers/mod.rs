pub mod fts;
pub mod health;
pub mod info;
pub mod ping;
pub mod switch_state;
pub mod token_request;

pub use self::fts::download;
pub use self::health::health;
pub use self::info::info;
pub use self::ping::ping;
pub use self::switch_state::switch_state;
pub use self::token_request::token_request;

// Access guard shared by every protected handler.
use crate::nectar::AppState;
use crate::token::{self, SessionClaims};
use axum::http::StatusCode;
use tracing::debug;

/// Verify a token and resolve its session, in that order.
///
/// A bad signature is the caller's mistake (`400`); a verified token whose
/// session is gone gets `403` with the same message whether the session
/// expired or never existed, so callers cannot tell the two apart.
///
/// # Errors
///
/// Returns the status/message pair the handler should answer with.
pub(crate) fn authorize(
    state: &AppState,
    token: &str,
) -> Result<SessionClaims, (StatusCode, String)> {
    let claims = token::verify_es384(token, state.keys.verifying()).map_err(|err| {
        debug!("Token verification failed: {err}");
        (
            StatusCode::BAD_REQUEST,
            "Failed to verify token.".to_string(),
        )
    })?;

    if !state.sessions.contains(&claims.uuid) {
        debug!("No live session for {}", claims.uuid);
        return Err((StatusCode::FORBIDDEN, "Token Expired!".to_string()));
    }

    Ok(claims)
}
