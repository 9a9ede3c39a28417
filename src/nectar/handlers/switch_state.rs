use axum::{
    extract::{Extension, Query},
    http::StatusCode,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::instrument;
use utoipa::IntoParams;

use super::authorize;
use crate::nectar::AppState;
use crate::session::state::{self, ClientState};

#[derive(IntoParams, Debug, Deserialize, Default)]
#[into_params(parameter_in = Query)]
pub struct SwitchStateArgs {
    token: Option<String>,
    /// Integer presence code: 0 online, 1 sleep, 2 shutdown, 3 restart.
    state: Option<String>,
}

type SwitchStateResponse = Result<StatusCode, (StatusCode, String)>;

/// Apply a presence transition for the token's identity.
///
/// State-mutating operations are fire-and-forget for the caller: success is
/// always an empty `204`, even for unrecognized codes, which are logged and
/// dropped rather than surfaced.
#[utoipa::path(
    get,
    path = "/nectar/api/1/2/client/switchState",
    params(SwitchStateArgs),
    responses(
        (status = 204, description = "Transition applied"),
        (status = 400, description = "Missing query items or unverifiable token", body = String),
        (status = 403, description = "No live session for the token", body = String)
    ),
    tag = "client",
)]
#[instrument(skip(state, args))]
pub async fn switch_state(
    Extension(state): Extension<Arc<AppState>>,
    Query(args): Query<SwitchStateArgs>,
) -> SwitchStateResponse {
    let (Some(token), Some(raw_state)) = (args.token, args.state) else {
        return Err((StatusCode::BAD_REQUEST, String::new()));
    };

    let claims = authorize(&state, &token)?;

    let next = ClientState::decode(&raw_state);
    state::apply_state(&state.sessions, &claims.uuid, next);

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::ServerKeys;
    use crate::nectar::handlers::info::ServerInfo;
    use crate::session::{now_ms, SessionTable};
    use crate::token::{sign_es384, SessionClaims, TOKEN_TTL_MS};
    use anyhow::Result;

    fn state() -> Extension<Arc<AppState>> {
        Extension(Arc::new(AppState {
            keys: ServerKeys::generate(),
            sessions: Arc::new(SessionTable::new()),
            fts_root: std::env::temp_dir(),
            info: ServerInfo::collect(false),
        }))
    }

    fn issued_token(state: &AppState, uuid: &str) -> Result<String> {
        let session = state.sessions.insert_if_absent(uuid, TOKEN_TTL_MS, now_ms())?;
        let claims = SessionClaims {
            uuid: uuid.to_string(),
            issued_at: session.issued_at,
            ttl_ms: session.ttl_ms,
        };
        Ok(sign_es384(state.keys.signing(), &claims)?)
    }

    async fn switch(state: &Extension<Arc<AppState>>, token: &str, code: &str) -> SwitchStateResponse {
        let args = SwitchStateArgs {
            token: Some(token.to_string()),
            state: Some(code.to_string()),
        };
        switch_state(state.clone(), Query(args)).await
    }

    #[tokio::test]
    async fn missing_items_are_rejected() {
        let state = state();
        let result = switch_state(state, Query(SwitchStateArgs::default())).await;
        assert!(matches!(result, Err((StatusCode::BAD_REQUEST, _))));
    }

    #[tokio::test]
    async fn sleep_revokes_and_later_calls_are_forbidden() -> Result<()> {
        let state = state();
        let token = issued_token(&state.0, "u1")?;

        assert_eq!(
            switch(&state, &token, "1").await.map_err(|e| anyhow::anyhow!("{e:?}"))?,
            StatusCode::NO_CONTENT
        );
        assert!(state.0.sessions.get("u1").is_none());

        // Same token, session gone: forbidden, not bad request.
        let result = switch(&state, &token, "0").await;
        assert!(matches!(
            result,
            Err((StatusCode::FORBIDDEN, msg)) if msg == "Token Expired!"
        ));
        Ok(())
    }

    #[tokio::test]
    async fn restart_keeps_session_alive() -> Result<()> {
        let state = state();
        let token = issued_token(&state.0, "u1")?;

        assert_eq!(
            switch(&state, &token, "3").await.map_err(|e| anyhow::anyhow!("{e:?}"))?,
            StatusCode::NO_CONTENT
        );
        let session = state.0.sessions.get("u1").expect("session survives");
        assert!(!session.online);

        // The token is still honored afterwards.
        assert_eq!(
            switch(&state, &token, "0").await.map_err(|e| anyhow::anyhow!("{e:?}"))?,
            StatusCode::NO_CONTENT
        );
        assert!(state.0.sessions.get("u1").expect("session").online);
        Ok(())
    }

    #[tokio::test]
    async fn unrecognized_code_is_acknowledged_and_ignored() -> Result<()> {
        let state = state();
        let token = issued_token(&state.0, "u1")?;
        let before = state.0.sessions.get("u1").expect("session");

        assert_eq!(
            switch(&state, &token, "banana").await.map_err(|e| anyhow::anyhow!("{e:?}"))?,
            StatusCode::NO_CONTENT
        );
        assert_eq!(state.0.sessions.get("u1").as_ref(), Some(&before));
        Ok(())
    }
}
