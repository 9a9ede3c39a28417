//! Per-client presence state machine.
//!
//! Clients report presence changes as small integer codes and liveness data
//! as a JSON ping payload. Codes are decoded once at the HTTP boundary into
//! [`ClientState`]; anything outside the recognized set becomes
//! [`ClientState::Unrecognized`], which is logged and otherwise ignored so a
//! malformed status can never break an otherwise valid session.

use serde::Deserialize;
use tracing::{debug, info};

use super::SessionTable;

/// Counters a client may report with a ping. Both fields are optional; a
/// ping that omits one is a partial update, not a reset.
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PingData {
    pub security_updates: Option<u64>,
    pub other_updates: Option<u64>,
}

/// Presence transitions a client may request.
///
/// Codes 1 and 2 revoke the session: the client is going away and its token
/// must stop working. Code 3 (restart) only marks the client offline; the
/// token stays valid so the client can resume without re-issuing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    /// `0`: client is online.
    Online,
    /// `1`: client is going to sleep; revoke.
    Sleeping,
    /// `2`: client is shutting down; revoke.
    ShuttingDown,
    /// `3`: client is restarting; stays registered.
    Restarting,
    /// Any other input. Logged, never an error.
    Unrecognized,
}

impl ClientState {
    /// Decode a raw query-string state code.
    #[must_use]
    pub fn decode(raw: &str) -> Self {
        match raw.trim().parse::<i64>() {
            Ok(0) => Self::Online,
            Ok(1) => Self::Sleeping,
            Ok(2) => Self::ShuttingDown,
            Ok(3) => Self::Restarting,
            _ => Self::Unrecognized,
        }
    }
}

/// Apply a presence transition to `uuid`'s session.
///
/// Revoking states remove the session from the table; by the time this
/// returns, no lookup can succeed for a revoked identity.
pub fn apply_state(table: &SessionTable, uuid: &str, state: ClientState) {
    match state {
        ClientState::Online => {
            if table.set_online(uuid, true) {
                info!("Client {uuid} is now online");
            }
        }
        ClientState::Sleeping => {
            if table.revoke(uuid) {
                info!("Client {uuid} is going to sleep, token revoked");
            }
        }
        ClientState::ShuttingDown => {
            if table.revoke(uuid) {
                info!("Client {uuid} is shutting down, token revoked");
            }
        }
        ClientState::Restarting => {
            if table.set_online(uuid, false) {
                info!("Client {uuid} is restarting");
            }
        }
        ClientState::Unrecognized => {
            debug!("Unrecognized client state for {uuid}");
        }
    }
}

/// Merge a ping payload into `uuid`'s session. Returns `false` when the
/// session no longer exists.
pub fn apply_ping(table: &SessionTable, uuid: &str, data: &PingData) -> bool {
    table.apply_ping(uuid, data)
}
