//! Authoritative server-side session state.
//!
//! The [`SessionTable`] is the single mutable resource shared between the
//! request handlers and the expiry sweeper. Every operation takes the table
//! lock exactly once and never suspends while holding it, so each mutation
//! is atomic with respect to every other: a revocation marks the session
//! expired and removes it under one lock acquisition, and no lookup can
//! observe an expired-but-present entry.

pub mod state;
pub mod sweeper;

use serde::Serialize;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use thiserror::Error;

use self::state::PingData;

/// Interval between sweeper ticks.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(1);

/// Current time in Unix milliseconds, the unit session timestamps use.
#[must_use]
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// One client's session record. Owned by the table; reads hand out clones.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Session {
    pub uuid: String,
    /// Issue time, Unix milliseconds. Matches the token's `timestamp` claim.
    pub issued_at: i64,
    pub ttl_ms: i64,
    pub expired: bool,
    pub online: bool,
    /// Set once a client authenticates with a user. User authentication is
    /// not implemented, so this stays `false` for the session's lifetime.
    pub authenticated: bool,
    pub security_updates: Option<u64>,
    pub other_updates: Option<u64>,
}

impl Session {
    fn new(uuid: &str, ttl_ms: i64, now_ms: i64) -> Self {
        Self {
            uuid: uuid.to_string(),
            issued_at: now_ms,
            ttl_ms,
            expired: false,
            online: true,
            authenticated: false,
            security_updates: None,
            other_updates: None,
        }
    }

    fn is_past_ttl(&self, now_ms: i64) -> bool {
        now_ms - self.issued_at >= self.ttl_ms
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum InsertError {
    #[error("a token has already been issued to this uuid")]
    AlreadyExists,
}

/// Identity-keyed session registry.
#[derive(Debug, Default)]
pub struct SessionTable {
    inner: Mutex<HashMap<String, Session>>,
}

impl SessionTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Session>> {
        // A poisoned lock means a panic mid-mutation elsewhere; the map is
        // plain data, so the state itself is still coherent.
        self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Register a new session unless a live one already exists for `uuid`.
    ///
    /// # Errors
    ///
    /// Returns [`InsertError::AlreadyExists`] when the identity already has a
    /// session; issuance must refuse rather than overwrite it.
    pub fn insert_if_absent(
        &self,
        uuid: &str,
        ttl_ms: i64,
        now_ms: i64,
    ) -> Result<Session, InsertError> {
        let mut map = self.lock();
        if map.contains_key(uuid) {
            return Err(InsertError::AlreadyExists);
        }
        let session = Session::new(uuid, ttl_ms, now_ms);
        map.insert(uuid.to_string(), session.clone());
        Ok(session)
    }

    #[must_use]
    pub fn get(&self, uuid: &str) -> Option<Session> {
        self.lock().get(uuid).cloned()
    }

    #[must_use]
    pub fn contains(&self, uuid: &str) -> bool {
        self.lock().contains_key(uuid)
    }

    pub fn remove(&self, uuid: &str) -> Option<Session> {
        self.lock().remove(uuid)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Clone the current entries. The snapshot is detached: iterating it
    /// cannot race with concurrent table mutation.
    #[must_use]
    pub fn snapshot(&self) -> Vec<(String, Session)> {
        self.lock()
            .iter()
            .map(|(uuid, session)| (uuid.clone(), session.clone()))
            .collect()
    }

    /// Merge the counters a ping supplied. Absent fields keep their previous
    /// value. Returns `false` if no session exists for `uuid`.
    pub fn apply_ping(&self, uuid: &str, data: &PingData) -> bool {
        let mut map = self.lock();
        let Some(session) = map.get_mut(uuid) else {
            return false;
        };
        if let Some(count) = data.security_updates {
            session.security_updates = Some(count);
        }
        if let Some(count) = data.other_updates {
            session.other_updates = Some(count);
        }
        true
    }

    /// Returns `false` if no session exists for `uuid`.
    pub fn set_online(&self, uuid: &str, online: bool) -> bool {
        let mut map = self.lock();
        let Some(session) = map.get_mut(uuid) else {
            return false;
        };
        session.online = online;
        true
    }

    /// Revoke a session: mark it offline and expired, then drop it from the
    /// table, all under one lock acquisition. Returns `false` if no session
    /// exists for `uuid`.
    pub fn revoke(&self, uuid: &str) -> bool {
        let mut map = self.lock();
        let Some(session) = map.get_mut(uuid) else {
            return false;
        };
        session.online = false;
        session.expired = true;
        map.remove(uuid);
        true
    }

    /// Drop every session whose TTL has elapsed at `now_ms` and return the
    /// evicted identities. Sessions inside their TTL are left untouched.
    pub fn evict_expired(&self, now_ms: i64) -> Vec<String> {
        let mut map = self.lock();
        let expired: Vec<String> = map
            .iter()
            .filter(|(_, session)| session.is_past_ttl(now_ms))
            .map(|(uuid, _)| uuid.clone())
            .collect();
        for uuid in &expired {
            if let Some(session) = map.get_mut(uuid) {
                session.expired = true;
                map.remove(uuid);
            }
        }
        expired
    }
}
