//! # Nectar Server
//!
//! Session and authorization core for a fleet of client machines. The server
//! issues ES384-signed, time-limited tokens bound to a client-chosen
//! identity, keeps the authoritative session state in memory, guards every
//! protected endpoint with token verification plus session lookup, tracks a
//! small per-client presence state machine, and sweeps expired sessions once
//! a second.
//!
//! The token is only the tamper-evident form of the claims; everything
//! mutable about a client (presence, update counters, expiry) lives in the
//! [`session::SessionTable`] and nowhere else. A token whose session has
//! been swept or revoked still verifies cryptographically and is then
//! refused with `403`, so callers cannot distinguish "expired" from "never
//! issued".

pub mod cli;
pub mod keys;
pub mod nectar;
pub mod session;
pub mod token;
