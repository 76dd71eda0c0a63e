//! # sqrl-store
//!
//! Storage seams for the SQRL service provider:
//!
//! - [`Hoard`] — an expiring map from nut to per-session state
//!   ([`HoardCache`]), the rendezvous between the SQRL client's cli
//!   exchanges and the browser's poll channel
//! - [`AuthStore`] — the persistent identity registry, addressed by `idk`
//!
//! Both are small behavior traits so backends stay pluggable; the in-memory
//! implementations ([`MemoryHoard`], [`MemoryAuthStore`]) are the defaults
//! and the test doubles. The hoard is ephemeral by design: nothing in it
//! survives past its TTL.

mod auth;
mod hoard;

use std::time::Duration;

use zeroize::Zeroize;

use sqrl_crypto::Nut;
use sqrl_proto::{CliRequest, SqrlIdentity};

pub use auth::MemoryAuthStore;
pub use hoard::MemoryHoard;

/// Error types for store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No live entry under that key.
    #[error("not found")]
    NotFound,

    /// The backend failed; the caller may retry.
    #[error("store backend error: {0}")]
    Backend(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Where a session stands.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    /// The nut pair has been minted; no client has spoken yet.
    Issued,
    /// At least one cli exchange has happened under this session.
    Associated,
    /// Authentication completed; the pag entry carries the redirect.
    Authenticated,
}

/// Per-nut session state.
///
/// Two nuts are minted in lock-step at flow start: the cli nut (rotated on
/// every exchange) and the pag nut (stable, polled by the browser). Both
/// entries share `original_nut` and `pag_nut` so either side can find the
/// other. Everything is stored by owned value; entries never borrow from
/// the requests they were derived from.
#[derive(Clone, Debug, Default)]
pub struct HoardCache {
    /// Session progress marker.
    pub state: SessionState,
    /// The IP the session's first nut was issued to.
    pub remote_ip: String,
    /// The nut that started the flow; stable session identifier.
    pub original_nut: Nut,
    /// The browser-poll nut minted alongside `original_nut`.
    pub pag_nut: Nut,
    /// The previous cli request in this session, for idk continuity.
    pub last_request: Option<CliRequest>,
    /// The previous response bytes, for the `server` echo check.
    pub last_response: Option<Vec<u8>>,
    /// Identity snapshot, set once authenticated.
    pub identity: Option<SqrlIdentity>,
    /// Post-login redirect URL, set once authenticated.
    pub auth_url: Option<String>,
}

impl Default for SessionState {
    fn default() -> Self {
        SessionState::Issued
    }
}

impl HoardCache {
    /// Overwrite all sensitive material with zeros.
    pub fn clear(&mut self) {
        if let Some(request) = &mut self.last_request {
            request.clear();
        }
        self.last_request = None;
        if let Some(response) = &mut self.last_response {
            response.zeroize();
        }
        self.last_response = None;
        if let Some(identity) = &mut self.identity {
            identity.clear();
        }
        self.identity = None;
        if let Some(url) = &mut self.auth_url {
            url.zeroize();
        }
        self.auth_url = None;
        self.remote_ip.zeroize();
        self.state = SessionState::Issued;
        self.original_nut = Nut::default();
        self.pag_nut = Nut::default();
    }
}

/// The expiring nut-to-session map.
///
/// `get_and_delete` is the linearizable consumption primitive: of any number
/// of concurrent callers for the same nut, exactly one observes the entry.
pub trait Hoard: Send + Sync {
    /// Store `cache` under `nut` for at most `ttl`.
    fn save(&self, nut: &Nut, cache: HoardCache, ttl: Duration) -> Result<()>;

    /// Read an entry without consuming it.
    fn get(&self, nut: &Nut) -> Result<HoardCache>;

    /// Atomically read and remove an entry.
    fn get_and_delete(&self, nut: &Nut) -> Result<HoardCache>;
}

/// The persistent identity registry, addressed exclusively by `idk`.
pub trait AuthStore: Send + Sync {
    /// Look up an identity by its public key.
    fn find_identity(&self, idk: &str) -> Result<SqrlIdentity>;

    /// Insert or replace an identity.
    fn save_identity(&self, identity: &SqrlIdentity) -> Result<()>;

    /// Remove an identity.
    fn delete_identity(&self, idk: &str) -> Result<()>;
}
