//! # sqrl-ssp
//!
//! The SQRL Service Provider Subsystem: everything a web site needs to offer
//! "scan to log in" with SQRL.
//!
//! The flow, per login: the browser fetches a nut pair from `/nut.sqrl`,
//! renders the QR code from `/png.sqrl`, and polls `/pag.sqrl`. The user's
//! SQRL client scans the code and talks to `/cli.sqrl`, rotating its nut on
//! every exchange; when an `ident` lands, the poll channel hands the browser
//! its redirect URL.
//!
//! - [`engine`] — the cli protocol state machine
//! - [`server`] — the four HTTP endpoints
//! - [`authenticator`] — the host-integration seam (account mapping)
//! - [`config`] — TOML configuration for the bundled binary
//! - [`seclog`] — redacting, injection-safe log helpers
//! - [`qr`] — QR code rasterization for `/png.sqrl`

pub mod authenticator;
pub mod config;
pub mod engine;
pub mod qr;
pub mod seclog;
pub mod server;

pub use authenticator::{Authenticator, HostError, RedirectAuthenticator};
pub use config::SspConfig;
pub use engine::{EngineSettings, Session, SqrlEngine};
pub use server::SspServer;

/// Error types for the server layer.
#[derive(Debug, thiserror::Error)]
pub enum SspError {
    /// QR code construction failed (payload too large for any version).
    #[error("QR encoding failed: {0}")]
    Qr(String),

    /// PNG serialization failed.
    #[error("PNG encoding failed: {0}")]
    Png(String),

    /// A store backend failed.
    #[error(transparent)]
    Store(#[from] sqrl_store::StoreError),

    /// The configuration file was unusable.
    #[error("invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, SspError>;
