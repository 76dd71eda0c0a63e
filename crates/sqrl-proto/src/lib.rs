//! # sqrl-proto
//!
//! Wire-protocol types for the SQRL service provider subsystem.
//!
//! A `/cli.sqrl` exchange is a form-encoded POST carrying three base64-SQRL
//! fields (`client`, `server`, and the `ids` signature, plus optional `pids`
//! and `urs`); the reply is a single base64-SQRL key=value block. This crate
//! owns both directions:
//!
//! - [`client`] — the inner client body: version set, command, option flags
//! - [`request`] — [`request::CliRequest`]: form parsing and signature checks
//! - [`response`] — [`response::CliResponse`]: the reply encoder and [`response::Ask`]
//! - [`tif`] — the Transaction Information Flags bitfield
//! - [`identity`] — the persisted [`identity::SqrlIdentity`] record
//!
//! Parsed request material is sensitive (identity keys, unlock keys,
//! signatures); every type here exposes a `clear()` that zeroizes it in
//! place once the exchange is finished.

pub mod client;
pub mod identity;
pub mod request;
pub mod response;
pub mod tif;

pub use client::{ClientBody, Command, Options, VersionSet};
pub use identity::SqrlIdentity;
pub use request::CliRequest;
pub use response::{Ask, CliResponse};
pub use tif::Tif;

/// Error types for protocol parsing and verification.
///
/// Every variant maps onto the client-failure TIF bit at the engine layer;
/// the distinctions exist for logging.
#[derive(Debug, thiserror::Error)]
pub enum ProtoError {
    /// A required form or body field was absent.
    #[error("missing field: {0}")]
    MissingField(&'static str),

    /// A field was present but structurally invalid.
    #[error("malformed {field}: {detail}")]
    Malformed {
        /// The offending field name.
        field: &'static str,
        /// What was wrong with it.
        detail: String,
    },

    /// The protocol version list could not be parsed.
    #[error("invalid version specification: {0}")]
    Version(String),

    /// A signature did not verify, or key/signature material was undecodable.
    #[error("cryptographic failure: {0}")]
    Crypto(#[from] sqrl_crypto::CryptoError),
}

pub type Result<T> = std::result::Result<T, ProtoError>;
