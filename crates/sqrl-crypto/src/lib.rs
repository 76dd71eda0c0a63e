//! # sqrl-crypto
//!
//! Cryptographic primitives for the SQRL service provider subsystem.
//!
//! This crate implements the low-level building blocks every SQRL exchange
//! rests on:
//!
//! - [`sqrl64`] — URL-safe, unpadded base64 ("base64-SQRL") used for every
//!   on-wire field
//! - [`tree`] — nut minting: unique, unforgeable single-use tokens from an
//!   AES-encrypted monotonic counter
//! - [`ed25519`] — Ed25519 signature verification (RFC 8032) for the `ids`,
//!   `pids`, and `urs` request signatures

pub mod ed25519;
pub mod sqrl64;
pub mod tree;

pub use tree::{GrcTree, Nut, RandomTree, Tree};

/// Error types for cryptographic operations.
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    /// Ed25519 signature verification failed.
    #[error("signature verification failed")]
    SignatureVerification,

    /// A key had the wrong length for its algorithm.
    #[error("invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength {
        /// The length the algorithm requires.
        expected: &'static str,
        /// The length that was supplied.
        actual: usize,
    },

    /// Base64-SQRL decoding failed.
    #[error("base64 decode error: {0}")]
    Decode(String),

    /// Input bytes were structurally invalid (wrong size, bad point, ...).
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

pub type Result<T> = std::result::Result<T, CryptoError>;
