//! Ed25519 signature verification (RFC 8032).
//!
//! The SSP only ever verifies: `ids` under the identity key, `pids` under the
//! previous identity key, and `urs` under the verify-unlock key. Keys and
//! signatures arrive base64-SQRL encoded; this module wraps `ed25519-dalek`
//! with decode-and-verify helpers over that wire form.

use ed25519_dalek::{Signature, Verifier, VerifyingKey};

use crate::{sqrl64, CryptoError, Result};

/// Verify `signature` over `message` under `public_key`.
pub fn verify(public_key: &[u8; 32], message: &[u8], signature: &[u8; 64]) -> Result<()> {
    let key = VerifyingKey::from_bytes(public_key)
        .map_err(|e| CryptoError::InvalidInput(e.to_string()))?;
    let sig = Signature::from_bytes(signature);
    key.verify(message, &sig)
        .map_err(|_| CryptoError::SignatureVerification)
}

/// Verify a base64-SQRL encoded signature under a base64-SQRL encoded key.
///
/// This is the form everything takes on the wire: 32-byte keys and 64-byte
/// signatures, both unpadded URL-safe base64.
pub fn verify_encoded(public_key: &str, message: &[u8], signature: &str) -> Result<()> {
    let key: [u8; 32] = sqrl64::decode_array(public_key)?;
    let sig: [u8; 64] = sqrl64::decode_array(signature)?;
    verify(&key, message, &sig)
}

#[cfg(test)]
mod tests {
    use ed25519_dalek::{Signer, SigningKey};

    use super::*;

    fn keypair() -> SigningKey {
        SigningKey::generate(&mut rand::rngs::OsRng)
    }

    #[test]
    fn test_verify_roundtrip() {
        let sk = keypair();
        let msg = b"client-payload-server-payload";
        let sig = sk.sign(msg);
        verify(
            sk.verifying_key().as_bytes(),
            msg,
            &sig.to_bytes(),
        )
        .expect("verify");
    }

    #[test]
    fn test_wrong_message_fails() {
        let sk = keypair();
        let sig = sk.sign(b"correct message");
        assert!(verify(
            sk.verifying_key().as_bytes(),
            b"wrong message",
            &sig.to_bytes()
        )
        .is_err());
    }

    #[test]
    fn test_wrong_key_fails() {
        let sk1 = keypair();
        let sk2 = keypair();
        let sig = sk1.sign(b"message");
        assert!(verify(sk2.verifying_key().as_bytes(), b"message", &sig.to_bytes()).is_err());
    }

    #[test]
    fn test_verify_encoded() {
        let sk = keypair();
        let msg = b"encoded wire form";
        let sig = sk.sign(msg);

        let key_b64 = sqrl64::encode(sk.verifying_key().as_bytes());
        let sig_b64 = sqrl64::encode(sig.to_bytes());
        verify_encoded(&key_b64, msg, &sig_b64).expect("verify");
    }

    #[test]
    fn test_verify_encoded_bad_lengths() {
        let sk = keypair();
        let sig = sk.sign(b"m");
        let sig_b64 = sqrl64::encode(sig.to_bytes());

        // Key of the wrong decoded length.
        assert!(verify_encoded(&sqrl64::encode([0u8; 16]), b"m", &sig_b64).is_err());
        // Signature of the wrong decoded length.
        let key_b64 = sqrl64::encode(sk.verifying_key().as_bytes());
        assert!(verify_encoded(&key_b64, b"m", &sqrl64::encode([0u8; 32])).is_err());
    }

    #[test]
    fn test_rfc8032_test_vector() {
        // RFC 8032 §7.1 test 1: empty message.
        let pk: [u8; 32] = hex::decode(
            "d75a980182b10ab7d54bfed3c964073a0ee172f3daa62325af021a68f707511a",
        )
        .expect("hex")
        .try_into()
        .expect("32 bytes");
        let sig: [u8; 64] = hex::decode(
            "e5564300c360ac729086e2cc806e828a84877f1eb8e5d974d873e06522490155\
             5fb8821590a33bacc61e39701cf9b46bd25bf5f0595bbe24655141438e7a100b",
        )
        .expect("hex")
        .try_into()
        .expect("64 bytes");

        verify(&pk, b"", &sig).expect("verify");
    }
}
