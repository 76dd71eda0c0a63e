//! Base64-SQRL codec.
//!
//! SQRL encodes every on-wire field — keys, signatures, nuts, and the
//! key=value blocks themselves — with the URL-safe base64 alphabet and no
//! padding. Round-trip law: `decode(encode(x)) == x` for all byte strings.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;

use crate::{CryptoError, Result};

/// Encode bytes as base64-SQRL.
pub fn encode(data: impl AsRef<[u8]>) -> String {
    URL_SAFE_NO_PAD.encode(data)
}

/// Decode a base64-SQRL string back into bytes.
pub fn decode(data: impl AsRef<[u8]>) -> Result<Vec<u8>> {
    URL_SAFE_NO_PAD
        .decode(data)
        .map_err(|e| CryptoError::Decode(e.to_string()))
}

/// Decode a base64-SQRL string into a fixed-size array.
///
/// Used for the 32-byte public keys and 64-byte signatures on the wire.
pub fn decode_array<const N: usize>(data: impl AsRef<[u8]>) -> Result<[u8; N]> {
    let bytes = decode(data)?;
    let len = bytes.len();
    bytes
        .try_into()
        .map_err(|_| CryptoError::InvalidInput(format!("expected {N} bytes, got {len}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip() {
        let data = b"test data for sqrl64 encoding";
        let encoded = encode(data);
        let decoded = decode(&encoded).expect("decode");
        assert_eq!(decoded, data);
    }

    #[test]
    fn test_no_padding() {
        // 16 bytes encode to 22 characters without trailing '='.
        let encoded = encode([0u8; 16]);
        assert_eq!(encoded.len(), 22);
        assert!(!encoded.contains('='));
    }

    #[test]
    fn test_url_safe_alphabet() {
        let encoded = encode([0xfb, 0xff, 0xbf]);
        assert!(!encoded.contains('+'));
        assert!(!encoded.contains('/'));
    }

    #[test]
    fn test_empty_roundtrip() {
        assert_eq!(encode([]), "");
        assert!(decode("").expect("decode").is_empty());
    }

    #[test]
    fn test_all_byte_values_roundtrip() {
        let data: Vec<u8> = (0u8..=255).collect();
        let decoded = decode(encode(&data)).expect("decode");
        assert_eq!(decoded, data);
    }

    #[test]
    fn test_decode_rejects_standard_alphabet() {
        assert!(decode("a+b/").is_err());
    }

    #[test]
    fn test_decode_array_size_mismatch() {
        let encoded = encode([0u8; 16]);
        assert!(decode_array::<32>(&encoded).is_err());
        assert!(decode_array::<16>(&encoded).is_ok());
    }
}
