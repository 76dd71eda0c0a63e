//! Nut minting.
//!
//! A nut is the single-use token carried in every SQRL URL and every `/cli`
//! exchange. The production source ([`GrcTree`]) encrypts a monotonically
//! increasing 64-bit counter under AES, which makes every nut distinct and
//! unpredictable to anyone without the key. [`RandomTree`] is a test-only
//! source that returns crypto-random bytes instead.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use aes::cipher::{BlockEncrypt, KeyInit};
use aes::{Aes128, Aes192, Aes256};
use zeroize::Zeroize;

use crate::{sqrl64, CryptoError, Result};

/// An opaque single-use token: 22 base64-SQRL characters over 16 bytes.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Nut(String);

impl Nut {
    /// View the nut as its wire string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume the nut, yielding the wire string.
    pub fn into_string(self) -> String {
        self.0
    }

    /// True if the nut is the empty string.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Nut {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for Nut {
    fn from(s: String) -> Self {
        Nut(s)
    }
}

impl From<&str> for Nut {
    fn from(s: &str) -> Self {
        Nut(s.to_string())
    }
}

impl AsRef<str> for Nut {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A source of nuts.
///
/// Implementations must return a distinct token on every call; `nut()` is
/// infallible once the source has been constructed.
pub trait Tree: Send + Sync {
    /// Mint the next nut.
    fn nut(&self) -> Nut;
}

/// AES key schedule for any of the three permitted key sizes.
enum AesCipher {
    Aes128(Aes128),
    Aes192(Aes192),
    Aes256(Aes256),
}

impl AesCipher {
    fn encrypt_block(&self, block: &mut aes::Block) {
        match self {
            AesCipher::Aes128(c) => c.encrypt_block(block),
            AesCipher::Aes192(c) => c.encrypt_block(block),
            AesCipher::Aes256(c) => c.encrypt_block(block),
        }
    }
}

/// Nut source per the GRC SSP construction: an atomically incremented 64-bit
/// counter, zero-padded to one AES block and encrypted under the site key.
///
/// The expanded key schedule is wiped from memory on drop (the `zeroize`
/// feature of the `aes` crate); [`GrcTree::close`] makes the wipe point
/// explicit at shutdown.
pub struct GrcTree {
    counter: AtomicU64,
    cipher: AesCipher,
}

impl GrcTree {
    /// Build a tree from an initial counter value and an AES key.
    ///
    /// `counter_init` supports reboot continuity: pass the last persisted
    /// counter value so restarted servers never re-mint an old nut. The key
    /// must be 16, 24, or 32 bytes (AES-128/192/256).
    pub fn new(counter_init: u64, aes_key: &[u8]) -> Result<Self> {
        let cipher = match aes_key.len() {
            16 => AesCipher::Aes128(
                Aes128::new_from_slice(aes_key)
                    .map_err(|e| CryptoError::InvalidInput(e.to_string()))?,
            ),
            24 => AesCipher::Aes192(
                Aes192::new_from_slice(aes_key)
                    .map_err(|e| CryptoError::InvalidInput(e.to_string()))?,
            ),
            32 => AesCipher::Aes256(
                Aes256::new_from_slice(aes_key)
                    .map_err(|e| CryptoError::InvalidInput(e.to_string()))?,
            ),
            n => {
                return Err(CryptoError::InvalidKeyLength {
                    expected: "16, 24, or 32 bytes",
                    actual: n,
                })
            }
        };
        Ok(Self {
            counter: AtomicU64::new(counter_init),
            cipher,
        })
    }

    /// The current counter value.
    ///
    /// Operators that persist this across restarts can seed the next process
    /// via `counter_init` and keep the monotonicity guarantee.
    pub fn counter(&self) -> u64 {
        self.counter.load(Ordering::SeqCst)
    }

    /// Wipe the key schedule.
    pub fn close(self) {
        drop(self);
    }
}

impl Tree for GrcTree {
    fn nut(&self) -> Nut {
        let next = self.counter.fetch_add(1, Ordering::SeqCst) + 1;

        let mut block = aes::Block::default();
        block[..8].copy_from_slice(&next.to_le_bytes());
        self.cipher.encrypt_block(&mut block);

        let nut = Nut(sqrl64::encode(&block));
        block.as_mut_slice().zeroize();
        nut
    }
}

/// Test-only nut source returning `len` crypto-random bytes per nut.
pub struct RandomTree {
    len: usize,
}

impl RandomTree {
    /// A tree minting nuts of `len` random bytes.
    pub fn new(len: usize) -> Self {
        Self { len }
    }
}

impl Default for RandomTree {
    fn default() -> Self {
        // Same nut width as the AES tree.
        Self::new(16)
    }
}

impl Tree for RandomTree {
    fn nut(&self) -> Nut {
        let mut bytes = vec![0u8; self.len];
        rand::RngCore::fill_bytes(&mut rand::rngs::OsRng, &mut bytes);
        let nut = Nut(sqrl64::encode(&bytes));
        bytes.zeroize();
        nut
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    const TEST_KEY: [u8; 16] = [1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16];

    #[test]
    fn test_static_generate() {
        let tree = GrcTree::new(10, &TEST_KEY).expect("create tree");
        let nut = tree.nut();

        // One AES block, base64-SQRL encoded, is always 22 characters.
        assert_eq!(nut.as_str().len(), 22);
        // Known ciphertext for counter value 11 under this key.
        assert_eq!(nut.as_str(), "oHEbbCFEu0nMdJORt8kAyw");
    }

    #[test]
    fn test_unique_generate() {
        let tree = GrcTree::new(9, &TEST_KEY).expect("create tree");
        let mut seen = HashSet::new();
        for _ in 0..100 {
            assert!(seen.insert(tree.nut()), "duplicate nut");
        }
    }

    #[test]
    fn test_counter_advances() {
        let tree = GrcTree::new(5, &TEST_KEY).expect("create tree");
        tree.nut();
        tree.nut();
        assert_eq!(tree.counter(), 7);
    }

    #[test]
    fn test_invalid_key_sizes() {
        for len in [0usize, 4, 5, 15, 17, 33] {
            assert!(GrcTree::new(0, &vec![0u8; len]).is_err(), "len {len}");
        }
    }

    #[test]
    fn test_valid_key_sizes() {
        for len in [16usize, 24, 32] {
            let tree = GrcTree::new(0, &vec![0u8; len]).expect("create tree");
            tree.close();
        }
    }

    #[test]
    fn test_different_keys_different_nuts() {
        let tree1 = GrcTree::new(0, &TEST_KEY).expect("create tree");
        let tree2 = GrcTree::new(0, &[0x42u8; 16]).expect("create tree");
        assert_ne!(tree1.nut(), tree2.nut());
    }

    #[test]
    fn test_random_tree_length() {
        let tree = RandomTree::default();
        assert_eq!(tree.nut().as_str().len(), 22);

        let short = RandomTree::new(8);
        // 8 bytes encode to 11 base64 characters.
        assert_eq!(short.nut().as_str().len(), 11);
    }

    #[test]
    fn test_random_tree_unique() {
        let tree = RandomTree::default();
        let mut seen = HashSet::new();
        for _ in 0..100 {
            assert!(seen.insert(tree.nut()), "duplicate nut");
        }
    }
}
