//! The persisted SQRL identity record.

use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

/// A site-side SQRL identity, addressed by its public identity key.
///
/// One record per `idk` in the auth store. The unlock keys (`suk`, `vuk`)
/// arrive with the first `ident` and gate the `enable`/`remove` commands;
/// `pidk` records the key this identity superseded during a rekey.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SqrlIdentity {
    /// Ed25519 public identity key (base64-SQRL). Primary key in the store.
    pub idk: String,
    /// Server-unlock key, opaque to the server; returned to the client on
    /// demand.
    pub suk: String,
    /// Verify-unlock public key; authenticates `urs` signatures.
    pub vuk: String,
    /// Previous identity key recorded during a rekey transition.
    pub pidk: String,
    /// The user asked this site to accept only SQRL logins.
    pub sqrl_only: bool,
    /// The user asked this site to disable out-of-band account recovery.
    pub hardlock: bool,
    /// SQRL authentication is disabled until an `urs`-verified `enable`.
    pub disabled: bool,
    /// Non-empty once superseded by a rekey; holds the new idk. A rekeyed
    /// identity only answers `query`.
    pub rekeyed: String,
    /// Last ask-button selection (1 or 2), -1 when none. Transient.
    #[serde(default = "no_button")]
    pub btn: i32,
}

fn no_button() -> i32 {
    -1
}

impl SqrlIdentity {
    /// True once this identity has been superseded by a rekey.
    pub fn is_rekeyed(&self) -> bool {
        !self.rekeyed.is_empty()
    }

    /// Overwrite all key material with zeros.
    pub fn clear(&mut self) {
        self.idk.zeroize();
        self.suk.zeroize();
        self.vuk.zeroize();
        self.pidk.zeroize();
        self.rekeyed.zeroize();
        self.sqrl_only = false;
        self.hardlock = false;
        self.disabled = false;
        self.btn = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rekeyed_flag() {
        let mut identity = SqrlIdentity {
            idk: "test-idk".to_string(),
            ..Default::default()
        };
        assert!(!identity.is_rekeyed());
        identity.rekeyed = "new-idk".to_string();
        assert!(identity.is_rekeyed());
    }

    #[test]
    fn test_clear_wipes_keys() {
        let mut identity = SqrlIdentity {
            idk: "test-idk".to_string(),
            suk: "test-suk".to_string(),
            vuk: "test-vuk".to_string(),
            pidk: "test-pidk".to_string(),
            sqrl_only: true,
            hardlock: true,
            disabled: true,
            rekeyed: "next".to_string(),
            btn: 2,
        };
        identity.clear();
        assert!(identity.idk.is_empty());
        assert!(identity.suk.is_empty());
        assert!(identity.vuk.is_empty());
        assert!(identity.pidk.is_empty());
        assert!(identity.rekeyed.is_empty());
        assert!(!identity.sqrl_only);
        assert!(!identity.hardlock);
        assert!(!identity.disabled);
    }
}
