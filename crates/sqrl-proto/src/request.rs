//! Parsing and verification of a `/cli.sqrl` POST.
//!
//! The form body carries `client`, `server`, `ids`, and optionally `pids`
//! and `urs`. The `server` field is the previous response (or the original
//! sqrl:// URL on first contact) and is kept opaque: the continuity check
//! compares it byte-for-byte against what this server last wrote. All three
//! signatures cover the same message, `client || server`, in their encoded
//! wire forms.

use std::collections::HashMap;

use zeroize::Zeroize;

use sqrl_crypto::ed25519;

use crate::client::ClientBody;
use crate::identity::SqrlIdentity;
use crate::{ProtoError, Result};

/// A parsed, signature-checked cli request.
///
/// Constructing one through [`CliRequest::from_params`] proves the `ids`
/// signature (and `pids`, when present). The `urs` signature can only be
/// checked later, against the verify-unlock key of the stored identity.
#[derive(Clone, Debug, Default)]
pub struct CliRequest {
    /// The raw base64-SQRL `client` field, as signed.
    pub client_encoded: String,
    /// The decoded client body.
    pub client: ClientBody,
    /// The opaque `server` echo field.
    pub server: String,
    /// Identity signature over `client || server`.
    pub ids: String,
    /// Previous-identity signature, present during rekey.
    pub pids: Option<String>,
    /// Unlock-request signature, present for `enable`/`remove`.
    pub urs: Option<String>,
    /// The IP the request arrived from.
    pub ip: String,
}

impl CliRequest {
    /// Parse a form-decoded body and verify its signatures.
    ///
    /// # Errors
    ///
    /// Any missing required field, undecodable payload, or failed `ids`/
    /// `pids` verification is an error; the engine maps them all onto the
    /// client-failure TIF bit.
    pub fn from_params(params: &HashMap<String, String>, ip: String) -> Result<Self> {
        let client_encoded = params
            .get("client")
            .ok_or(ProtoError::MissingField("client"))?
            .clone();
        let server = params
            .get("server")
            .ok_or(ProtoError::MissingField("server"))?
            .clone();
        let ids = params
            .get("ids")
            .ok_or(ProtoError::MissingField("ids"))?
            .clone();

        let client = ClientBody::decode(&client_encoded)?;

        let request = CliRequest {
            client_encoded,
            client,
            server,
            ids,
            pids: params.get("pids").cloned(),
            urs: params.get("urs").cloned(),
            ip,
        };

        let message = request.signing_string();
        ed25519::verify_encoded(&request.client.idk, &message, &request.ids)?;

        // A previous-identity claim is only as good as its signature; require
        // the pair together.
        match (&request.pids, request.client.pidk.is_empty()) {
            (Some(pids), false) => {
                ed25519::verify_encoded(&request.client.pidk, &message, pids)?;
            }
            (Some(_), true) => return Err(ProtoError::MissingField("pidk")),
            (None, false) => return Err(ProtoError::MissingField("pids")),
            (None, true) => {}
        }

        Ok(request)
    }

    /// The message every request signature covers.
    pub fn signing_string(&self) -> Vec<u8> {
        let mut message = Vec::with_capacity(self.client_encoded.len() + self.server.len());
        message.extend_from_slice(self.client_encoded.as_bytes());
        message.extend_from_slice(self.server.as_bytes());
        message
    }

    /// Verify the unlock-request signature against a stored verify-unlock
    /// key.
    pub fn verify_urs(&self, vuk: &str) -> Result<()> {
        let urs = self.urs.as_ref().ok_or(ProtoError::MissingField("urs"))?;
        ed25519::verify_encoded(vuk, &self.signing_string(), urs)?;
        Ok(())
    }

    /// True for commands that complete an authentication.
    pub fn is_auth_command(&self) -> bool {
        self.client.cmd.is_auth()
    }

    /// Continuity check: does the `server` echo equal the response this
    /// server previously wrote for the session, byte-for-byte?
    pub fn validate_last_response(&self, last_response: &[u8]) -> bool {
        self.server.as_bytes() == last_response
    }

    /// Build the tentative identity this request describes.
    pub fn identity(&self) -> SqrlIdentity {
        SqrlIdentity {
            idk: self.client.idk.clone(),
            suk: self.client.suk.clone(),
            vuk: self.client.vuk.clone(),
            pidk: self.client.pidk.clone(),
            sqrl_only: self.client.opt.sqrlonly,
            hardlock: self.client.opt.hardlock,
            disabled: false,
            rekeyed: String::new(),
            btn: self.client.btn,
        }
    }

    /// Merge the request's policy flags into a known identity.
    ///
    /// Returns `true` iff a flag actually changed, so the caller knows
    /// whether the identity needs persisting.
    pub fn update_identity(&self, identity: &mut SqrlIdentity) -> bool {
        let changed = identity.sqrl_only != self.client.opt.sqrlonly
            || identity.hardlock != self.client.opt.hardlock;
        identity.sqrl_only = self.client.opt.sqrlonly;
        identity.hardlock = self.client.opt.hardlock;
        changed
    }

    /// Overwrite every sensitive field with zeros.
    pub fn clear(&mut self) {
        self.client_encoded.zeroize();
        self.server.zeroize();
        self.ids.zeroize();
        if let Some(pids) = &mut self.pids {
            pids.zeroize();
        }
        self.pids = None;
        if let Some(urs) = &mut self.urs {
            urs.zeroize();
        }
        self.urs = None;
        self.ip.zeroize();
        self.client.clear();
    }
}
