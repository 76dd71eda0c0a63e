//! The cli protocol state machine.
//!
//! [`SqrlEngine`] owns one login flow end to end: it mints the nut pair for
//! a new session, runs every `/cli.sqrl` exchange, and answers the browser
//! poll. Collaborators — the nut source, the hoard, the identity store, and
//! the host [`Authenticator`] — are injected at construction.
//!
//! The validation order inside [`SqrlEngine::handle_cli`] is load-bearing:
//! the nut is consumed before anything else (a malformed request still burns
//! its nut), signatures are checked before any state is read, and the
//! continuity checks run before any command dispatch. Errors never surface
//! as HTTP failures here; they become TIF bits in a normal response so the
//! client can read its next nut and continue.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use zeroize::Zeroize;

use sqrl_crypto::{Nut, Tree};
use sqrl_proto::{CliRequest, CliResponse, Command, SqrlIdentity, Tif};
use sqrl_store::{AuthStore, Hoard, HoardCache, SessionState, StoreError};

use crate::authenticator::Authenticator;
use crate::seclog;

/// Tunables for an engine instance.
#[derive(Clone, Debug)]
pub struct EngineSettings {
    /// TTL for hoard entries carrying a cli nut.
    pub nut_expiration: Duration,
    /// TTL for the pag entry.
    pub pag_expiration: Duration,
    /// URL prefix the endpoints are mounted under.
    pub root_path: String,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            nut_expiration: Duration::from_secs(600),
            pag_expiration: Duration::from_secs(600),
            root_path: String::new(),
        }
    }
}

/// A freshly minted session: the cli nut, its pag sibling, and the TTL the
/// browser should poll within.
#[derive(Clone, Debug)]
pub struct Session {
    /// Nut for the SQRL client (rotated on every cli exchange).
    pub nut: Nut,
    /// Nut for the browser poll channel (stable for the flow).
    pub pag: Nut,
    /// Expiration in seconds.
    pub exp: u64,
}

/// The SSP protocol engine.
pub struct SqrlEngine {
    tree: Arc<dyn Tree>,
    hoard: Arc<dyn Hoard>,
    auth_store: Arc<dyn AuthStore>,
    authenticator: Arc<dyn Authenticator>,
    settings: EngineSettings,
}

impl SqrlEngine {
    /// Assemble an engine from its collaborators.
    pub fn new(
        tree: Arc<dyn Tree>,
        hoard: Arc<dyn Hoard>,
        auth_store: Arc<dyn AuthStore>,
        authenticator: Arc<dyn Authenticator>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            tree,
            hoard,
            auth_store,
            authenticator,
            settings,
        }
    }

    /// The nut TTL in whole seconds (the `exp` wire field).
    pub fn nut_expiration_seconds(&self) -> u64 {
        self.settings.nut_expiration.as_secs()
    }

    /// The server-relative cli URL for a nut.
    pub fn qry(&self, nut: &Nut) -> String {
        format!("{}/cli.sqrl?nut={}", self.settings.root_path, nut)
    }

    /// The full sqrl:// login URL for a nut, as carried by the QR code.
    pub fn sqrl_url(&self, host: &str, nut: &Nut) -> String {
        format!("sqrl://{host}{}/cli.sqrl?nut={nut}", self.settings.root_path)
    }

    /// Start a login flow: mint the cli/pag nut pair and seed the hoard.
    pub fn new_session(&self, remote_ip: &str) -> sqrl_store::Result<Session> {
        let nut = self.tree.nut();
        let pag = self.tree.nut();

        let cache = HoardCache {
            state: SessionState::Issued,
            remote_ip: remote_ip.to_string(),
            original_nut: nut.clone(),
            pag_nut: pag.clone(),
            ..Default::default()
        };
        self.hoard
            .save(&nut, cache.clone(), self.settings.nut_expiration)?;
        self.hoard.save(&pag, cache, self.settings.pag_expiration)?;

        Ok(Session {
            nut,
            pag,
            exp: self.nut_expiration_seconds(),
        })
    }

    /// Read a nut's session entry without consuming it (the `/png.sqrl`
    /// existence check).
    pub fn lookup_nut(&self, nut: &Nut) -> sqrl_store::Result<HoardCache> {
        self.hoard.get(nut)
    }

    /// The browser poll: `Ok(Some(url))` once the paired cli nut completed
    /// an authentication, `Ok(None)` while pending, `NotFound` for unknown
    /// or expired sessions.
    ///
    /// Delivering the URL consumes the pag entry.
    pub fn poll_pag(&self, nut: &str, pag: &str) -> sqrl_store::Result<Option<String>> {
        let pag: Nut = pag.into();
        let cache = self.hoard.get(&pag)?;
        if cache.original_nut.as_str() != nut {
            return Err(StoreError::NotFound);
        }
        if cache.state != SessionState::Authenticated {
            return Ok(None);
        }

        let mut cache = self.hoard.get_and_delete(&pag)?;
        let url = cache.auth_url.take().unwrap_or_default();
        cache.clear();
        Ok(Some(url))
    }

    /// Run one `/cli.sqrl` exchange and return the encoded response body.
    ///
    /// Always yields a well-formed response; failures are TIF bits.
    pub fn handle_cli(
        &self,
        nut_param: Option<&str>,
        params: &HashMap<String, String>,
        remote_ip: &str,
    ) -> Vec<u8> {
        let nut: Nut = match nut_param {
            Some(n) if !n.is_empty() => n.into(),
            _ => {
                tracing::info!("cli request without nut");
                let mut response = CliResponse::default();
                response.tif |= Tif::CLIENT_FAILURE;
                return response.encode();
            }
        };

        let mut response = CliResponse::new(nut.clone(), self.qry(&nut));

        // The nut is consumed whether or not the request turns out valid.
        let mut cache = match self.hoard.get_and_delete(&nut) {
            Ok(cache) => cache,
            Err(StoreError::NotFound) => {
                tracing::info!(
                    "nut {}... not found",
                    seclog::truncate_key(nut.as_str(), 8)
                );
                response.tif |= Tif::CLIENT_FAILURE | Tif::COMMAND_FAILED;
                seclog::log_response(&response);
                return response.encode();
            }
            Err(err) => {
                seclog::log_error("nut_lookup", &err);
                response.tif |= Tif::TRANSIENT_ERROR | Tif::COMMAND_FAILED;
                seclog::log_response(&response);
                return response.encode();
            }
        };

        let mut request = match CliRequest::from_params(params, remote_ip.to_string()) {
            Ok(request) => request,
            Err(err) => {
                seclog::log_error("parse_request", &err);
                response.tif |= Tif::CLIENT_FAILURE | Tif::COMMAND_FAILED;
                // The nut is already burned; answer under a fresh one so the
                // session stays continuable.
                self.rotate(&mut response);
                let bytes = self.write_response(None, &mut response, &cache);
                cache.clear();
                return bytes;
            }
        };
        seclog::log_request(&request);

        let rotated = self.process(&mut request, &mut response, &cache);
        if !rotated {
            self.rotate(&mut response);
        }

        let bytes = self.write_response(Some(&request), &mut response, &cache);
        request.clear();
        cache.clear();
        bytes
    }

    /// Swap the response onto a freshly minted nut.
    fn rotate(&self, response: &mut CliResponse) {
        let nut = self.tree.nut();
        response.qry = self.qry(&nut);
        response.nut = nut;
    }

    /// Encode the response and store the fresh nut's session entry. The
    /// stored bytes are what the next request's `server` field must echo.
    fn write_response(
        &self,
        request: Option<&CliRequest>,
        response: &mut CliResponse,
        cache: &HoardCache,
    ) -> Vec<u8> {
        let mut bytes = response.encode();

        let entry = HoardCache {
            state: SessionState::Associated,
            remote_ip: cache.remote_ip.clone(),
            original_nut: cache.original_nut.clone(),
            pag_nut: cache.pag_nut.clone(),
            last_request: request.cloned(),
            last_response: Some(bytes.clone()),
            identity: None,
            auth_url: None,
        };
        if let Err(err) = self
            .hoard
            .save(&response.nut, entry, self.settings.nut_expiration)
        {
            seclog::log_error("hoard_save", &err);
            response.tif |= Tif::COMMAND_FAILED;
            bytes.zeroize();
            bytes = response.encode();
        }

        seclog::log_response(response);
        bytes
    }

    /// Steps 3-11 of the exchange: continuity checks, command dispatch, and
    /// completion. Returns whether the response nut has been rotated.
    fn process(
        &self,
        request: &mut CliRequest,
        response: &mut CliResponse,
        cache: &HoardCache,
    ) -> bool {
        // Continuity: the request must echo our previous response exactly.
        if let Some(last_response) = &cache.last_response {
            if !request.validate_last_response(last_response) {
                tracing::warn!("last response validation failed");
                response.tif |= Tif::COMMAND_FAILED;
                return false;
            }
        }

        // Continuity: same IP as at nut issuance, unless waived.
        if cache.remote_ip != request.ip {
            if !request.client.opt.noiptest {
                tracing::info!(
                    "rejecting on IP mismatch orig: {} current: {}",
                    seclog::mask_ip(&cache.remote_ip),
                    seclog::mask_ip(&request.ip)
                );
                response.tif |= Tif::COMMAND_FAILED;
                return false;
            }
        } else {
            response.tif |= Tif::IP_MATCH;
        }

        // Continuity: one identity per session.
        if let Some(last_request) = &cache.last_request {
            if last_request.client.idk != request.client.idk {
                tracing::info!(
                    "identity mismatch orig: {}... current: {}...",
                    seclog::truncate_key(&last_request.client.idk, 8),
                    seclog::truncate_key(&request.client.idk, 8)
                );
                response.tif |=
                    Tif::COMMAND_FAILED | Tif::CLIENT_FAILURE | Tif::BAD_ID_ASSOCIATION;
                return false;
            }
        }

        if !request.client.cmd.is_supported() {
            tracing::warn!(
                "unknown command: {}",
                seclog::sanitize_for_log(request.client.cmd.as_str())
            );
            response.tif |= Tif::FUNCTION_NOT_SUPPORTED;
            return false;
        }

        // Give the host a chance to prompt before the client commits.
        if request.client.cmd == Command::Query {
            let mut tentative = request.identity();
            tentative.btn = -1;
            response.ask = self.authenticator.ask_response(&tentative);
        }

        // Every response from here carries a fresh nut.
        self.rotate(response);

        let mut identity = match self.auth_store.find_identity(&request.client.idk) {
            Ok(identity) => Some(identity),
            Err(StoreError::NotFound) => None,
            Err(err) => {
                seclog::log_error("identity_lookup", &err);
                response.tif |= Tif::COMMAND_FAILED;
                return true;
            }
        };

        let previous = match self.check_previous_identity(request, response) {
            Ok(previous) => previous,
            Err(()) => return true,
        };

        if let Some(identity) = identity.as_mut() {
            if self.known_identity(request, response, identity).is_err() {
                return true;
            }
        } else if request.client.cmd == Command::Ident {
            let new_identity = request.identity();
            if let Some(previous) = &previous {
                if let Err(err) = self.authenticator.swap_identities(previous, &new_identity) {
                    seclog::log_error("identity_swap", &err);
                    response.tif |= Tif::COMMAND_FAILED;
                    return true;
                }
                seclog::log_auth("identity_swap", &new_identity.idk, true);
                response.tif.remove(Tif::PREVIOUS_ID_MATCH);
            }
            response.tif |= Tif::ID_MATCH;
            identity = Some(new_identity);
        }

        self.set_suk(request, response, identity.as_ref(), previous.as_ref());
        self.finish(request, response, identity.as_ref(), cache);
        true
    }

    /// Look up the previous identity named by `pidk`, setting the
    /// previous-ID-match TIF and forcing the suk return on a hit.
    fn check_previous_identity(
        &self,
        request: &mut CliRequest,
        response: &mut CliResponse,
    ) -> Result<Option<SqrlIdentity>, ()> {
        if request.client.pidk.is_empty() {
            return Ok(None);
        }
        let previous = match self.auth_store.find_identity(&request.client.pidk) {
            Ok(previous) => Some(previous),
            Err(StoreError::NotFound) => None,
            Err(err) => {
                seclog::log_error("lookup_previous_identity", &err);
                response.tif |= Tif::COMMAND_FAILED;
                return Err(());
            }
        };
        if previous.is_some() {
            response.tif |= Tif::PREVIOUS_ID_MATCH;
            // The client needs the unlock key to complete a rekey.
            request.client.opt.suk = true;
        }
        Ok(previous)
    }

    /// Dispatch a command against an identity we already know.
    fn known_identity(
        &self,
        request: &mut CliRequest,
        response: &mut CliResponse,
        identity: &mut SqrlIdentity,
    ) -> Result<(), ()> {
        if identity.is_rekeyed() {
            response.tif |= Tif::IDENTITY_SUPERSEDED;
            seclog::log_auth("rekeyed_attempt", &identity.idk, false);
            if request.client.cmd != Command::Query {
                response.tif |= Tif::COMMAND_FAILED;
            }
            return Err(());
        }
        response.tif |= Tif::ID_MATCH;

        identity.btn = request.client.btn;
        let mut changed = false;
        if request.is_auth_command() {
            changed = request.update_identity(identity);
        }

        if matches!(request.client.cmd, Command::Enable | Command::Remove) {
            if let Err(err) = request.verify_urs(&identity.vuk) {
                seclog::log_error("urs_validation", &err);
                if identity.disabled {
                    response.tif |= Tif::SQRL_DISABLED;
                }
                response.tif |= Tif::CLIENT_FAILURE | Tif::COMMAND_FAILED;
                return Err(());
            }
            match request.client.cmd {
                Command::Enable => {
                    seclog::log_auth("enable_account", &identity.idk, true);
                    identity.disabled = false;
                    changed = true;
                }
                Command::Remove => {
                    if let Err(err) = self.authenticator.remove_identity(identity) {
                        seclog::log_error("remove_identity", &err);
                        response.tif |= Tif::CLIENT_FAILURE | Tif::COMMAND_FAILED;
                        return Err(());
                    }
                    if let Err(err) = self.auth_store.delete_identity(&identity.idk) {
                        seclog::log_error("delete_identity", &err);
                        response.tif |= Tif::CLIENT_FAILURE | Tif::COMMAND_FAILED;
                        return Err(());
                    }
                    response.tif.remove(Tif::ID_MATCH);
                    seclog::log_auth("remove_identity", &identity.idk, true);
                }
                _ => {}
            }
        }

        if request.client.cmd == Command::Disable {
            identity.disabled = true;
            changed = true;
        }

        if identity.disabled {
            request.client.opt.suk = true;
            response.tif |= Tif::SQRL_DISABLED;
        }

        if changed {
            if let Err(err) = self.auth_store.save_identity(identity) {
                seclog::log_error("save_identity", &err);
                response.tif |= Tif::CLIENT_FAILURE | Tif::COMMAND_FAILED;
                return Err(());
            }
        }
        Ok(())
    }

    /// Attach the server-unlock key when the client asked for it (or the
    /// protocol forced the ask).
    fn set_suk(
        &self,
        request: &CliRequest,
        response: &mut CliResponse,
        identity: Option<&SqrlIdentity>,
        previous: Option<&SqrlIdentity>,
    ) {
        if !request.client.opt.suk {
            return;
        }
        if let Some(identity) = identity {
            if !identity.suk.is_empty() {
                response.suk = Some(identity.suk.clone());
            }
        } else if let Some(previous) = previous {
            // Mid-rekey: the client only holds the unlock material for the
            // identity it is superseding.
            if !previous.suk.is_empty() {
                response.suk = Some(previous.suk.clone());
            }
        } else if request.client.cmd == Command::Ident && !request.client.suk.is_empty() {
            response.suk = Some(request.client.suk.clone());
        }
    }

    /// Completion: authenticate, hand the redirect to the right channel, and
    /// mark the pag entry.
    fn finish(
        &self,
        request: &CliRequest,
        response: &mut CliResponse,
        identity: Option<&SqrlIdentity>,
        cache: &HoardCache,
    ) {
        let disabled = identity.map(|i| i.disabled).unwrap_or(false);

        if request.is_auth_command() && !disabled {
            let Some(identity) = identity else {
                // enable against an unknown identity cannot authenticate.
                response.tif |= Tif::COMMAND_FAILED;
                return;
            };

            if let Err(err) = self.auth_store.save_identity(identity) {
                seclog::log_error("save_identity", &err);
                response.tif |= Tif::COMMAND_FAILED;
                return;
            }

            seclog::log_auth("authenticate", &identity.idk, true);
            let auth_url = self.authenticator.authenticate_identity(identity);

            if request.client.opt.cps {
                // The client opens the redirect itself.
                response.url = Some(auth_url);
            } else {
                let entry = HoardCache {
                    state: SessionState::Authenticated,
                    remote_ip: cache.remote_ip.clone(),
                    original_nut: cache.original_nut.clone(),
                    pag_nut: cache.pag_nut.clone(),
                    last_request: Some(request.clone()),
                    last_response: None,
                    identity: Some(identity.clone()),
                    auth_url: Some(auth_url),
                };
                if let Err(err) =
                    self.hoard
                        .save(&cache.pag_nut, entry, self.settings.pag_expiration)
                {
                    seclog::log_error("hoard_save_pagnut", &err);
                    response.tif |= Tif::COMMAND_FAILED;
                } else {
                    tracing::info!(
                        "saved pagnut {}... in hoard",
                        seclog::truncate_key(cache.pag_nut.as_str(), 8)
                    );
                }
            }
        }

        if request.client.cmd == Command::Ident && disabled {
            response.tif |= Tif::COMMAND_FAILED;
        }
    }
}
