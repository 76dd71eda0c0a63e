//! The four HTTP endpoints.
//!
//! `/nut.sqrl` starts a flow, `/png.sqrl` renders its QR code, `/cli.sqrl`
//! is the SQRL client's protocol endpoint, `/pag.sqrl` is the browser poll.
//! Handlers are plain blocking functions; the surrounding `rouille` server
//! runs them on its thread pool, one request at a time per thread.
//!
//! Error policy: `/cli.sqrl` always answers 200 with TIF bits (the client
//! must be able to read its next nut); the other endpoints use ordinary
//! 4xx/5xx with short plain-text bodies.

use std::collections::HashMap;
use std::io::Read;
use std::sync::Arc;

use rouille::{Request, Response};
use serde::Serialize;
use url::form_urlencoded;
use zeroize::Zeroize;

use sqrl_store::StoreError;

use crate::engine::{Session, SqrlEngine};
use crate::{qr, seclog};

/// The HTTP front of a [`SqrlEngine`].
pub struct SspServer {
    engine: Arc<SqrlEngine>,
    root_path: String,
    host_override: String,
}

#[derive(Serialize)]
struct NutReply<'a> {
    nut: &'a str,
    pag: &'a str,
    exp: u64,
}

#[derive(Serialize)]
struct PagReply<'a> {
    url: &'a str,
}

impl SspServer {
    /// Wrap an engine. `root_path` must match the engine's setting;
    /// `host_override`, when non-empty, wins over every Host header.
    pub fn new(
        engine: Arc<SqrlEngine>,
        root_path: impl Into<String>,
        host_override: impl Into<String>,
    ) -> Self {
        Self {
            engine,
            root_path: root_path.into(),
            host_override: host_override.into(),
        }
    }

    /// Route one request.
    pub fn handle(&self, request: &Request) -> Response {
        let path = request.url();
        let Some(endpoint) = path.strip_prefix(self.root_path.as_str()) else {
            return Response::text("not found\n").with_status_code(404);
        };

        match (request.method(), endpoint) {
            ("GET", "/nut.sqrl") => self.nut(request),
            ("GET", "/png.sqrl") => self.png(request),
            ("POST", "/cli.sqrl") => self.cli(request),
            ("GET", "/pag.sqrl") => self.pag(request),
            ("POST", _) | ("GET", _) => Response::text("not found\n").with_status_code(404),
            _ => Response::text("method not allowed\n").with_status_code(405),
        }
    }

    /// The external host name, in priority order: operator override,
    /// `X-Forwarded-Host`, `X-Forwarded-Server`, the request Host.
    pub fn host(&self, request: &Request) -> String {
        if !self.host_override.is_empty() {
            return self.host_override.clone();
        }
        for header in ["X-Forwarded-Host", "X-Forwarded-Server"] {
            if let Some(value) = request.header(header) {
                if !value.is_empty() {
                    return value.to_string();
                }
            }
        }
        request.header("Host").unwrap_or_default().to_string()
    }

    /// The client IP: `X-Forwarded-For` when present, else the TCP peer.
    pub fn remote_ip(&self, request: &Request) -> String {
        match request.header("X-Forwarded-For") {
            Some(forwarded) if !forwarded.is_empty() => forwarded.to_string(),
            _ => request.remote_addr().to_string(),
        }
    }

    fn wants_json(request: &Request) -> bool {
        request
            .header("Accept")
            .map(|accept| accept.contains("application/json"))
            .unwrap_or(false)
    }

    /// `GET /nut.sqrl` — mint a session, answer form-encoded or JSON.
    fn nut(&self, request: &Request) -> Response {
        let session = match self.engine.new_session(&self.remote_ip(request)) {
            Ok(session) => session,
            Err(err) => return store_failure("nut_session", &err),
        };

        if Self::wants_json(request) {
            Response::json(&NutReply {
                nut: session.nut.as_str(),
                pag: session.pag.as_str(),
                exp: session.exp,
            })
        } else {
            let body = form_urlencoded::Serializer::new(String::new())
                .append_pair("nut", session.nut.as_str())
                .append_pair("pag", session.pag.as_str())
                .append_pair("exp", &session.exp.to_string())
                .finish();
            Response::from_data("application/x-www-form-urlencoded", body)
        }
    }

    /// `GET /png.sqrl` — the QR code. Without a `nut` parameter a whole new
    /// session is minted and reported via response headers.
    fn png(&self, request: &Request) -> Response {
        let host = self.host(request);

        match request.get_param("nut") {
            Some(nut) if !nut.is_empty() => {
                match self.engine.lookup_nut(&nut.as_str().into()) {
                    Ok(_) => {}
                    Err(StoreError::NotFound) => {
                        return Response::text("unknown nut\n").with_status_code(404)
                    }
                    Err(err) => return store_failure("png_lookup", &err),
                }
                self.render_qr(&host, &nut.as_str().into(), None)
            }
            _ => {
                let session = match self.engine.new_session(&self.remote_ip(request)) {
                    Ok(session) => session,
                    Err(err) => return store_failure("png_session", &err),
                };
                let nut = session.nut.clone();
                self.render_qr(&host, &nut, Some(session))
            }
        }
    }

    fn render_qr(
        &self,
        host: &str,
        nut: &sqrl_crypto::Nut,
        session: Option<Session>,
    ) -> Response {
        let payload = self.engine.sqrl_url(host, nut);
        let png = match qr::render_png(&payload) {
            Ok(png) => png,
            Err(err) => {
                seclog::log_error("qr_render", &err);
                return Response::text("QR rendering failed\n").with_status_code(500);
            }
        };

        let response = Response::from_data("image/png", png);
        match session {
            Some(session) => response
                .with_additional_header("Sqrl-Nut", session.nut.into_string())
                .with_additional_header("Sqrl-Pag", session.pag.into_string())
                .with_additional_header("Sqrl-Exp", session.exp.to_string()),
            None => response,
        }
    }

    /// `POST /cli.sqrl` — the protocol engine entry point. Always 200.
    fn cli(&self, request: &Request) -> Response {
        let mut body = Vec::new();
        if let Some(mut data) = request.data() {
            if data.read_to_end(&mut body).is_err() {
                body.zeroize();
                return Response::text("unreadable body\n").with_status_code(400);
            }
        }

        let mut params: HashMap<String, String> =
            form_urlencoded::parse(&body).into_owned().collect();
        let nut = request.get_param("nut");

        let reply = self
            .engine
            .handle_cli(nut.as_deref(), &params, &self.remote_ip(request));

        // The form buffers held signatures and key material.
        for value in params.values_mut() {
            value.zeroize();
        }
        body.zeroize();

        Response::from_data("text/plain", reply)
    }

    /// `GET /pag.sqrl` — the browser poll.
    fn pag(&self, request: &Request) -> Response {
        let nut = request.get_param("nut").unwrap_or_default();
        let pag = request.get_param("pag").unwrap_or_default();
        if nut.is_empty() || pag.is_empty() {
            return Response::text("missing nut or pag\n").with_status_code(404);
        }

        match self.engine.poll_pag(&nut, &pag) {
            Ok(Some(url)) => {
                if Self::wants_json(request) {
                    Response::json(&PagReply { url: &url })
                } else {
                    Response::text(url)
                }
            }
            Ok(None) => Response::text(""),
            Err(StoreError::NotFound) => Response::text("unknown session\n").with_status_code(404),
            Err(err) => store_failure("pag_lookup", &err),
        }
    }
}

fn store_failure(context: &str, err: &StoreError) -> Response {
    seclog::log_error(context, err);
    Response::text("store failure\n").with_status_code(500)
}
