//! Redacting, injection-safe logging.
//!
//! Everything logged here may derive from client input, so two rules hold
//! for every line: control characters never reach the log stream, and
//! secrets are shown truncated or masked. Full nuts, signatures, server
//! blobs, and response bodies are never logged at all.

use std::fmt;

use tracing::{error, info, warn};

use sqrl_proto::{CliRequest, CliResponse};

/// Strip ASCII control characters (and DEL) from a string destined for a
/// log line. Returns `(empty)` when nothing printable remains.
pub fn sanitize_for_log(s: &str) -> String {
    if s.is_empty() {
        return "(empty)".to_string();
    }
    let safe: String = s.chars().filter(|&c| !c.is_control()).collect();
    if safe.is_empty() {
        return "(empty)".to_string();
    }
    safe
}

/// Truncate a key to its first `max_len` characters, dropping any control
/// characters. Returns `(empty)` for empty input.
pub fn truncate_key(key: &str, max_len: usize) -> String {
    if key.is_empty() {
        return "(empty)".to_string();
    }
    let safe: String = key
        .chars()
        .take(max_len)
        .filter(|&c| !c.is_control())
        .collect();
    if safe.is_empty() {
        return "(empty)".to_string();
    }
    safe
}

/// Partially mask an IP address: IPv6 keeps the first segment, IPv4 the
/// first two octets. Unrecognized shapes keep at most four characters.
pub fn mask_ip(ip: &str) -> String {
    if ip.is_empty() {
        return "(no-ip)".to_string();
    }
    let ip: String = ip.chars().filter(|&c| !c.is_control()).collect();

    if ip.contains(':') {
        let first = ip.split(':').next().unwrap_or("");
        return format!("{first}:***");
    }
    let octets: Vec<&str> = ip.split('.').collect();
    if octets.len() == 4 {
        return format!("{}.{}.*.*", octets[0], octets[1]);
    }
    if ip.len() > 8 {
        let head: String = ip.chars().take(4).collect();
        return format!("{head}***");
    }
    ip
}

/// Log a parsed request: command, truncated idk, masked IP. Nothing else.
pub fn log_request(request: &CliRequest) {
    info!(
        "Request: cmd={}, idk={}..., ip={}",
        sanitize_for_log(request.client.cmd.as_str()),
        truncate_key(&request.client.idk, 8),
        mask_ip(&request.ip)
    );
}

/// Log a response: truncated nut and TIF only.
pub fn log_response(response: &CliResponse) {
    info!(
        "Response: nut={}..., tif=0x{}",
        truncate_key(response.nut.as_str(), 8),
        response.tif.as_hex()
    );
}

/// Log an error with a sanitized context tag.
pub fn log_error(context: &str, err: &dyn fmt::Display) {
    error!("Error [{}]: {}", sanitize_for_log(context), err);
}

/// Log an authentication event with a truncated identity key.
pub fn log_auth(event: &str, idk: &str, success: bool) {
    if success {
        info!(
            "Auth [{}]: idk={}..., success=true",
            sanitize_for_log(event),
            truncate_key(idk, 8)
        );
    } else {
        warn!(
            "Auth [{}]: idk={}..., success=false",
            sanitize_for_log(event),
            truncate_key(idk, 8)
        );
    }
}
