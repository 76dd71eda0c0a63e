//! The inner `client` body of a cli request.
//!
//! On the wire this is a base64-SQRL encoded, CRLF-delimited `key=value`
//! block:
//!
//! ```text
//! ver=1
//! cmd=query
//! opt=cps~suk
//! idk=<base64 key>
//! ```
//!
//! The same block grammar is reused by the response encoder; the parser here
//! also accepts bare LF line endings.

use std::collections::HashMap;
use std::fmt;

use zeroize::Zeroize;

use sqrl_crypto::sqrl64;

use crate::{ProtoError, Result};

/// A SQRL client command.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    /// Probe for identity state; never mutates.
    Query,
    /// Authenticate, creating the identity on first contact.
    Ident,
    /// Re-enable a disabled identity (requires `urs`).
    Enable,
    /// Disable the identity for SQRL authentication.
    Disable,
    /// Delete the identity (requires `urs`).
    Remove,
    /// Anything else; answered with function-not-supported.
    Other(String),
}

impl Command {
    /// Parse a command name from the wire.
    pub fn parse(s: &str) -> Self {
        match s {
            "query" => Command::Query,
            "ident" => Command::Ident,
            "enable" => Command::Enable,
            "disable" => Command::Disable,
            "remove" => Command::Remove,
            other => Command::Other(other.to_string()),
        }
    }

    /// The wire name.
    pub fn as_str(&self) -> &str {
        match self {
            Command::Query => "query",
            Command::Ident => "ident",
            Command::Enable => "enable",
            Command::Disable => "disable",
            Command::Remove => "remove",
            Command::Other(s) => s,
        }
    }

    /// Commands that complete an authentication when they succeed.
    pub fn is_auth(&self) -> bool {
        matches!(self, Command::Ident | Command::Enable)
    }

    /// Commands this server implements.
    pub fn is_supported(&self) -> bool {
        !matches!(self, Command::Other(_))
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Default for Command {
    fn default() -> Self {
        Command::Query
    }
}

/// The protocol versions a client speaks: a set of integers and inclusive
/// ranges, e.g. `1` or `1,3-5`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VersionSet(Vec<(u32, u32)>);

impl VersionSet {
    /// Parse the `ver` field.
    pub fn parse(s: &str) -> Result<Self> {
        let mut ranges = Vec::new();
        for part in s.split(',') {
            let part = part.trim();
            if part.is_empty() {
                return Err(ProtoError::Version(s.to_string()));
            }
            let range = match part.split_once('-') {
                Some((lo, hi)) => {
                    let lo = lo
                        .parse::<u32>()
                        .map_err(|_| ProtoError::Version(s.to_string()))?;
                    let hi = hi
                        .parse::<u32>()
                        .map_err(|_| ProtoError::Version(s.to_string()))?;
                    if lo > hi {
                        return Err(ProtoError::Version(s.to_string()));
                    }
                    (lo, hi)
                }
                None => {
                    let v = part
                        .parse::<u32>()
                        .map_err(|_| ProtoError::Version(s.to_string()))?;
                    (v, v)
                }
            };
            ranges.push(range);
        }
        if ranges.is_empty() {
            return Err(ProtoError::Version(s.to_string()));
        }
        Ok(VersionSet(ranges))
    }

    /// Membership test.
    pub fn supports(&self, version: u32) -> bool {
        self.0.iter().any(|&(lo, hi)| lo <= version && version <= hi)
    }
}

impl fmt::Display for VersionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .0
            .iter()
            .map(|&(lo, hi)| {
                if lo == hi {
                    lo.to_string()
                } else {
                    format!("{lo}-{hi}")
                }
            })
            .collect();
        f.write_str(&parts.join(","))
    }
}

/// The tilde-separated `opt` flag set. Unrecognized options are ignored.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Options {
    /// Only SQRL may authenticate to this account.
    pub sqrlonly: bool,
    /// Disable out-of-band account recovery.
    pub hardlock: bool,
    /// Client-Provided Session: the client opens the redirect URL itself.
    pub cps: bool,
    /// The client wants the stored server-unlock key returned.
    pub suk: bool,
    /// Skip the issuing-IP continuity check.
    pub noiptest: bool,
}

impl Options {
    /// Parse the `opt` field.
    pub fn parse(s: &str) -> Self {
        let mut opts = Options::default();
        for opt in s.split('~') {
            match opt {
                "sqrlonly" => opts.sqrlonly = true,
                "hardlock" => opts.hardlock = true,
                "cps" => opts.cps = true,
                "suk" => opts.suk = true,
                "noiptest" => opts.noiptest = true,
                _ => {}
            }
        }
        opts
    }

    /// Re-encode for the wire; empty string when no flags are set.
    pub fn encode(&self) -> String {
        let mut parts = Vec::new();
        if self.sqrlonly {
            parts.push("sqrlonly");
        }
        if self.hardlock {
            parts.push("hardlock");
        }
        if self.cps {
            parts.push("cps");
        }
        if self.suk {
            parts.push("suk");
        }
        if self.noiptest {
            parts.push("noiptest");
        }
        parts.join("~")
    }
}

/// Split a CRLF-delimited `key=value` block into a parameter map.
///
/// A line without `=` yields an empty value; blank lines are skipped.
pub fn parse_sqrl_query(block: &str) -> HashMap<String, String> {
    let mut params = HashMap::new();
    for line in block.split("\r\n").flat_map(|l| l.split('\n')) {
        if line.is_empty() {
            continue;
        }
        match line.split_once('=') {
            Some((key, value)) => params.insert(key.to_string(), value.to_string()),
            None => params.insert(line.to_string(), String::new()),
        };
    }
    params
}

/// The parsed client body.
///
/// Key fields are kept as their base64-SQRL wire strings; they are only
/// decoded at the moment a signature is checked. Absent keys are empty
/// strings, absent `btn` is -1.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ClientBody {
    /// Protocol versions the client speaks.
    pub version: VersionSet,
    /// The requested command.
    pub cmd: Command,
    /// Option flags.
    pub opt: Options,
    /// Identity public key.
    pub idk: String,
    /// Server-unlock key (sent with `ident`).
    pub suk: String,
    /// Verify-unlock public key (sent with `ident`).
    pub vuk: String,
    /// Previous identity key during rekey.
    pub pidk: String,
    /// Ask-button selection, -1 when absent.
    pub btn: i32,
}

impl ClientBody {
    /// Build a body from a parsed parameter map.
    pub fn from_params(params: &HashMap<String, String>) -> Result<Self> {
        let ver = params
            .get("ver")
            .ok_or(ProtoError::MissingField("ver"))?;
        let version = VersionSet::parse(ver)?;

        let cmd = params
            .get("cmd")
            .ok_or(ProtoError::MissingField("cmd"))?;

        let btn = match params.get("btn") {
            Some(raw) => raw.parse::<i32>().map_err(|_| ProtoError::Malformed {
                field: "btn",
                detail: format!("not an integer: {raw}"),
            })?,
            None => -1,
        };

        Ok(ClientBody {
            version,
            cmd: Command::parse(cmd),
            opt: params
                .get("opt")
                .map(|s| Options::parse(s))
                .unwrap_or_default(),
            idk: params.get("idk").cloned().unwrap_or_default(),
            suk: params.get("suk").cloned().unwrap_or_default(),
            vuk: params.get("vuk").cloned().unwrap_or_default(),
            pidk: params.get("pidk").cloned().unwrap_or_default(),
            btn,
        })
    }

    /// Decode a base64-SQRL client field into a body.
    pub fn decode(encoded: &str) -> Result<Self> {
        let bytes = sqrl64::decode(encoded)?;
        let block = String::from_utf8(bytes).map_err(|e| ProtoError::Malformed {
            field: "client",
            detail: format!("not UTF-8: {e}"),
        })?;
        Self::from_params(&parse_sqrl_query(&block))
    }

    /// Re-encode to the base64-SQRL wire form.
    pub fn encode(&self) -> String {
        let mut block = String::new();
        block.push_str(&format!("ver={}\r\n", self.version));
        block.push_str(&format!("cmd={}\r\n", self.cmd));
        let opt = self.opt.encode();
        if !opt.is_empty() {
            block.push_str(&format!("opt={opt}\r\n"));
        }
        if !self.idk.is_empty() {
            block.push_str(&format!("idk={}\r\n", self.idk));
        }
        if !self.suk.is_empty() {
            block.push_str(&format!("suk={}\r\n", self.suk));
        }
        if !self.vuk.is_empty() {
            block.push_str(&format!("vuk={}\r\n", self.vuk));
        }
        if !self.pidk.is_empty() {
            block.push_str(&format!("pidk={}\r\n", self.pidk));
        }
        if self.btn >= 0 {
            block.push_str(&format!("btn={}\r\n", self.btn));
        }
        sqrl64::encode(block.as_bytes())
    }

    /// Overwrite all key material with zeros and reset the rest.
    pub fn clear(&mut self) {
        self.idk.zeroize();
        self.suk.zeroize();
        self.vuk.zeroize();
        self.pidk.zeroize();
        if let Command::Other(s) = &mut self.cmd {
            s.zeroize();
        }
        self.cmd = Command::Query;
        self.version = VersionSet::default();
        self.opt = Options::default();
        self.btn = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_query_valid() {
        let block = "ver=1\r\ncmd=query\r\nopt=sqrlonly~hardlock\r\nidk=testkey123\r\n";
        let params = parse_sqrl_query(block);
        assert_eq!(params["ver"], "1");
        assert_eq!(params["cmd"], "query");
        assert_eq!(params["opt"], "sqrlonly~hardlock");
        assert_eq!(params["idk"], "testkey123");
    }

    #[test]
    fn test_parse_query_empty() {
        assert!(parse_sqrl_query("").is_empty());
    }

    #[test]
    fn test_parse_query_no_value() {
        let params = parse_sqrl_query("key\r\n");
        assert_eq!(params["key"], "");
    }

    #[test]
    fn test_parse_query_bare_lf() {
        let params = parse_sqrl_query("ver=1\ncmd=ident\n");
        assert_eq!(params["ver"], "1");
        assert_eq!(params["cmd"], "ident");
    }

    fn full_params() -> HashMap<String, String> {
        [
            ("ver", "1"),
            ("cmd", "ident"),
            ("opt", "sqrlonly~hardlock"),
            ("idk", "testidk"),
            ("suk", "testsuk"),
            ("vuk", "testvuk"),
            ("pidk", "testpidk"),
            ("btn", "2"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }

    #[test]
    fn test_from_params_valid() {
        let body = ClientBody::from_params(&full_params()).expect("parse");
        assert!(body.version.supports(1));
        assert_eq!(body.cmd, Command::Ident);
        assert!(body.opt.sqrlonly);
        assert!(body.opt.hardlock);
        assert!(!body.opt.cps);
        assert_eq!(body.idk, "testidk");
        assert_eq!(body.suk, "testsuk");
        assert_eq!(body.vuk, "testvuk");
        assert_eq!(body.pidk, "testpidk");
        assert_eq!(body.btn, 2);
    }

    #[test]
    fn test_from_params_invalid_version() {
        let mut params = full_params();
        params.insert("ver".to_string(), "invalid".to_string());
        assert!(ClientBody::from_params(&params).is_err());
    }

    #[test]
    fn test_from_params_missing_ver() {
        let mut params = full_params();
        params.remove("ver");
        assert!(matches!(
            ClientBody::from_params(&params),
            Err(ProtoError::MissingField("ver"))
        ));
    }

    #[test]
    fn test_from_params_no_btn() {
        let params = [("ver", "1"), ("cmd", "query")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let body = ClientBody::from_params(&params).expect("parse");
        assert_eq!(body.btn, -1);
    }

    #[test]
    fn test_version_ranges() {
        let set = VersionSet::parse("1,3-5").expect("parse");
        assert!(set.supports(1));
        assert!(!set.supports(2));
        assert!(set.supports(3));
        assert!(set.supports(4));
        assert!(set.supports(5));
        assert!(!set.supports(6));
        assert_eq!(set.to_string(), "1,3-5");
    }

    #[test]
    fn test_version_rejects_garbage() {
        assert!(VersionSet::parse("").is_err());
        assert!(VersionSet::parse("one").is_err());
        assert!(VersionSet::parse("3-1").is_err());
        assert!(VersionSet::parse("1,,2").is_err());
    }

    #[test]
    fn test_options_unknown_ignored() {
        let opts = Options::parse("cps~frobnicate~suk");
        assert!(opts.cps);
        assert!(opts.suk);
        assert!(!opts.noiptest);
    }

    #[test]
    fn test_encode_roundtrip() {
        let body = ClientBody {
            version: VersionSet::parse("1").expect("parse"),
            cmd: Command::Ident,
            opt: Options {
                sqrlonly: true,
                ..Default::default()
            },
            idk: "testidk".to_string(),
            suk: "testsuk".to_string(),
            vuk: "testvuk".to_string(),
            pidk: "testpidk".to_string(),
            btn: -1,
        };

        let decoded = ClientBody::decode(&body.encode()).expect("decode");
        assert_eq!(decoded, body);
    }

    #[test]
    fn test_unknown_command() {
        let cmd = Command::parse("frobnicate");
        assert!(!cmd.is_supported());
        assert!(!cmd.is_auth());
        assert_eq!(cmd.as_str(), "frobnicate");
    }

    #[test]
    fn test_clear_wipes_keys() {
        let mut body = ClientBody::from_params(&full_params()).expect("parse");
        body.clear();
        assert!(body.idk.is_empty());
        assert!(body.suk.is_empty());
        assert!(body.vuk.is_empty());
        assert!(body.pidk.is_empty());
    }
}
