//! The `/cli.sqrl` response encoder.
//!
//! A response is a base64-SQRL encoded key=value block. Field order is
//! stable: `ver`, `nut`, `tif`, `qry`, then `url`, `sin`, `suk`, `ask` when
//! present. The encoded bytes double as session state: they are stored in
//! the hoard and must equal the `server` field of the session's next
//! request, byte-for-byte.

use serde::{Deserialize, Serialize};

use sqrl_crypto::{sqrl64, Nut};

use crate::tif::Tif;

/// Protocol version this server speaks.
const PROTOCOL_VERSION: &str = "1";

/// An optional server-to-client prompt, surfaced on `query`.
///
/// The client renders the message and up to two labeled buttons; the chosen
/// button comes back as `btn` on the following `ident`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ask {
    /// The prompt text.
    pub message: String,
    /// First button label.
    pub button1: Option<String>,
    /// Second button label.
    pub button2: Option<String>,
}

impl Ask {
    /// A bare message prompt.
    pub fn new(message: impl Into<String>) -> Self {
        Ask {
            message: message.into(),
            button1: None,
            button2: None,
        }
    }

    /// Wire form: tilde-separated base64-SQRL message and button labels.
    pub fn encode(&self) -> String {
        let mut parts = vec![sqrl64::encode(self.message.as_bytes())];
        if let Some(button1) = &self.button1 {
            parts.push(sqrl64::encode(button1.as_bytes()));
        }
        if let Some(button2) = &self.button2 {
            parts.push(sqrl64::encode(button2.as_bytes()));
        }
        parts.join("~")
    }
}

/// A cli response under construction.
#[derive(Clone, Debug, Default)]
pub struct CliResponse {
    /// The nut the client must present next.
    pub nut: Nut,
    /// Transaction information flags.
    pub tif: Tif,
    /// Server-relative URL for the next cli request.
    pub qry: String,
    /// CPS redirect URL, attached on authenticated `ident`/`enable` when the
    /// client asked for it.
    pub url: Option<String>,
    /// Secret index request.
    pub sin: Option<String>,
    /// Stored server-unlock key, returned on demand.
    pub suk: Option<String>,
    /// Prompt to surface before the client commits.
    pub ask: Option<Ask>,
}

impl CliResponse {
    /// Start a response for the given nut and query path.
    pub fn new(nut: Nut, qry: String) -> Self {
        CliResponse {
            nut,
            qry,
            ..Default::default()
        }
    }

    /// Encode to the wire: the key=value block, base64-SQRL encoded.
    pub fn encode(&self) -> Vec<u8> {
        let mut block = String::new();
        block.push_str(&format!("ver={PROTOCOL_VERSION}\r\n"));
        block.push_str(&format!("nut={}\r\n", self.nut));
        block.push_str(&format!("tif={}\r\n", self.tif.as_hex()));
        block.push_str(&format!("qry={}\r\n", self.qry));
        if let Some(url) = &self.url {
            block.push_str(&format!("url={url}\r\n"));
        }
        if let Some(sin) = &self.sin {
            block.push_str(&format!("sin={sin}\r\n"));
        }
        if let Some(suk) = &self.suk {
            block.push_str(&format!("suk={suk}\r\n"));
        }
        if let Some(ask) = &self.ask {
            block.push_str(&format!("ask={}\r\n", ask.encode()));
        }
        sqrl64::encode(block.as_bytes()).into_bytes()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::client::parse_sqrl_query;

    fn decode_block(encoded: &[u8]) -> HashMap<String, String> {
        let bytes = sqrl64::decode(encoded).expect("base64");
        parse_sqrl_query(&String::from_utf8(bytes).expect("utf8"))
    }

    #[test]
    fn test_encode_minimal() {
        let mut response = CliResponse::new("abc123".into(), "/cli.sqrl?nut=abc123".to_string());
        response.tif |= Tif::ID_MATCH | Tif::IP_MATCH;

        let params = decode_block(&response.encode());
        assert_eq!(params["ver"], "1");
        assert_eq!(params["nut"], "abc123");
        assert_eq!(params["tif"], "5");
        assert_eq!(params["qry"], "/cli.sqrl?nut=abc123");
        assert!(!params.contains_key("url"));
        assert!(!params.contains_key("suk"));
        assert!(!params.contains_key("ask"));
    }

    #[test]
    fn test_encode_optional_fields() {
        let mut response = CliResponse::new("n".into(), "/cli.sqrl?nut=n".to_string());
        response.url = Some("https://example.com/loggedin".to_string());
        response.suk = Some("stored-suk".to_string());

        let params = decode_block(&response.encode());
        assert_eq!(params["url"], "https://example.com/loggedin");
        assert_eq!(params["suk"], "stored-suk");
    }

    #[test]
    fn test_encode_tif_uppercase_hex() {
        let mut response = CliResponse::new("n".into(), "q".to_string());
        response.tif |= Tif::COMMAND_FAILED | Tif::CLIENT_FAILURE;
        let params = decode_block(&response.encode());
        assert_eq!(params["tif"], "C0");
    }

    #[test]
    fn test_ask_encoding() {
        let ask = Ask {
            message: "Transfer funds?".to_string(),
            button1: Some("Approve".to_string()),
            button2: Some("Deny".to_string()),
        };
        let encoded = ask.encode();
        let parts: Vec<&str> = encoded.split('~').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(
            sqrl64::decode(parts[0]).expect("base64"),
            b"Transfer funds?"
        );
        assert_eq!(sqrl64::decode(parts[1]).expect("base64"), b"Approve");
        assert_eq!(sqrl64::decode(parts[2]).expect("base64"), b"Deny");
    }

    #[test]
    fn test_ask_message_only() {
        let ask = Ask::new("Proceed?");
        assert!(!ask.encode().contains('~'));
    }

    #[test]
    fn test_encode_is_deterministic() {
        let mut response = CliResponse::new("n".into(), "q".to_string());
        response.tif |= Tif::ID_MATCH;
        assert_eq!(response.encode(), response.encode());
    }
}
