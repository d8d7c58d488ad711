//! Connection descriptor codec.
//!
//! The upstream system hands the server an opaque string: base64 of a
//! JSON object `{ip, port, username, password}`. Decoding produces an
//! immutable [`ConnectionDescriptor`]; either stage failing is reported
//! as a single "malformed descriptor" error with no partial result.

use crate::error::{WsshError, WsshResult};
use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine;
use serde::{Deserialize, Serialize};

/// Parameters for one remote SSH session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionDescriptor {
    /// Remote host. IPv6 literals are bracketed by [`normalize_host`]
    /// so the host composes with a trailing `:port`.
    #[serde(rename = "ip")]
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
}

impl ConnectionDescriptor {
    /// Decode an opaque descriptor string (base64 of JSON).
    pub fn decode(encoded: &str) -> WsshResult<Self> {
        let raw = B64
            .decode(encoded.trim())
            .map_err(|e| WsshError::Descriptor(format!("invalid base64: {e}")))?;
        let mut descriptor: ConnectionDescriptor = serde_json::from_slice(&raw)
            .map_err(|e| WsshError::Descriptor(format!("invalid JSON: {e}")))?;
        descriptor.host = normalize_host(&descriptor.host);
        Ok(descriptor)
    }

    /// Encode this descriptor back into the opaque wire form.
    pub fn encode(&self) -> WsshResult<String> {
        let json = serde_json::to_vec(self)
            .map_err(|e| WsshError::Descriptor(format!("encode failed: {e}")))?;
        Ok(B64.encode(json))
    }

    /// The dial address, `host:port`.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Bracket an IPv6 host literal so it composes with `:port`.
///
/// Idempotent: an already-bracketed host is returned unchanged.
pub fn normalize_host(host: &str) -> String {
    if host.contains(':') && !host.starts_with('[') {
        format!("[{host}]")
    } else {
        host.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ConnectionDescriptor {
        ConnectionDescriptor {
            host: "192.0.2.10".into(),
            port: 22,
            username: "admin".into(),
            password: "hunter2".into(),
        }
    }

    #[test]
    fn round_trip() {
        let d = sample();
        let encoded = d.encode().unwrap();
        let decoded = ConnectionDescriptor::decode(&encoded).unwrap();
        assert_eq!(decoded, d);
    }

    #[test]
    fn decode_known_payload() {
        // {"ip":"10.0.0.5","port":2222,"username":"u","password":"p"}
        let json = r#"{"ip":"10.0.0.5","port":2222,"username":"u","password":"p"}"#;
        let encoded = B64.encode(json);
        let d = ConnectionDescriptor::decode(&encoded).unwrap();
        assert_eq!(d.host, "10.0.0.5");
        assert_eq!(d.port, 2222);
        assert_eq!(d.address(), "10.0.0.5:2222");
    }

    #[test]
    fn rejects_bad_base64() {
        let err = ConnectionDescriptor::decode("not-base64!!!").unwrap_err();
        assert!(matches!(err, WsshError::Descriptor(_)));
    }

    #[test]
    fn rejects_bad_json() {
        let encoded = B64.encode(b"not json at all");
        let err = ConnectionDescriptor::decode(&encoded).unwrap_err();
        assert!(matches!(err, WsshError::Descriptor(_)));
    }

    #[test]
    fn rejects_wrong_shape() {
        let encoded = B64.encode(br#"{"ip":"h","port":"not a number"}"#);
        let err = ConnectionDescriptor::decode(&encoded).unwrap_err();
        assert!(matches!(err, WsshError::Descriptor(_)));
    }

    #[test]
    fn brackets_ipv6_host() {
        let json = r#"{"ip":"2001:db8::1","port":22,"username":"u","password":"p"}"#;
        let d = ConnectionDescriptor::decode(&B64.encode(json)).unwrap();
        assert_eq!(d.host, "[2001:db8::1]");
        assert_eq!(d.address(), "[2001:db8::1]:22");
    }

    #[test]
    fn bracket_normalization_is_idempotent() {
        let once = normalize_host("2001:db8::1");
        assert_eq!(once, "[2001:db8::1]");
        assert_eq!(normalize_host(&once), once);
        assert_eq!(normalize_host("example.com"), "example.com");
    }
}
