//! Inbound terminal control protocol.
//!
//! Frames arriving from the browser are classified into a keepalive
//! token, a resize directive, or raw terminal input. Recognition is by
//! exact / prefix match so raw input that merely contains the word
//! "resize" passes through as data.

use crate::error::{WsshError, WsshResult};

/// Keepalive token sent periodically by the client. Discarded.
pub const KEEPALIVE: &[u8] = b"ping";

/// Prefix of the resize directive `resize:<rows>:<cols>`.
pub const RESIZE_PREFIX: &[u8] = b"resize:";

/// A classified inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundFrame {
    /// `"ping"` — no side effect, no response required.
    Keepalive,
    /// `"resize:<rows>:<cols>"` — live terminal window-size change.
    Resize { rows: u32, cols: u32 },
    /// Anything else: raw bytes for the shell's stdin.
    Data(Vec<u8>),
}

impl InboundFrame {
    /// Classify a frame payload.
    ///
    /// Returns `WsshError::Resize` for a directive with malformed
    /// integers; the caller logs it and drops the frame without
    /// terminating the bridge.
    pub fn parse(payload: &[u8]) -> WsshResult<Self> {
        if payload == KEEPALIVE {
            return Ok(InboundFrame::Keepalive);
        }
        if let Some(rest) = payload.strip_prefix(RESIZE_PREFIX) {
            let text = std::str::from_utf8(rest)
                .map_err(|_| WsshError::Resize("non-text resize payload".into()))?;
            let mut parts = text.splitn(2, ':');
            let rows = parse_dim(parts.next())?;
            let cols = parse_dim(parts.next())?;
            return Ok(InboundFrame::Resize { rows, cols });
        }
        Ok(InboundFrame::Data(payload.to_vec()))
    }
}

fn parse_dim(part: Option<&str>) -> WsshResult<u32> {
    let s = part.ok_or_else(|| WsshError::Resize("missing dimension".into()))?;
    s.parse::<u32>()
        .map_err(|_| WsshError::Resize(format!("bad dimension {s:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keepalive() {
        assert_eq!(InboundFrame::parse(b"ping").unwrap(), InboundFrame::Keepalive);
    }

    #[test]
    fn resize_directive() {
        assert_eq!(
            InboundFrame::parse(b"resize:40:120").unwrap(),
            InboundFrame::Resize { rows: 40, cols: 120 }
        );
    }

    #[test]
    fn resize_with_bad_integer_is_an_error() {
        let err = InboundFrame::parse(b"resize:abc:120").unwrap_err();
        assert!(matches!(err, WsshError::Resize(_)));
        let err = InboundFrame::parse(b"resize:40").unwrap_err();
        assert!(matches!(err, WsshError::Resize(_)));
    }

    #[test]
    fn raw_input_passes_through() {
        assert_eq!(
            InboundFrame::parse(b"ls -la\r").unwrap(),
            InboundFrame::Data(b"ls -la\r".to_vec())
        );
    }

    #[test]
    fn resize_substring_inside_input_is_data() {
        // Only a leading "resize:" is a directive.
        let payload = b"echo resize:40:120";
        assert_eq!(
            InboundFrame::parse(payload).unwrap(),
            InboundFrame::Data(payload.to_vec())
        );
    }

    #[test]
    fn pingish_input_is_data() {
        // "ping" must match exactly; "ping " is terminal input.
        assert_eq!(
            InboundFrame::parse(b"ping ").unwrap(),
            InboundFrame::Data(b"ping ".to_vec())
        );
    }
}
