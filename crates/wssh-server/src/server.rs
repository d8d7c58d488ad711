//! WebSocket listener and connection intake.
//!
//! Accepts TCP connections, upgrades them to WebSocket while capturing
//! the request URI, pulls the opaque connection descriptor and terminal
//! size from the query string, establishes the SSH session, and hands
//! the pair to the bridge. Establishment errors are reported to the
//! browser as a single text frame before close; past that point the
//! remote user only ever observes the connection closing.

use crate::bridge::{self, BridgeOptions};
use crate::config::ServerConfig;
use crate::ssh::RemoteSession;
use futures_util::SinkExt;
use std::collections::HashMap;
use std::net::SocketAddr;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::handshake::server::{Request, Response};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;
use tracing::{debug, error, info, warn};
use wssh_core::{ConnectionDescriptor, WsshError, WsshResult};

/// Query parameter carrying the base64 connection descriptor.
const PARAM_DESCRIPTOR: &str = "sshinfo";

/// The wssh server instance.
pub struct WsshServer {
    config: ServerConfig,
}

impl WsshServer {
    pub fn new(config: ServerConfig) -> Self {
        Self { config }
    }

    /// Accept connections until the listener fails.
    pub async fn run(self) -> WsshResult<()> {
        let addr: SocketAddr = format!("{}:{}", self.config.bind, self.config.port)
            .parse()
            .map_err(|e| WsshError::Other(format!("invalid bind address: {e}")))?;

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| WsshError::Other(format!("bind failed: {e}")))?;

        info!(addr = %addr, "websocket listener started");

        loop {
            match listener.accept().await {
                Ok((stream, remote)) => {
                    let config = self.config.clone();
                    tokio::spawn(async move {
                        debug!(remote = %remote, "connection accepted");
                        if let Err(e) = handle_connection(stream, config).await {
                            warn!(remote = %remote, error = %e, "connection ended with error");
                        }
                    });
                }
                Err(e) => {
                    error!(error = %e, "TCP accept failed");
                }
            }
        }
    }
}

/// Upgrade, establish, bridge. One call per browser connection.
async fn handle_connection(stream: TcpStream, config: ServerConfig) -> WsshResult<()> {
    let mut query = None;
    let callback = |req: &Request, resp: Response| {
        query = req.uri().query().map(str::to_string);
        Ok(resp)
    };
    let mut ws = tokio_tungstenite::accept_hdr_async(stream, callback)
        .await
        .map_err(|e| WsshError::Other(format!("websocket handshake failed: {e}")))?;

    let params = parse_query(query.as_deref().unwrap_or(""));
    let rows = dimension(&params, "rows", config.default_rows);
    let cols = dimension(&params, "cols", config.default_cols);

    let descriptor = match params
        .get(PARAM_DESCRIPTOR)
        .ok_or_else(|| WsshError::Descriptor(format!("missing {PARAM_DESCRIPTOR} parameter")))
        .and_then(|encoded| ConnectionDescriptor::decode(encoded))
    {
        Ok(d) => d,
        Err(e) => {
            reject(&mut ws, &e).await;
            return Err(e);
        }
    };

    let session =
        match RemoteSession::establish(&descriptor, rows, cols, config.connect_timeout).await {
            Ok(s) => s,
            Err(e) => {
                reject(&mut ws, &e).await;
                return Err(e);
            }
        };

    bridge::run(
        ws,
        session,
        BridgeOptions {
            session_timeout: config.session_timeout,
            flush_interval: config.flush_interval,
        },
    )
    .await;

    Ok(())
}

/// Report an establishment failure to the browser, then close.
async fn reject(ws: &mut WebSocketStream<TcpStream>, err: &WsshError) {
    let notice = format!("\u{1b}[31m{err}\u{1b}[0m");
    let _ = ws.send(Message::Text(notice)).await;
    let _ = ws.close(None).await;
}

fn dimension(params: &HashMap<String, String>, key: &str, default: u16) -> u16 {
    params
        .get(key)
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

/// Minimal query-string parser with `%XX` decoding.
///
/// `+` is kept literal: the descriptor value is base64, where `+` is a
/// payload character, and well-behaved clients encode spaces as `%20`.
fn parse_query(query: &str) -> HashMap<String, String> {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .filter_map(|pair| {
            let (key, value) = pair.split_once('=')?;
            Some((percent_decode(key), percent_decode(value)))
        })
        .collect()
}

fn percent_decode(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).ok();
            if let Some(byte) = hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                out.push(byte);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_pairs() {
        let params = parse_query("sshinfo=abc123&rows=40&cols=120");
        assert_eq!(params.get("sshinfo").unwrap(), "abc123");
        assert_eq!(params.get("rows").unwrap(), "40");
        assert_eq!(params.get("cols").unwrap(), "120");
    }

    #[test]
    fn decodes_percent_escapes() {
        let params = parse_query("sshinfo=eyJpcCI6綠%3D%3D&note=a%20b");
        assert_eq!(params.get("sshinfo").unwrap(), "eyJpcCI6綠==");
        assert_eq!(params.get("note").unwrap(), "a b");
    }

    #[test]
    fn keeps_plus_literal() {
        let params = parse_query("sshinfo=ab+cd");
        assert_eq!(params.get("sshinfo").unwrap(), "ab+cd");
    }

    #[test]
    fn ignores_malformed_pairs() {
        let params = parse_query("lonely&rows=24");
        assert!(!params.contains_key("lonely"));
        assert_eq!(params.get("rows").unwrap(), "24");
    }

    #[test]
    fn bad_percent_escape_passes_through() {
        let params = parse_query("x=%zz");
        assert_eq!(params.get("x").unwrap(), "%zz");
    }

    #[test]
    fn dimension_falls_back_to_default() {
        let params = parse_query("rows=forty");
        assert_eq!(dimension(&params, "rows", 24), 24);
        assert_eq!(dimension(&params, "cols", 80), 80);
        let params = parse_query("rows=50");
        assert_eq!(dimension(&params, "rows", 24), 50);
    }
}
