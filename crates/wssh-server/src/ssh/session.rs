//! Interactive SSH session establishment.
//!
//! Dials the remote host, authenticates with a password, opens a
//! session channel, wires its combined output into a fresh
//! [`OutputAggregator`], requests a PTY and starts a shell. Any stage
//! failing aborts establishment with a distinct error; no partially
//! wired session is handed to the caller.

use russh::client::{self, AuthResult, Handle};
use russh::keys::PublicKey;
use russh::{cipher, Channel, Disconnect, Preferred, Pty};
use std::borrow::Cow;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use wssh_core::{ConnectionDescriptor, OutputAggregator, WsshError, WsshResult};

/// Cipher preference list: modern algorithms first, CTR modes kept for
/// interoperability with older hosts. The CBC and arcfour suites the
/// legacy protocol allowed are not offered by russh.
const CIPHER_PREFERENCE: &[cipher::Name] = &[
    cipher::CHACHA20_POLY1305,
    cipher::AES_256_GCM,
    cipher::AES_256_CTR,
    cipher::AES_192_CTR,
    cipher::AES_128_CTR,
];

/// Terminal type requested for the PTY.
const TERM: &str = "xterm";

/// Client handler that accepts any host key.
///
/// Host-key verification is deliberately bypassed: sessions are
/// ephemeral and interactive, created from credentials the browser user
/// supplies for exactly one connection, and the server keeps no
/// known-hosts state to verify against. This trades authenticity of the
/// remote host for interactive convenience and is NOT a pattern to copy
/// into anything holding long-lived credentials.
pub struct AcceptingClient;

impl client::Handler for AcceptingClient {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        _server_public_key: &PublicKey,
    ) -> Result<bool, Self::Error> {
        Ok(true)
    }
}

/// A live interactive SSH session: transport handle, shell channel, and
/// the aggregator its combined output drains into.
///
/// Exactly one `RemoteSession` exists per bridged connection. All
/// handles are retired together by the bridge's cleanup path.
pub struct RemoteSession {
    handle: Handle<AcceptingClient>,
    channel: Channel<client::Msg>,
    output: OutputAggregator,
}

impl RemoteSession {
    /// Dial, authenticate, open a session channel, request a PTY of
    /// `rows` × `cols` and start an interactive shell.
    pub async fn establish(
        descriptor: &ConnectionDescriptor,
        rows: u16,
        cols: u16,
        connect_timeout: Duration,
    ) -> WsshResult<Self> {
        let handle = dial(descriptor, connect_timeout).await?;

        let channel = handle
            .channel_open_session()
            .await
            .map_err(|e| WsshError::SessionOpen(e.to_string()))?;

        // Combined stdout/stderr from the shell lands here; the bridge
        // drains it on its flush tick.
        let output = OutputAggregator::new();

        // Local echo on, fixed baud-rate hints, matching a plain
        // interactive terminal.
        let modes = [
            (Pty::ECHO, 1),
            (Pty::TTY_OP_ISPEED, 14400),
            (Pty::TTY_OP_OSPEED, 14400),
        ];
        channel
            .request_pty(true, TERM, cols as u32, rows as u32, 0, 0, &modes)
            .await
            .map_err(|e| WsshError::Pty(e.to_string()))?;

        channel
            .request_shell(true)
            .await
            .map_err(|e| WsshError::Shell(e.to_string()))?;

        info!(host = %descriptor.host, port = descriptor.port, rows, cols, "shell session established");

        Ok(Self {
            handle,
            channel,
            output,
        })
    }

    /// Handle to the aggregator this session's output drains into.
    pub fn output(&self) -> OutputAggregator {
        self.output.clone()
    }

    /// Split into transport handle, shell channel and aggregator for
    /// the bridge's task structure.
    pub(crate) fn into_parts(
        self,
    ) -> (
        Handle<AcceptingClient>,
        Channel<client::Msg>,
        OutputAggregator,
    ) {
        (self.handle, self.channel, self.output)
    }
}

/// Dial the remote host and authenticate with the descriptor's password.
pub(crate) async fn dial(
    descriptor: &ConnectionDescriptor,
    connect_timeout: Duration,
) -> WsshResult<Handle<AcceptingClient>> {
    let config = Arc::new(client::Config {
        preferred: Preferred {
            cipher: Cow::Borrowed(CIPHER_PREFERENCE),
            ..Default::default()
        },
        ..Default::default()
    });

    let addr = descriptor.address();
    debug!(addr = %addr, "dialing ssh host");

    let mut handle = tokio::time::timeout(
        connect_timeout,
        client::connect(config, addr.as_str(), AcceptingClient),
    )
    .await
    .map_err(|_| WsshError::Dial(format!("connect to {addr} timed out")))?
    .map_err(|e| WsshError::Dial(e.to_string()))?;

    let auth = handle
        .authenticate_password(descriptor.username.clone(), descriptor.password.clone())
        .await
        .map_err(|e| WsshError::Auth(e.to_string()))?;

    match auth {
        AuthResult::Success => Ok(handle),
        AuthResult::Failure { .. } => Err(WsshError::Auth(format!(
            "password rejected for {}@{}",
            descriptor.username, descriptor.host
        ))),
    }
}

/// Disconnect a transport handle, logging (not propagating) failures.
pub(crate) async fn disconnect(handle: &Handle<AcceptingClient>) {
    if let Err(e) = handle
        .disconnect(Disconnect::ByApplication, "session closed", "en")
        .await
    {
        warn!(error = %WsshError::Cleanup(e.to_string()), "ssh disconnect failed");
    }
}
