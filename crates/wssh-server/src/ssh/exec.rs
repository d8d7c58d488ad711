//! One-shot remote command execution.
//!
//! Shares the dial/auth logic with interactive establishment but has no
//! PTY, no buffering and no bridging: open a session, run one command,
//! collect combined output, close everything, return the text.

use super::session::{dial, disconnect};
use russh::ChannelMsg;
use std::time::Duration;
use tracing::debug;
use wssh_core::{ConnectionDescriptor, WsshError, WsshResult};

/// Connect timeout for one-shot execution. Kept short: a wrong host or
/// credential should fail fast.
const EXEC_CONNECT_TIMEOUT: Duration = Duration::from_secs(1);

/// Run `command` on the described host and return its combined
/// stdout/stderr, decoded as UTF-8 with invalid sequences repaired.
pub async fn exec_remote_command(
    descriptor: &ConnectionDescriptor,
    command: &str,
) -> WsshResult<String> {
    let handle = dial(descriptor, EXEC_CONNECT_TIMEOUT).await?;

    let mut channel = handle
        .channel_open_session()
        .await
        .map_err(|e| WsshError::SessionOpen(e.to_string()))?;

    channel
        .exec(true, command)
        .await
        .map_err(|e| WsshError::Other(format!("exec failed: {e}")))?;

    let mut combined = Vec::new();
    let mut exit_status = None;
    while let Some(msg) = channel.wait().await {
        match msg {
            ChannelMsg::Data { ref data } => combined.extend_from_slice(data),
            ChannelMsg::ExtendedData { ref data, .. } => combined.extend_from_slice(data),
            ChannelMsg::ExitStatus { exit_status: code } => exit_status = Some(code),
            ChannelMsg::Close => break,
            _ => {}
        }
    }

    disconnect(&handle).await;
    debug!(command, exit_status, bytes = combined.len(), "remote command finished");

    Ok(String::from_utf8_lossy(&combined).into_owned())
}
