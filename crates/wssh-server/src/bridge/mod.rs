//! The stream bridge: relays bytes and control signals between a
//! browser WebSocket and an interactive SSH shell session.
//!
//! Three tasks serve one bridged connection:
//!
//! - the *inbound flow* reads WebSocket frames and routes them —
//!   keepalives are discarded, resize directives become window-change
//!   commands, everything else is stdin;
//! - the *session pump* owns the SSH channel: it applies stdin/resize
//!   commands and appends the shell's combined output to the
//!   aggregator (the wiring the establisher promises);
//! - the *outbound flow* drains the aggregator on a short tick, owns
//!   the absolute-timeout clock, and runs cleanup on every exit path.
//!
//! The flows share nothing but the aggregator and the single-fire
//! termination signal. Cleanup closes the WebSocket and the SSH
//! transport together, exactly once.

pub mod lifecycle;

use crate::ssh::session::{disconnect, AcceptingClient, RemoteSession};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{Sink, SinkExt, StreamExt};
use lifecycle::{Lifecycle, TerminationSignal};
use russh::client::{Handle, Msg};
use russh::{Channel, ChannelMsg};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;
use wssh_core::{InboundFrame, OutputAggregator, WsshError};

type WsSink = SplitSink<WebSocketStream<TcpStream>, Message>;
type WsStream = SplitStream<WebSocketStream<TcpStream>>;

/// Notice frame sent to the browser when the absolute timeout fires.
pub const TIMEOUT_NOTICE: &str = "\u{1b}[33mconnection closed: timed out\u{1b}[0m";

/// How long cleanup waits for the other tasks to converge before
/// abandoning them.
const CONVERGE_TIMEOUT: Duration = Duration::from_secs(1);

/// Commands the inbound flow sends to the session pump.
#[derive(Debug)]
enum SessionCommand {
    Stdin(Vec<u8>),
    Resize { rows: u32, cols: u32 },
}

/// Timing knobs for one bridged connection.
#[derive(Debug, Clone, Copy)]
pub struct BridgeOptions {
    /// Absolute session timeout, started at bridge entry.
    pub session_timeout: Duration,
    /// Outbound flush tick.
    pub flush_interval: Duration,
}

/// Bridge one established [`RemoteSession`] to one WebSocket until
/// failure, peer close or timeout, then tear both down.
pub async fn run(ws: WebSocketStream<TcpStream>, session: RemoteSession, opts: BridgeOptions) {
    let lifecycle = Arc::new(Lifecycle::new());
    lifecycle.begin_bridging();
    let signal = lifecycle.signal();

    let output = session.output();
    let (handle, channel, _) = session.into_parts();
    let (ws_tx, ws_rx) = ws.split();
    let (cmd_tx, cmd_rx) = mpsc::channel::<SessionCommand>(64);

    let pump = tokio::spawn(session_pump(channel, output.clone(), cmd_rx, signal.clone()));
    let inbound = tokio::spawn(inbound_flow(ws_rx, cmd_tx, signal.clone()));

    outbound_flow(ws_tx, output, handle, lifecycle, signal, opts, pump, inbound).await;
}

/// Inbound flow: WebSocket frames → control routing → session commands.
async fn inbound_flow(
    mut ws_rx: WsStream,
    cmd_tx: mpsc::Sender<SessionCommand>,
    signal: TerminationSignal,
) {
    loop {
        let msg = tokio::select! {
            _ = signal.fired() => break,
            msg = ws_rx.next() => msg,
        };

        let payload: Vec<u8> = match msg {
            Some(Ok(Message::Text(text))) => text.into_bytes(),
            Some(Ok(Message::Binary(data))) => data.to_vec(),
            Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => continue,
            Some(Ok(Message::Close(_))) | None => {
                debug!("websocket closed by peer");
                signal.fire();
                break;
            }
            Some(Err(e)) => {
                debug!(error = %WsshError::FrameRead(e.to_string()), "websocket read failed");
                signal.fire();
                break;
            }
        };

        let command = match InboundFrame::parse(&payload) {
            Ok(InboundFrame::Keepalive) => continue,
            Ok(InboundFrame::Resize { rows, cols }) => SessionCommand::Resize { rows, cols },
            Ok(InboundFrame::Data(data)) => SessionCommand::Stdin(data),
            Err(e) => {
                // Malformed directive: dropped, never fatal.
                warn!(error = %e, "dropping malformed resize directive");
                continue;
            }
        };

        if cmd_tx.send(command).await.is_err() {
            // Pump is gone — the session side already failed.
            signal.fire();
            break;
        }
    }
}

/// Session pump: owns the SSH channel. Shell output is appended to the
/// aggregator; stdin and window changes come in as commands.
async fn session_pump(
    mut channel: Channel<Msg>,
    output: OutputAggregator,
    mut cmd_rx: mpsc::Receiver<SessionCommand>,
    signal: TerminationSignal,
) {
    loop {
        tokio::select! {
            msg = channel.wait() => match msg {
                Some(ChannelMsg::Data { ref data }) => output.append(data),
                Some(ChannelMsg::ExtendedData { ref data, .. }) => output.append(data),
                Some(ChannelMsg::ExitStatus { exit_status }) => {
                    debug!(exit_status, "remote shell exited");
                }
                Some(ChannelMsg::Eof) | Some(ChannelMsg::Close) | None => {
                    signal.fire();
                    break;
                }
                Some(_) => {}
            },
            cmd = cmd_rx.recv() => match cmd {
                Some(SessionCommand::Stdin(data)) => {
                    if let Err(e) = channel.data(&data[..]).await {
                        debug!(error = %WsshError::FrameWrite(e.to_string()), "stdin write failed");
                        signal.fire();
                        break;
                    }
                }
                Some(SessionCommand::Resize { rows, cols }) => {
                    match channel.window_change(cols, rows, 0, 0).await {
                        Ok(()) => debug!(rows, cols, "terminal resized"),
                        Err(e) => {
                            warn!(error = %e, "window change failed");
                            signal.fire();
                            break;
                        }
                    }
                }
                None => {
                    // Bridge is shutting down; close stdin and let the
                    // channel wind down.
                    let _ = channel.eof().await;
                    break;
                }
            },
        }
    }
}

/// Outbound flow: aggregator drains and the timeout clock. Owns cleanup.
#[allow(clippy::too_many_arguments)]
async fn outbound_flow(
    mut ws_tx: WsSink,
    output: OutputAggregator,
    handle: Handle<AcceptingClient>,
    lifecycle: Arc<Lifecycle>,
    signal: TerminationSignal,
    opts: BridgeOptions,
    pump: JoinHandle<()>,
    inbound: JoinHandle<()>,
) {
    let reason = outbound_loop(&mut ws_tx, &output, &signal, opts).await;
    info!(reason, "bridge closing");

    cleanup(ws_tx, handle, &lifecycle, pump, inbound).await;
}

/// Drive the outbound side until a terminal condition, returning the
/// close reason. Generic over the sink so the drain and timeout
/// behavior can be exercised without a live WebSocket.
async fn outbound_loop<S>(
    ws_tx: &mut S,
    output: &OutputAggregator,
    signal: &TerminationSignal,
    opts: BridgeOptions,
) -> &'static str
where
    S: Sink<Message> + Unpin,
{
    let timeout = tokio::time::sleep(opts.session_timeout);
    tokio::pin!(timeout);
    let mut flush = tokio::time::interval(opts.flush_interval);

    loop {
        tokio::select! {
            _ = signal.fired() => break "terminated",
            _ = &mut timeout => {
                // Expected terminal condition, not a fault: tell the
                // user, then tear down.
                debug!(error = %WsshError::Timeout, "absolute session timeout elapsed");
                let _ = ws_tx.send(Message::Text(TIMEOUT_NOTICE.into())).await;
                break "timed out";
            }
            _ = flush.tick() => {
                if let Some(text) = output.drain_text() {
                    if ws_tx.send(Message::Text(text.into())).await.is_err() {
                        break "write failed";
                    }
                }
            }
        }
    }
}

/// Close the WebSocket and the SSH session together. Runs at most once;
/// faults are logged, never propagated.
async fn cleanup(
    mut ws_tx: WsSink,
    handle: Handle<AcceptingClient>,
    lifecycle: &Lifecycle,
    pump: JoinHandle<()>,
    inbound: JoinHandle<()>,
) {
    // begin_close also fires the termination signal, so the inbound
    // flow and the pump start winding down even if they have not yet
    // noticed their side of the connection dying.
    if !lifecycle.begin_close() {
        return;
    }

    close_ws(&mut ws_tx).await;
    disconnect(&handle).await;

    // Both tasks observe the fired signal or the dead connections; give
    // them a moment to converge, then abandon them.
    let converge = async {
        if let Err(e) = pump.await {
            warn!(error = %e, "session pump ended abnormally");
        }
        if let Err(e) = inbound.await {
            warn!(error = %e, "inbound flow ended abnormally");
        }
    };
    if tokio::time::timeout(CONVERGE_TIMEOUT, converge).await.is_err() {
        warn!("bridge tasks did not converge in time");
    }

    lifecycle.finish_close();
    debug!("bridge closed");
}

/// Close the browser-facing sink; close failures are logged, not fatal.
async fn close_ws<S>(ws_tx: &mut S)
where
    S: Sink<Message> + Unpin,
    S::Error: std::fmt::Display,
{
    if let Err(e) = ws_tx.close().await {
        debug!(error = %e, "websocket close failed");
    }
}
