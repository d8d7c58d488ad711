use thiserror::Error;

/// Errors produced by the wssh bridge and its collaborators.
///
/// Establishment errors (`Descriptor` through `Shell`) surface
/// synchronously to the caller before any bridging starts. In-bridge
/// errors (`FrameRead`, `FrameWrite`) terminate the bridge and are
/// logged rather than returned to the remote user. `Resize` is
/// non-fatal: the directive is dropped and logged. `Cleanup` is caught
/// at the teardown boundary and logged, never re-raised.
#[derive(Debug, Error)]
pub enum WsshError {
    #[error("malformed descriptor: {0}")]
    Descriptor(String),

    #[error("dial failed: {0}")]
    Dial(String),

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("session open failed: {0}")]
    SessionOpen(String),

    #[error("pty request failed: {0}")]
    Pty(String),

    #[error("shell start failed: {0}")]
    Shell(String),

    #[error("frame read failed: {0}")]
    FrameRead(String),

    #[error("frame write failed: {0}")]
    FrameWrite(String),

    #[error("malformed resize directive: {0}")]
    Resize(String),

    #[error("connection timed out")]
    Timeout,

    #[error("cleanup fault: {0}")]
    Cleanup(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

pub type WsshResult<T> = Result<T, WsshError>;
