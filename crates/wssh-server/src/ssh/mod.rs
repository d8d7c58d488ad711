//! SSH transport: interactive session establishment and one-shot
//! command execution on top of russh.

pub mod exec;
pub mod session;

pub use exec::exec_remote_command;
pub use session::RemoteSession;
