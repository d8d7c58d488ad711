//! wssh-core: Shared library for the Web SSH bridge.
//!
//! Provides the connection descriptor codec (base64 + JSON), the inbound
//! terminal control protocol (keepalive / resize / raw data), the output
//! aggregator that batches remote shell output between flush ticks, and
//! the shared error types.

pub mod aggregator;
pub mod control;
pub mod descriptor;
pub mod error;

// Re-export commonly used items at crate root.
pub use aggregator::OutputAggregator;
pub use control::InboundFrame;
pub use descriptor::ConnectionDescriptor;
pub use error::{WsshError, WsshResult};
