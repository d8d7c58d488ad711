//! Output aggregator: batches remote shell output between flush ticks.
//!
//! The session pump appends combined stdout/stderr as it arrives; the
//! bridge's outbound flow drains on a fixed tick. Append and drain are
//! serialized by an internal lock so no bytes are duplicated or lost
//! across drains, and because a drain always carries everything
//! aggregated so far, multi-byte sequences are never split across
//! frames mid-codepoint by the flush boundary itself.

use std::sync::{Arc, Mutex};

/// A thread-safe append-only byte sink with an atomic drain-and-clear.
///
/// Cloning yields another handle to the same buffer.
#[derive(Debug, Clone, Default)]
pub struct OutputAggregator {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl OutputAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append bytes to the buffer.
    pub fn append(&self, data: &[u8]) {
        let mut buf = self.buf.lock().unwrap_or_else(|e| e.into_inner());
        buf.extend_from_slice(data);
    }

    /// Atomically take everything buffered so far, leaving it empty.
    pub fn drain_and_clear(&self) -> Vec<u8> {
        let mut buf = self.buf.lock().unwrap_or_else(|e| e.into_inner());
        std::mem::take(&mut *buf)
    }

    /// Drain and convert to text, substituting U+FFFD for each
    /// ill-formed UTF-8 unit. Returns `None` when nothing is buffered.
    pub fn drain_text(&self) -> Option<String> {
        let bytes = self.drain_and_clear();
        if bytes.is_empty() {
            return None;
        }
        Some(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Number of bytes currently buffered.
    pub fn len(&self) -> usize {
        self.buf.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_then_drain() {
        let agg = OutputAggregator::new();
        agg.append(b"hello ");
        agg.append(b"world");
        assert_eq!(agg.drain_and_clear(), b"hello world");
        // A second immediate drain is empty.
        assert!(agg.drain_and_clear().is_empty());
    }

    #[test]
    fn clones_share_the_buffer() {
        let agg = OutputAggregator::new();
        let writer = agg.clone();
        writer.append(b"abc");
        assert_eq!(agg.len(), 3);
        assert_eq!(agg.drain_and_clear(), b"abc");
        assert!(writer.is_empty());
    }

    #[test]
    fn drain_text_on_empty_is_none() {
        let agg = OutputAggregator::new();
        assert_eq!(agg.drain_text(), None);
    }

    #[test]
    fn drain_text_repairs_invalid_utf8() {
        let agg = OutputAggregator::new();
        // Valid text around a stray continuation byte.
        agg.append(b"ok \x80 end");
        let text = agg.drain_text().unwrap();
        assert_eq!(text, "ok \u{fffd} end");
    }

    #[test]
    fn drain_text_preserves_multibyte_sequences() {
        let agg = OutputAggregator::new();
        agg.append("héllo ✓".as_bytes());
        assert_eq!(agg.drain_text().unwrap(), "héllo ✓");
    }

    #[test]
    fn concurrent_appends_are_not_lost() {
        let agg = OutputAggregator::new();
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let agg = agg.clone();
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        agg.append(b"x");
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(agg.drain_and_clear().len(), 800);
    }
}
