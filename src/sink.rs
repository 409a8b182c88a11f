//! # Result sinks
//!
//! The boundary between the engine and the transport that ships
//! [`OpResult`] messages to the caller.
//!
//! ## Overview
//!
//! | Type | Purpose |
//! |------|---------|
//! | [`ResultSink`] | Accepts one message at a time, in submission order |
//! | [`SharedSink`] | Multiplexer: serializes emissions from concurrent operations |
//! | `JsonLinesSink` | One JSON document per line on any `Write` (feature `serde`) |
//! | [`CollectSink`] | Keeps messages in memory |
//! | [`ChannelSink`] | Forwards messages over an `mpsc` channel |
//! | [`DiscardSink`] | Drops everything |
//!
//! ## Interleaving
//!
//! [`SharedSink::emit`] holds its mutex for the whole `send`, so the encoded
//! form of two messages can never interleave on the underlying stream, even
//! when a listing and two file reads share the same sink.

use std::fmt;
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::{BrowseError, OpResult};

/// Destination for result messages.
///
/// Implementations encode and write one message per call. Write failures are
/// reported as [`BrowseError::Sink`] or [`BrowseError::Serialization`].
pub trait ResultSink: Send {
    /// Deliver one message.
    fn send(&mut self, result: &OpResult) -> Result<(), BrowseError>;
}

impl<S: ResultSink + ?Sized> ResultSink for Box<S> {
    fn send(&mut self, result: &OpResult) -> Result<(), BrowseError> {
        (**self).send(result)
    }
}

/// Cloneable, mutually exclusive handle to one sink.
///
/// Every clone writes to the same underlying sink.
#[derive(Clone)]
pub struct SharedSink {
    inner: Arc<Mutex<Box<dyn ResultSink>>>,
}

impl SharedSink {
    /// Wrap a sink.
    pub fn new<S: ResultSink + 'static>(sink: S) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Box::new(sink))),
        }
    }

    fn sink(&self) -> MutexGuard<'_, Box<dyn ResultSink>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Send one message atomically with respect to other emitters.
    pub fn emit(&self, result: &OpResult) -> Result<(), BrowseError> {
        self.sink().send(result)
    }
}

impl fmt::Debug for SharedSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedSink").finish_non_exhaustive()
    }
}

/// In-memory sink; clones share the same buffer.
#[derive(Debug, Clone, Default)]
pub struct CollectSink {
    results: Arc<Mutex<Vec<OpResult>>>,
}

impl CollectSink {
    /// Create an empty collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything received so far.
    pub fn results(&self) -> Vec<OpResult> {
        self.results
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Remove and return everything received so far.
    pub fn take(&self) -> Vec<OpResult> {
        std::mem::take(&mut *self.results.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

impl ResultSink for CollectSink {
    fn send(&mut self, result: &OpResult) -> Result<(), BrowseError> {
        self.results
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(result.clone());
        Ok(())
    }
}

/// Forwards each message to a channel.
#[derive(Debug)]
pub struct ChannelSink(Sender<OpResult>);

impl ChannelSink {
    /// Wrap the sending half of a channel.
    pub fn new(tx: Sender<OpResult>) -> Self {
        Self(tx)
    }
}

impl ResultSink for ChannelSink {
    fn send(&mut self, result: &OpResult) -> Result<(), BrowseError> {
        self.0
            .send(result.clone())
            .map_err(|_| BrowseError::Sink("receiver dropped".into()))
    }
}

/// Sink that drops every message.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiscardSink;

impl ResultSink for DiscardSink {
    fn send(&mut self, _result: &OpResult) -> Result<(), BrowseError> {
        Ok(())
    }
}

#[cfg(feature = "serde")]
mod json {
    use super::*;
    use std::io::Write;

    /// Writes each message as one line of JSON and flushes.
    ///
    /// Available when the `serde` feature is enabled.
    #[derive(Debug)]
    pub struct JsonLinesSink<W> {
        writer: W,
    }

    impl<W: Write + Send> JsonLinesSink<W> {
        /// Wrap a writer.
        pub fn new(writer: W) -> Self {
            Self { writer }
        }

        /// Unwrap the writer.
        pub fn into_inner(self) -> W {
            self.writer
        }
    }

    impl<W: Write + Send> ResultSink for JsonLinesSink<W> {
        fn send(&mut self, result: &OpResult) -> Result<(), BrowseError> {
            let mut line =
                serde_json::to_vec(result).map_err(|e| BrowseError::Serialization(e.to_string()))?;
            line.push(b'\n');
            self.writer
                .write_all(&line)
                .and_then(|()| self.writer.flush())
                .map_err(|e| BrowseError::Sink(e.to_string()))
        }
    }
}

#[cfg(feature = "serde")]
pub use json::JsonLinesSink;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::thread;

    #[test]
    fn collect_sink_clones_share_buffer() {
        let collect = CollectSink::new();
        let shared = SharedSink::new(collect.clone());
        shared.emit(&OpResult::ok()).unwrap();
        shared.clone().emit(&OpResult::eof()).unwrap();
        let results = collect.take();
        assert_eq!(results.len(), 2);
        assert!(results[1].is_eof());
        assert!(collect.results().is_empty());
    }

    #[test]
    fn channel_sink_reports_dropped_receiver() {
        let (tx, rx) = mpsc::channel();
        let mut sink = ChannelSink::new(tx);
        sink.send(&OpResult::ok()).unwrap();
        assert!(rx.recv().unwrap().is_ok());
        drop(rx);
        assert!(matches!(sink.send(&OpResult::ok()), Err(BrowseError::Sink(_))));
    }

    #[test]
    fn discard_sink_accepts_everything() {
        let shared = SharedSink::new(DiscardSink);
        assert!(shared.emit(&OpResult::eof()).is_ok());
    }

    /// Byte-at-a-time writer: any unguarded concurrent emission would
    /// interleave at byte granularity.
    #[cfg(feature = "serde")]
    #[derive(Clone, Default)]
    struct SlowWriter(Arc<Mutex<Vec<u8>>>);

    #[cfg(feature = "serde")]
    impl std::io::Write for SlowWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            match buf.first() {
                Some(b) => {
                    self.0.lock().unwrap().push(*b);
                    thread::yield_now();
                    Ok(1)
                }
                None => Ok(0),
            }
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[cfg(feature = "serde")]
    #[test]
    fn concurrent_emits_never_interleave() {
        let out = SlowWriter::default();
        let shared = SharedSink::new(JsonLinesSink::new(out.clone()));
        let handles: Vec<_> = (0..4u64)
            .map(|i| {
                let shared = shared.clone();
                thread::spawn(move || {
                    for n in 0..10u64 {
                        shared
                            .emit(&OpResult::chunk(n + 1, 10, vec![i as u8; 16]))
                            .unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let bytes = out.0.lock().unwrap().clone();
        let text = String::from_utf8(bytes).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 40);
        for line in lines {
            let res: OpResult = serde_json::from_str(line).unwrap();
            let chunk = res.chunk.unwrap();
            assert!(chunk.bytes.iter().all(|b| *b == chunk.bytes[0]));
        }
    }
}
