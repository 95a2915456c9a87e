//! In-memory fetch source
//!
//! Serves bytes out of a hash map, split into chunks so progress and
//! cancellation checkpoints fire mid-transfer. An optional gate channel
//! blocks before each chunk, which lets tests hold fetches in flight
//! deterministically.

use std::collections::HashMap;
use std::sync::Mutex;

use crossbeam_channel::Receiver;

use super::{FetchError, FetchSource, ProgressSink};

pub struct MemorySource {
    entries: Mutex<HashMap<String, Vec<u8>>>,
    chunks: usize,
    gate: Option<Receiver<()>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            chunks: 4,
            gate: None,
        }
    }

    /// Split every transfer into `chunks` progress checkpoints.
    pub fn with_chunks(mut self, chunks: usize) -> Self {
        self.chunks = chunks.max(1);
        self
    }

    /// Block before each chunk until a token arrives on `gate`. A closed
    /// channel stops blocking, so dropping the sender releases all fetches.
    pub fn with_gate(mut self, gate: Receiver<()>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn insert(&self, id: impl Into<String>, bytes: Vec<u8>) {
        self.entries.lock().unwrap().insert(id.into(), bytes);
    }
}

impl Default for MemorySource {
    fn default() -> Self {
        Self::new()
    }
}

impl FetchSource for MemorySource {
    fn fetch(&self, id: &str, progress: ProgressSink) -> Result<Vec<u8>, FetchError> {
        if id.trim().is_empty() {
            return Err(FetchError::InvalidIdentifier(id.to_string()));
        }
        let bytes = self
            .entries
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| FetchError::NotFound(id.to_string()))?;

        let chunk_len = (bytes.len() / self.chunks).max(1);
        let mut out = Vec::with_capacity(bytes.len());
        for chunk in bytes.chunks(chunk_len) {
            if let Some(gate) = &self.gate {
                let _ = gate.recv();
            }
            out.extend_from_slice(chunk);
            let frac = out.len() as f32 / bytes.len() as f32;
            if !progress(frac) {
                return Err(FetchError::Cancelled(id.to_string()));
            }
        }
        if out.is_empty() && !progress(1.0) {
            return Err(FetchError::Cancelled(id.to_string()));
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Test: basic fetch
    /// Validates: stored bytes come back intact with final progress 1.0
    #[test]
    fn test_memory_fetch() {
        let src = MemorySource::new();
        src.insert("a", vec![1, 2, 3, 4, 5, 6, 7, 8]);

        let mut last = 0.0f32;
        let bytes = src.fetch("a", &mut |f| {
            last = f;
            true
        });
        assert_eq!(bytes.unwrap(), vec![1, 2, 3, 4, 5, 6, 7, 8]);
        assert!((last - 1.0).abs() < f32::EPSILON);
    }

    /// Test: missing identifier
    /// Validates: NotFound, not a panic
    #[test]
    fn test_memory_not_found() {
        let src = MemorySource::new();
        let r = src.fetch("nope", &mut |_| true);
        assert!(matches!(r, Err(FetchError::NotFound(_))));
    }

    /// Test: sink cancellation
    /// Validates: a false return aborts the transfer with Cancelled
    #[test]
    fn test_memory_cancel_via_sink() {
        let src = MemorySource::new().with_chunks(4);
        src.insert("a", vec![0u8; 64]);

        let mut calls = 0;
        let r = src.fetch("a", &mut |_| {
            calls += 1;
            calls < 2
        });
        assert!(matches!(r, Err(FetchError::Cancelled(_))));
        assert_eq!(calls, 2);
    }

    /// Test: blank identifier
    /// Validates: whitespace ids are rejected as invalid
    #[test]
    fn test_memory_blank_id() {
        let src = MemorySource::new();
        let r = src.fetch("   ", &mut |_| true);
        assert!(matches!(r, Err(FetchError::InvalidIdentifier(_))));
    }
}
