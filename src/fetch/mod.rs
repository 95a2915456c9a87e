//! Transport abstraction for asset bytes
//!
//! **Why**: the scheduler never touches I/O directly. A [`FetchSource`]
//! produces bytes for an identifier and reports fractional progress through
//! a sink closure; the sink returning `false` means the caller cancelled and
//! the fetch must stop. This keeps the scheduling core testable against an
//! in-memory source and lets the demo run against the filesystem.
//!
//! **Used by**: core::loader (worker jobs), main.rs (source selection).

mod file;
mod memory;

pub use file::FileSource;
pub use memory::MemorySource;

use thiserror::Error;

/// Progress sink passed to a fetch. Receives fractions in `[0.0, 1.0]`;
/// a `false` return asks the fetch to abandon work.
pub type ProgressSink<'a> = &'a mut dyn FnMut(f32) -> bool;

#[derive(Debug, Error)]
pub enum FetchError {
    /// Identifier is malformed for this source (blank, escapes the root, ...).
    /// Never retried.
    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),

    /// Source has no asset under this identifier.
    #[error("not found: {0}")]
    NotFound(String),

    /// The progress sink requested a stop mid-transfer.
    #[error("cancelled: {0}")]
    Cancelled(String),

    /// Transport failure (I/O error, truncated read, ...). Retriable.
    #[error("fetch failed for {id}: {source}")]
    Io {
        id: String,
        #[source]
        source: std::io::Error,
    },
}

impl FetchError {
    /// True for errors where retrying the same identifier can never succeed.
    pub fn is_permanent(&self) -> bool {
        matches!(self, FetchError::InvalidIdentifier(_))
    }
}

/// A byte source addressed by string identifier.
///
/// Implementations block the calling worker thread for the duration of the
/// fetch and must call the sink at reasonable checkpoints (at least once per
/// chunk) so cancellation is honored promptly.
pub trait FetchSource: Send + Sync {
    fn fetch(&self, id: &str, progress: ProgressSink) -> Result<Vec<u8>, FetchError>;
}
