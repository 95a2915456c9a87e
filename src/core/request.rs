//! Load request record and its state machine
//!
//! A `LoadRequest` describes one queued or in-flight load: identifier,
//! priority, callbacks, cancellation flag, state and progress. Requests are
//! pooled (see [`crate::core::pool::RequestPool`]) and never shared between
//! two identifiers at the same time; `init`/`reset` bracket each activation.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::asset::Asset;

/// Single-shot completion callback: loaded asset on success, `None` on failure.
pub type CompleteFn = Box<dyn FnOnce(Option<Asset>) + Send + 'static>;

/// Progress callback, invoked with non-decreasing fractions in [0, 1].
///
/// Shared behind `Arc<Mutex<..>>` so the fetch loop can fire it without
/// holding the scheduler lock.
pub type ProgressFn = Arc<Mutex<dyn FnMut(f32) + Send + 'static>>;

/// Wrap a closure as a [`CompleteFn`].
pub fn complete_fn<F: FnOnce(Option<Asset>) + Send + 'static>(f: F) -> CompleteFn {
    Box::new(f)
}

/// Wrap a closure as a [`ProgressFn`].
pub fn progress_fn<F: FnMut(f32) + Send + 'static>(f: F) -> ProgressFn {
    Arc::new(Mutex::new(f))
}

/// Priority of a load request. Higher priorities are admitted first.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum LoadPriority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

/// Lifecycle of a load request.
///
/// `NotStarted → Ready → InProgress → {Completed | Cancelled}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoadState {
    /// Pooled, unassigned.
    NotStarted,
    /// Initialized and waiting in the pending queue.
    Ready,
    /// Admitted, fetch underway. Progress updates accepted only here.
    InProgress,
    /// Fetch finished (success or failure reported through the completion
    /// callback).
    Completed,
    /// Cancellation requested before or during the fetch.
    Cancelled,
}

/// Cooperative cancellation signal, checked by the fetch loop at every
/// progress checkpoint.
#[derive(Clone, Debug, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Read-only snapshot of one tracked request, for diagnostics.
#[derive(Debug, Clone)]
pub struct RequestInfo {
    pub id: String,
    pub priority: LoadPriority,
    pub state: LoadState,
    pub progress: f32,
}

/// One queued or in-flight load. Mutable and poolable.
pub struct LoadRequest {
    pub(crate) id: String,
    pub(crate) priority: LoadPriority,
    pub(crate) state: LoadState,
    pub(crate) progress: f32,
    pub(crate) cancel: CancelFlag,
    pub(crate) on_complete: Option<CompleteFn>,
    pub(crate) on_progress: Option<ProgressFn>,
    /// Arrival stamp; ties in priority order are broken by earliest arrival.
    pub(crate) seq: u64,
    /// Failed fetch attempts for this identifier (drives bounded retry).
    pub(crate) attempts: u32,
}

impl LoadRequest {
    pub(crate) fn new() -> Self {
        Self {
            id: String::new(),
            priority: LoadPriority::Low,
            state: LoadState::NotStarted,
            progress: 0.0,
            cancel: CancelFlag::new(),
            on_complete: None,
            on_progress: None,
            seq: 0,
            attempts: 0,
        }
    }

    /// Activate a pooled request for `id`. Fresh cancel flag per activation.
    pub(crate) fn init(
        &mut self,
        id: String,
        on_complete: Option<CompleteFn>,
        on_progress: Option<ProgressFn>,
        priority: LoadPriority,
        seq: u64,
    ) {
        self.id = id;
        self.priority = priority;
        self.state = LoadState::Ready;
        self.progress = 0.0;
        self.cancel = CancelFlag::new();
        self.on_complete = on_complete;
        self.on_progress = on_progress;
        self.seq = seq;
        self.attempts = 0;
    }

    /// Return the request to its pooled state. Signals cancellation so any
    /// straggling observer of the old flag stops.
    pub(crate) fn reset(&mut self) {
        self.cancel.cancel();
        self.id.clear();
        self.priority = LoadPriority::Low;
        self.state = LoadState::NotStarted;
        self.progress = 0.0;
        self.cancel = CancelFlag::new();
        self.on_complete = None;
        self.on_progress = None;
        self.seq = 0;
        self.attempts = 0;
    }

    /// Raise priority; duplicate submissions never lower it.
    pub(crate) fn raise_priority(&mut self, priority: LoadPriority) -> bool {
        if priority > self.priority {
            self.priority = priority;
            true
        } else {
            false
        }
    }

    /// Rebind callbacks: last non-null wins, `None` leaves the old one bound.
    pub(crate) fn rebind(
        &mut self,
        on_complete: Option<CompleteFn>,
        on_progress: Option<ProgressFn>,
    ) {
        if on_complete.is_some() {
            self.on_complete = on_complete;
        }
        if on_progress.is_some() {
            self.on_progress = on_progress;
        }
    }

    /// Record a progress report. Clamped to [0, 1] and monotonic; accepted
    /// only while the request is in progress.
    pub(crate) fn update_progress(&mut self, value: f32) {
        if self.state == LoadState::InProgress {
            self.progress = self.progress.max(value.clamp(0.0, 1.0));
        }
    }

    pub(crate) fn info(&self) -> RequestInfo {
        RequestInfo {
            id: self.id.clone(),
            priority: self.priority,
            state: self.state,
            progress: self.progress,
        }
    }
}

impl fmt::Debug for LoadRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadRequest")
            .field("id", &self.id)
            .field("priority", &self.priority)
            .field("state", &self.state)
            .field("progress", &self.progress)
            .field("seq", &self.seq)
            .field("attempts", &self.attempts)
            .finish()
    }
}
