//! galleria - adaptive priority asset loading
//!
//! A scheduler for fetching many assets over a constrained transport:
//! priority queue with a bounded in-flight set, LRU asset cache, cooperative
//! cancellation, and a controller that adapts the concurrency budget to
//! measured bandwidth and device performance.
//!
//! Entry points: build a [`Loader`] over a [`fetch::FetchSource`], submit
//! identifiers with [`Loader::submit`], and optionally attach an
//! [`AdaptiveController`] fed with frame times.

pub mod asset;
pub mod cli;
pub mod config;
pub mod core;
pub mod fetch;
pub mod list;

pub use asset::Asset;
pub use config::{AdaptiveConfig, LoaderConfig};
pub use core::{
    AdaptiveController, DownloadStats, Loader, LoadPriority, complete_fn, progress_fn,
};
pub use fetch::{FetchError, FetchSource, FileSource, MemorySource};
pub use list::{DirListSource, ListSource, StaticListSource};
