//! Scheduling core: requests, pooling, cache, workers, loader, controller.

pub mod adaptive;
pub mod cache;
pub mod loader;
pub mod pool;
pub mod request;
pub mod workers;

pub use adaptive::{AdaptiveController, DownloadStats};
pub use cache::AssetCache;
pub use loader::Loader;
pub use request::{
    CancelFlag, CompleteFn, LoadPriority, LoadState, ProgressFn, RequestInfo, complete_fn,
    progress_fn,
};
