//! Request pool - free-list of reusable [`LoadRequest`] values
//!
//! Avoids reallocating a request per submission. This is an optimization,
//! not a correctness requirement: `acquire` falls back to a fresh allocation
//! when the pool is empty.

use crate::core::request::LoadRequest;

/// Free-list of reset requests.
#[derive(Debug, Default)]
pub struct RequestPool {
    free: Vec<LoadRequest>,
}

impl RequestPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pop a pooled request, or allocate a fresh one.
    pub fn acquire(&mut self) -> LoadRequest {
        self.free.pop().unwrap_or_else(LoadRequest::new)
    }

    /// Reset a finished request and return it to the pool.
    pub fn release(&mut self, mut request: LoadRequest) {
        request.reset();
        self.free.push(request);
    }

    /// Number of requests currently pooled.
    pub fn len(&self) -> usize {
        self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.free.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::request::{LoadPriority, LoadState};

    /// Test: acquire/release cycle
    /// Validates: released requests are reset and reused
    #[test]
    fn test_pool_reuse() {
        let mut pool = RequestPool::new();
        assert_eq!(pool.len(), 0);

        let mut req = pool.acquire();
        req.init("a".into(), None, None, LoadPriority::High, 1);
        pool.release(req);
        assert_eq!(pool.len(), 1);

        let req = pool.acquire();
        assert_eq!(pool.len(), 0);
        assert_eq!(req.state, LoadState::NotStarted);
        assert!(req.id.is_empty());
    }
}
