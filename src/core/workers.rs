//! Worker pool for fetch execution
//!
//! Uses a crossbeam MPMC channel feeding a fixed set of named threads.
//! Each admitted request runs as one job so fetches never block the
//! scheduler; cancellation is handled per request by the loader, not here.

use std::thread;

use crossbeam_channel::{Sender, unbounded};
use log::{debug, error};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Fixed pool of worker threads executing boxed jobs.
pub struct Workers {
    sender: Sender<Job>,
    _handles: Vec<thread::JoinHandle<()>>, // keep handles alive with the pool
}

impl Workers {
    /// Spawn `num_threads` workers (clamped to at least one).
    pub fn new(num_threads: usize) -> Self {
        let num_threads = num_threads.max(1);
        let (tx, rx): (Sender<Job>, _) = unbounded();
        let mut handles = Vec::with_capacity(num_threads);

        for worker_id in 0..num_threads {
            let rx = rx.clone();
            let handle = thread::Builder::new()
                .name(format!("galleria-worker-{}", worker_id))
                .spawn(move || {
                    debug!("worker {} started", worker_id);
                    while let Ok(job) = rx.recv() {
                        job();
                    }
                    debug!("worker {} stopped", worker_id);
                })
                .expect("failed to spawn worker thread");
            handles.push(handle);
        }

        debug!("workers initialized: {} threads", num_threads);
        Self {
            sender: tx,
            _handles: handles,
        }
    }

    /// Run a closure on a worker thread.
    pub fn execute<F>(&self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if let Err(e) = self.sender.send(Box::new(f)) {
            error!("failed to enqueue job: {}", e);
        }
    }
}

impl Drop for Workers {
    fn drop(&mut self) {
        debug!("workers shutting down ({} threads)", self._handles.len());
        // Sender drops, channel closes, workers exit their recv() loop
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::bounded;

    /// Test: jobs execute on worker threads
    /// Validates: every enqueued closure runs exactly once
    #[test]
    fn test_workers_execute_jobs() {
        let workers = Workers::new(2);
        let (tx, rx) = bounded(8);

        for i in 0..8 {
            let tx = tx.clone();
            workers.execute(move || {
                tx.send(i).unwrap();
            });
        }

        let mut seen: Vec<i32> = (0..8).map(|_| rx.recv().unwrap()).collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..8).collect::<Vec<_>>());
    }
}
