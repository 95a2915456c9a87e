//! Priority load scheduler
//!
//! **Why**: callers submit many more identifiers than the transport should
//! ever carry at once. The loader keeps a priority-ordered pending queue and
//! a bounded in-flight set, serves repeats straight from the cache, and
//! recycles request records through a pool.
//!
//! **Used by**: the demo binary and the adaptive controller. Clone handles
//! freely; all clones share one scheduler.
//!
//! Admission rules:
//! - pending is drained highest priority first, ties by earliest arrival
//! - Low entries may hold at most `max_concurrent / 2` in-flight slots, so
//!   background warming never crowds out interactive loads (at a budget of 1
//!   that cap is 0 and Lows wait for a bigger budget)
//! - the queue itself is bounded; overflow evicts the lowest-priority,
//!   earliest-arrival entry, which may be the newcomer
//!
//! User callbacks always run outside the scheduler lock, so a completion
//! handler may re-enter `submit`/`cancel` safely.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use crate::asset::Asset;
use crate::config::LoaderConfig;
use crate::core::adaptive::DownloadStats;
use crate::core::cache::AssetCache;
use crate::core::pool::RequestPool;
use crate::core::request::{
    CancelFlag, CompleteFn, LoadPriority, LoadRequest, LoadState, ProgressFn, RequestInfo,
};
use crate::core::workers::Workers;
use crate::fetch::{FetchError, FetchSource};

/// Scheduler state behind the lock. `tracked` mirrors the identifiers in
/// `pending` plus the keys of `in_flight`, giving O(1) duplicate detection.
struct LoaderInner {
    pending: Vec<LoadRequest>,
    in_flight: HashMap<String, LoadRequest>,
    tracked: HashSet<String>,
    pool: RequestPool,
    max_concurrent: usize,
    max_queue_size: usize,
    max_retries: u32,
    next_seq: u64,
}

/// Handle to one shared load scheduler.
#[derive(Clone)]
pub struct Loader {
    inner: Arc<Mutex<LoaderInner>>,
    cache: Arc<AssetCache>,
    workers: Arc<Workers>,
    source: Arc<dyn FetchSource>,
    stats: Arc<DownloadStats>,
}

/// Request admitted to the in-flight set; what a worker job needs.
struct Admitted {
    id: String,
    cancel: CancelFlag,
}

fn deliver(cb: Option<CompleteFn>, asset: Option<Asset>) {
    if let Some(cb) = cb {
        cb(asset);
    }
}

impl Loader {
    pub fn new(source: Arc<dyn FetchSource>, config: &LoaderConfig) -> Self {
        // enough workers to saturate the largest budget the controller can set
        let threads = config.adaptive.max_budget.max(config.max_concurrent).max(1);
        info!(
            "loader: budget {}, queue bound {}, cache {} entries, {} workers",
            config.max_concurrent, config.max_queue_size, config.cache_capacity, threads
        );
        Self {
            inner: Arc::new(Mutex::new(LoaderInner {
                pending: Vec::new(),
                in_flight: HashMap::new(),
                tracked: HashSet::new(),
                pool: RequestPool::new(),
                max_concurrent: config.max_concurrent.max(1),
                max_queue_size: config.max_queue_size.max(1),
                max_retries: config.max_retries,
                next_seq: 0,
            })),
            cache: Arc::new(AssetCache::new(config.cache_capacity)),
            workers: Arc::new(Workers::new(threads)),
            source,
            stats: Arc::new(DownloadStats::new()),
        }
    }

    /// Queue a load. Cache hits complete synchronously, before this returns.
    ///
    /// A repeated identifier merges into the existing request instead of
    /// queuing twice: priority is raised (never lowered) and any callbacks
    /// given here replace the previously bound ones.
    ///
    /// A full pending queue evicts its lowest-priority earliest-arrival
    /// entry to make room; a newcomer ranking strictly below every pending
    /// entry is itself refused, surfacing as a `None` completion.
    pub fn submit(
        &self,
        id: &str,
        priority: LoadPriority,
        on_complete: Option<CompleteFn>,
        on_progress: Option<ProgressFn>,
    ) {
        if id.trim().is_empty() {
            warn!("rejecting blank identifier");
            deliver(on_complete, None);
            return;
        }
        if let Some(asset) = self.cache.get(id) {
            debug!("cache hit: {}", id);
            if let Some(cb) = on_progress {
                (cb.lock().unwrap())(1.0);
            }
            deliver(on_complete, Some(asset));
            return;
        }

        let mut evicted_cb: Option<CompleteFn> = None;
        {
            let mut inner = self.inner.lock().unwrap();

            if inner.tracked.contains(id) {
                if let Some(req) = inner.in_flight.get_mut(id) {
                    req.raise_priority(priority);
                    req.rebind(on_complete, on_progress);
                } else if let Some(req) = inner.pending.iter_mut().find(|r| r.id == id) {
                    if req.raise_priority(priority) {
                        debug!("raised pending {} to {:?}", id, priority);
                    }
                    req.rebind(on_complete, on_progress);
                }
                drop(inner);
                // a raised entry may now clear the low-priority cap, and with
                // nothing in flight no completion will pump the queue for us
                self.pump();
                return;
            }

            if inner.pending.len() >= inner.max_queue_size {
                // victim: lowest priority, earliest arrival, the newcomer
                // included (it carries the latest arrival stamp)
                let victim_idx = inner
                    .pending
                    .iter()
                    .enumerate()
                    .min_by(|(_, a), (_, b)| a.priority.cmp(&b.priority).then(a.seq.cmp(&b.seq)))
                    .map(|(i, _)| i);
                match victim_idx {
                    Some(i) if priority >= inner.pending[i].priority => {
                        let mut victim = inner.pending.remove(i);
                        inner.tracked.remove(&victim.id);
                        warn!("queue full, evicting {:?} {}", victim.priority, victim.id);
                        victim.cancel.cancel();
                        victim.state = LoadState::Cancelled;
                        evicted_cb = victim.on_complete.take();
                        inner.pool.release(victim);
                    }
                    _ => {
                        drop(inner);
                        warn!("queue full, rejecting {:?} {}", priority, id);
                        deliver(on_complete, None);
                        return;
                    }
                }
            }

            let seq = inner.next_seq;
            inner.next_seq += 1;
            let mut req = inner.pool.acquire();
            req.init(id.to_string(), on_complete, on_progress, priority, seq);
            inner.tracked.insert(id.to_string());
            inner.pending.push(req);
            debug!("queued {:?} {} (pending {})", priority, id, inner.pending.len());
        }
        deliver(evicted_cb, None);
        self.pump();
    }

    /// Queue identifiers for cache warming at Low priority, skipping any
    /// that are already cached.
    pub fn submit_background<I, S>(&self, ids: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for id in ids {
            let id = id.as_ref();
            if !self.cache.contains(id) {
                self.submit(id, LoadPriority::Low, None, None);
            }
        }
    }

    /// Cancel one tracked load. A pending entry is removed and recycled
    /// immediately; an in-flight one is flagged and stops at its next
    /// progress checkpoint. A bound completion callback observes `None`.
    /// Returns false when the identifier is not tracked.
    pub fn cancel(&self, id: &str) -> bool {
        let cb;
        {
            let mut inner = self.inner.lock().unwrap();
            if let Some(i) = inner.pending.iter().position(|r| r.id == id) {
                let mut req = inner.pending.remove(i);
                inner.tracked.remove(id);
                req.cancel.cancel();
                req.state = LoadState::Cancelled;
                cb = req.on_complete.take();
                inner.pool.release(req);
                debug!("cancelled pending: {}", id);
            } else if let Some(req) = inner.in_flight.get_mut(id) {
                req.cancel.cancel();
                req.state = LoadState::Cancelled;
                // callback fires when the fetch winds down
                cb = None;
                debug!("cancelled in-flight: {}", id);
            } else {
                return false;
            }
        }
        deliver(cb, None);
        true
    }

    /// Cancel everything. Idempotent; every bound completion callback
    /// observes `None` exactly once.
    pub fn cancel_all(&self) {
        let mut cbs = Vec::new();
        {
            let mut inner = self.inner.lock().unwrap();
            let drained = std::mem::take(&mut inner.pending);
            let n = drained.len();
            for mut req in drained {
                inner.tracked.remove(&req.id);
                req.cancel.cancel();
                req.state = LoadState::Cancelled;
                if let Some(cb) = req.on_complete.take() {
                    cbs.push(cb);
                }
                inner.pool.release(req);
            }
            // in-flight entries stay in the map (and in `tracked`) until
            // their fetches observe the flag and wind down
            for req in inner.in_flight.values_mut() {
                req.cancel.cancel();
                req.state = LoadState::Cancelled;
                if let Some(cb) = req.on_complete.take() {
                    cbs.push(cb);
                }
            }
            if n + inner.in_flight.len() > 0 {
                info!("cancel_all: {} pending, {} in flight", n, inner.in_flight.len());
            }
        }
        for cb in cbs {
            cb(None);
        }
    }

    /// Move the in-flight budget (floored at 1) and admit whatever now fits.
    pub fn set_max_concurrent(&self, budget: usize) {
        {
            let mut inner = self.inner.lock().unwrap();
            let budget = budget.max(1);
            if budget == inner.max_concurrent {
                return;
            }
            info!("in-flight budget: {} -> {}", inner.max_concurrent, budget);
            inner.max_concurrent = budget;
        }
        self.pump();
    }

    pub fn max_concurrent(&self) -> usize {
        self.inner.lock().unwrap().max_concurrent
    }

    /// Snapshot of every tracked request, in-flight first.
    pub fn active_requests(&self) -> Vec<RequestInfo> {
        let inner = self.inner.lock().unwrap();
        inner
            .in_flight
            .values()
            .map(|r| r.info())
            .chain(inner.pending.iter().map(|r| r.info()))
            .collect()
    }

    pub fn pending_len(&self) -> usize {
        self.inner.lock().unwrap().pending.len()
    }

    pub fn in_flight_len(&self) -> usize {
        self.inner.lock().unwrap().in_flight.len()
    }

    pub fn is_idle(&self) -> bool {
        let inner = self.inner.lock().unwrap();
        inner.pending.is_empty() && inner.in_flight.is_empty()
    }

    pub fn cache(&self) -> &AssetCache {
        &self.cache
    }

    pub fn stats(&self) -> Arc<DownloadStats> {
        self.stats.clone()
    }

    /// Admit pending requests into free slots and hand them to workers.
    fn pump(&self) {
        let admitted = {
            let mut inner = self.inner.lock().unwrap();
            Self::admit(&mut inner)
        };
        for adm in admitted {
            let loader = self.clone();
            self.workers
                .execute(move || loader.run_fetch(adm.id, adm.cancel));
        }
    }

    fn admit(inner: &mut LoaderInner) -> Vec<Admitted> {
        let mut admitted = Vec::new();
        if inner.pending.is_empty() || inner.in_flight.len() >= inner.max_concurrent {
            return admitted;
        }
        inner
            .pending
            .sort_by(|a, b| b.priority.cmp(&a.priority).then(a.seq.cmp(&b.seq)));

        let low_cap = inner.max_concurrent / 2;
        let mut lows = inner
            .in_flight
            .values()
            .filter(|r| r.priority == LoadPriority::Low)
            .count();
        let mut picked = Vec::new();
        for (i, req) in inner.pending.iter().enumerate() {
            if inner.in_flight.len() + picked.len() >= inner.max_concurrent {
                break;
            }
            if req.priority == LoadPriority::Low {
                if lows >= low_cap {
                    continue;
                }
                lows += 1;
            }
            picked.push(i);
        }
        for &i in picked.iter().rev() {
            let mut req = inner.pending.remove(i);
            debug_assert!(!inner.in_flight.contains_key(&req.id));
            req.state = LoadState::InProgress;
            debug!("admit {:?} {}", req.priority, req.id);
            admitted.push(Admitted {
                id: req.id.clone(),
                cancel: req.cancel.clone(),
            });
            inner.in_flight.insert(req.id.clone(), req);
        }
        admitted.reverse();
        admitted
    }

    /// Worker-thread body for one admitted request.
    fn run_fetch(&self, id: String, cancel: CancelFlag) {
        let started = Instant::now();
        let mut sink = |frac: f32| -> bool {
            if cancel.is_cancelled() {
                return false;
            }
            self.report_progress(&id, frac);
            true
        };
        let result = self.source.fetch(&id, &mut sink);
        let elapsed = started.elapsed();
        self.finish_fetch(id, cancel, result, elapsed);
    }

    fn report_progress(&self, id: &str, frac: f32) {
        let report = {
            let mut inner = self.inner.lock().unwrap();
            match inner.in_flight.get_mut(id) {
                Some(req) => {
                    req.update_progress(frac);
                    req.on_progress.clone().map(|cb| (cb, req.progress))
                }
                None => None,
            }
        };
        if let Some((cb, frac)) = report {
            (cb.lock().unwrap())(frac);
        }
    }

    fn finish_fetch(
        &self,
        id: String,
        cancel: CancelFlag,
        result: Result<Vec<u8>, FetchError>,
        elapsed: Duration,
    ) {
        let mut inner = self.inner.lock().unwrap();
        let Some(mut req) = inner.in_flight.remove(&id) else {
            return;
        };
        inner.tracked.remove(&id);

        match result {
            Ok(bytes) => {
                let was_cancelled = cancel.is_cancelled() || req.state == LoadState::Cancelled;
                req.state = if was_cancelled {
                    LoadState::Cancelled
                } else {
                    LoadState::Completed
                };
                let cb = req.on_complete.take();
                inner.pool.release(req);
                drop(inner);
                self.stats.note(bytes.len() as u64, elapsed);
                if was_cancelled {
                    debug!("fetch finished after cancel, dropping result: {}", id);
                    deliver(cb, None);
                } else {
                    let asset = Asset::new(bytes);
                    // cache insert strictly precedes the completion callback,
                    // so a resubmit from inside the callback hits the cache
                    self.cache.put(&id, asset.clone());
                    debug!("loaded {} ({} bytes in {:?})", id, asset.len(), elapsed);
                    deliver(cb, Some(asset));
                }
            }
            Err(FetchError::Cancelled(_)) => {
                req.state = LoadState::Cancelled;
                let cb = req.on_complete.take();
                inner.pool.release(req);
                drop(inner);
                debug!("fetch cancelled: {}", id);
                deliver(cb, None);
            }
            Err(err) => {
                let retry = !err.is_permanent()
                    && !cancel.is_cancelled()
                    && req.state != LoadState::Cancelled
                    && req.attempts < inner.max_retries
                    && !inner.tracked.contains(&id);
                if retry {
                    req.attempts += 1;
                    warn!(
                        "fetch failed: {} ({}), retry {}/{}",
                        id, err, req.attempts, inner.max_retries
                    );
                    req.state = LoadState::Ready;
                    req.progress = 0.0;
                    req.cancel = CancelFlag::new();
                    inner.tracked.insert(id.clone());
                    inner.pending.push(req);
                    drop(inner);
                    self.stats.note(0, elapsed);
                } else {
                    warn!("fetch failed: {} ({}), giving up", id, err);
                    // failure is a completion, not a cancellation
                    req.state = LoadState::Completed;
                    let cb = req.on_complete.take();
                    inner.pool.release(req);
                    drop(inner);
                    self.stats.note(0, elapsed);
                    deliver(cb, None);
                }
            }
        }
        self.pump();
    }
}
