//! Adaptive in-flight budget controller
//!
//! **Why**: a fixed concurrency budget is wrong on both ends. On a fast
//! link with a fast device it underuses the transport; on a slow device it
//! floods the frame loop with decode and callback work. The controller
//! periodically reads two signals and nudges the loader's budget by one:
//!
//! - bandwidth: cumulative Mbps over every completed fetch
//! - device performance: inverse of the average frame time reported since
//!   the last evaluation (60 fps reads as 60.0)
//!
//! Both signals good raises the budget by one, either signal bad lowers it
//! by one, and the band in between holds steady so the budget does not
//! oscillate around a threshold. An evaluation with no data at all (no
//! fetches, no frames yet) changes nothing.
//!
//! **Used by**: the demo binary. `tick_now` exposes one evaluation step for
//! deterministic use without the monitor thread.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use crossbeam_channel::{Sender, bounded};
use log::{debug, info, warn};

use crate::config::AdaptiveConfig;
use crate::core::loader::Loader;

const BYTES_PER_SEC_PER_MBPS: f64 = 125_000.0;

/// Cumulative transfer counters, updated by the loader per finished fetch.
#[derive(Debug, Default)]
pub struct DownloadStats {
    total_bytes: AtomicU64,
    total_micros: AtomicU64,
}

impl DownloadStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one finished fetch (failed fetches count their elapsed time
    /// with zero bytes, dragging the estimate down).
    pub fn note(&self, bytes: u64, elapsed: Duration) {
        self.total_bytes.fetch_add(bytes, Ordering::Relaxed);
        self.total_micros
            .fetch_add(elapsed.as_micros() as u64, Ordering::Relaxed);
    }

    pub fn total_bytes(&self) -> u64 {
        self.total_bytes.load(Ordering::Relaxed)
    }

    /// Cumulative bandwidth estimate in Mbps; 0.0 until any fetch finishes.
    pub fn mbps(&self) -> f64 {
        let micros = self.total_micros.load(Ordering::Relaxed);
        if micros == 0 {
            return 0.0;
        }
        let bytes = self.total_bytes.load(Ordering::Relaxed) as f64;
        let secs = micros as f64 / 1_000_000.0;
        bytes / secs / BYTES_PER_SEC_PER_MBPS
    }
}

struct Shared {
    loader: Loader,
    stats: Arc<DownloadStats>,
    cfg: AdaptiveConfig,
    /// Frame time accumulator since the last evaluation.
    frame_micros: AtomicU64,
    frame_count: AtomicU64,
    /// Performance estimate carried across evaluations with no frames.
    last_perf: Mutex<f64>,
}

impl Shared {
    /// One evaluation step: read the signals, move the budget by at most one.
    fn tick(&self) {
        let mbps = self.stats.mbps();

        let micros = self.frame_micros.swap(0, Ordering::Relaxed);
        let frames = self.frame_count.swap(0, Ordering::Relaxed);
        let perf = if frames > 0 {
            let avg_secs = micros as f64 / frames as f64 / 1_000_000.0;
            let perf = if avg_secs > 0.0 { 1.0 / avg_secs } else { 0.0 };
            *self.last_perf.lock().unwrap() = perf;
            perf
        } else {
            *self.last_perf.lock().unwrap()
        };

        if mbps == 0.0 && perf == 0.0 {
            debug!("adaptive: no signal yet, holding");
            return;
        }

        let budget = self.loader.max_concurrent();
        let next = if mbps > self.cfg.high_mbps && perf > self.cfg.high_perf {
            (budget + 1).min(self.cfg.max_budget)
        } else if mbps < self.cfg.low_mbps || perf < self.cfg.low_perf {
            budget.saturating_sub(1).max(self.cfg.min_concurrent)
        } else {
            budget
        };

        debug!(
            "adaptive: {:.2} Mbps, perf {:.1}, budget {} -> {}",
            mbps, perf, budget, next
        );
        if next != budget {
            self.loader.set_max_concurrent(next);
        }
    }
}

/// Periodic budget controller. Evaluates on its own monitor thread once
/// started, or step by step through [`tick_now`](Self::tick_now).
pub struct AdaptiveController {
    shared: Arc<Shared>,
    stop_tx: Option<Sender<()>>,
    monitor: Option<thread::JoinHandle<()>>,
}

impl AdaptiveController {
    pub fn new(loader: Loader, cfg: AdaptiveConfig) -> Self {
        let stats = loader.stats();
        Self {
            shared: Arc::new(Shared {
                loader,
                stats,
                cfg,
                frame_micros: AtomicU64::new(0),
                frame_count: AtomicU64::new(0),
                last_perf: Mutex::new(0.0),
            }),
            stop_tx: None,
            monitor: None,
        }
    }

    /// Spawn the monitor thread, evaluating every `interval_secs`.
    pub fn spawn_monitor(&mut self) {
        if self.monitor.is_some() {
            return;
        }
        let interval = Duration::from_secs_f32(self.shared.cfg.interval_secs.max(0.01));
        let (tx, rx) = bounded::<()>(1);
        let shared = self.shared.clone();
        let handle = thread::Builder::new()
            .name("galleria-adaptive".into())
            .spawn(move || {
                info!("adaptive monitor started ({:?} interval)", interval);
                loop {
                    match rx.recv_timeout(interval) {
                        Err(crossbeam_channel::RecvTimeoutError::Timeout) => shared.tick(),
                        _ => break,
                    }
                }
                info!("adaptive monitor stopped");
            })
            .expect("failed to spawn adaptive monitor");
        self.stop_tx = Some(tx);
        self.monitor = Some(handle);
    }

    /// Record one rendered frame. Cheap enough for a per-frame call site.
    pub fn note_frame(&self, frame_time: Duration) {
        self.shared
            .frame_micros
            .fetch_add(frame_time.as_micros() as u64, Ordering::Relaxed);
        self.shared.frame_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Run one evaluation immediately.
    pub fn tick_now(&self) {
        self.shared.tick();
    }

    /// Stop and join the monitor thread.
    pub fn shutdown(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.monitor.take() {
            if handle.join().is_err() {
                warn!("adaptive monitor panicked");
            }
        }
    }
}

impl Drop for AdaptiveController {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LoaderConfig;
    use crate::fetch::MemorySource;

    fn controller(start_budget: usize) -> AdaptiveController {
        let cfg = LoaderConfig {
            max_concurrent: start_budget,
            ..LoaderConfig::default()
        };
        let loader = Loader::new(Arc::new(MemorySource::new()), &cfg);
        AdaptiveController::new(loader, cfg.adaptive)
    }

    fn fast_frames(ctl: &AdaptiveController, n: usize) {
        for _ in 0..n {
            // ~100 fps
            ctl.note_frame(Duration::from_millis(10));
        }
    }

    fn slow_frames(ctl: &AdaptiveController, n: usize) {
        for _ in 0..n {
            // ~25 fps
            ctl.note_frame(Duration::from_millis(40));
        }
    }

    /// Test: bandwidth estimate
    /// Validates: 1 MB in one second reads as 8 Mbps, zero before any data
    #[test]
    fn test_stats_mbps() {
        let stats = DownloadStats::new();
        assert_eq!(stats.mbps(), 0.0);
        stats.note(1_000_000, Duration::from_secs(1));
        assert!((stats.mbps() - 8.0).abs() < 1e-6);
        assert_eq!(stats.total_bytes(), 1_000_000);
    }

    /// Test: ramp up to the ceiling
    /// Validates: both signals good adds one per evaluation, capped at 10
    #[test]
    fn test_ramps_up_to_ceiling() {
        let ctl = controller(3);
        // plenty of bandwidth: 10 MB over one second = 80 Mbps
        ctl.shared.stats.note(10_000_000, Duration::from_secs(1));

        for expected in [4, 5, 6, 7, 8, 9, 10, 10] {
            fast_frames(&ctl, 30);
            ctl.tick_now();
            assert_eq!(ctl.shared.loader.max_concurrent(), expected);
        }
    }

    /// Test: back off to the floor
    /// Validates: a bad signal subtracts one per evaluation, floored at 1
    #[test]
    fn test_backs_off_to_floor() {
        let ctl = controller(3);
        // starved link: 10 KB over one second
        ctl.shared.stats.note(10_000, Duration::from_secs(1));

        for expected in [2, 1, 1] {
            fast_frames(&ctl, 30);
            ctl.tick_now();
            assert_eq!(ctl.shared.loader.max_concurrent(), expected);
        }
    }

    /// Test: slow device overrides good bandwidth
    /// Validates: either signal below its low threshold shrinks the budget
    #[test]
    fn test_slow_device_shrinks_budget() {
        let ctl = controller(5);
        ctl.shared.stats.note(10_000_000, Duration::from_secs(1));
        slow_frames(&ctl, 30);
        ctl.tick_now();
        assert_eq!(ctl.shared.loader.max_concurrent(), 4);
    }

    /// Test: hysteresis band
    /// Validates: signals between the thresholds hold the budget steady
    #[test]
    fn test_band_holds_budget() {
        let ctl = controller(3);
        // 4 Mbps sits between low (2) and high (6)
        ctl.shared.stats.note(500_000, Duration::from_secs(1));
        // ~60 fps sits between low (50) and high (75)
        for _ in 0..30 {
            ctl.note_frame(Duration::from_micros(16_667));
        }
        ctl.tick_now();
        assert_eq!(ctl.shared.loader.max_concurrent(), 3);
    }

    /// Test: exact high threshold
    /// Validates: a signal sitting exactly on the grow threshold holds
    #[test]
    fn test_exact_high_threshold_holds() {
        let ctl = controller(3);
        // 750 KB over one second is exactly 6.0 Mbps
        ctl.shared.stats.note(750_000, Duration::from_secs(1));
        fast_frames(&ctl, 30);
        ctl.tick_now();
        assert_eq!(ctl.shared.loader.max_concurrent(), 3);
    }

    /// Test: no signal
    /// Validates: an evaluation before any fetch or frame changes nothing
    #[test]
    fn test_no_signal_holds() {
        let ctl = controller(3);
        ctl.tick_now();
        assert_eq!(ctl.shared.loader.max_concurrent(), 3);
    }

    /// Test: performance estimate persistence
    /// Validates: an evaluation without frames reuses the last estimate
    #[test]
    fn test_perf_carries_across_quiet_intervals() {
        let ctl = controller(3);
        ctl.shared.stats.note(10_000_000, Duration::from_secs(1));
        fast_frames(&ctl, 30);
        ctl.tick_now();
        assert_eq!(ctl.shared.loader.max_concurrent(), 4);
        // no frames this interval; the stored 100 fps still applies
        ctl.tick_now();
        assert_eq!(ctl.shared.loader.max_concurrent(), 5);
    }

    /// Test: monitor lifecycle
    /// Validates: spawn and shutdown join cleanly
    #[test]
    fn test_monitor_shutdown() {
        let mut ctl = controller(3);
        ctl.spawn_monitor();
        ctl.shutdown();
        assert!(ctl.monitor.is_none());
    }
}
