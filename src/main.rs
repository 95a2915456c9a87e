//! Demo binary: load a directory of assets through the adaptive scheduler.
//!
//! Lists identifiers with a glob, loads any `--hot` ids at High priority,
//! warms the rest at Low, and drives the adaptive controller with synthetic
//! frame times until everything settles.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use clap::Parser;
use crossbeam_channel::bounded;
use log::info;

use galleria::cli::Cli;
use galleria::config::LoaderConfig;
use galleria::core::{AdaptiveController, LoadPriority, Loader, complete_fn};
use galleria::fetch::FileSource;
use galleria::list::{DirListSource, ListSource};

const FRAME: Duration = Duration::from_millis(16);
const REPORT_EVERY: Duration = Duration::from_secs(2);

fn main() -> Result<()> {
    let cli = Cli::parse();
    env_logger::Builder::new()
        .filter_level(cli.log_level())
        .init();

    if !cli.dir.is_dir() {
        bail!("not a directory: {}", cli.dir.display());
    }

    let mut config = match &cli.config {
        Some(path) => LoaderConfig::load(path)
            .map_err(|e| anyhow::anyhow!("loading config {}: {}", path.display(), e))?,
        None => LoaderConfig::default(),
    };
    if let Some(concurrent) = cli.concurrent {
        config.max_concurrent = concurrent.max(1);
    }

    let source = Arc::new(FileSource::new(&cli.dir));
    let loader = Loader::new(source, &config);
    let mut controller = AdaptiveController::new(loader.clone(), config.adaptive.clone());
    if !cli.no_adaptive {
        controller.spawn_monitor();
    }

    let (list_tx, list_rx) = bounded(1);
    DirListSource::new(&cli.dir, &cli.pattern).load_list(Box::new(move |ids| {
        let _ = list_tx.send(ids);
    }));
    let ids = list_rx.recv().context("identifier listing failed")?;
    if ids.is_empty() {
        bail!("no assets match {} under {}", cli.pattern, cli.dir.display());
    }
    info!("{} assets found", ids.len());

    for id in &cli.hot {
        let id_for_log = id.clone();
        loader.submit(
            id,
            LoadPriority::High,
            Some(complete_fn(move |asset| match asset {
                Some(asset) => info!("hot {}: {} bytes", id_for_log, asset.len()),
                None => info!("hot {}: failed", id_for_log),
            })),
            None,
        );
    }
    loader.submit_background(&ids);

    // synthetic frame loop; real hosts call note_frame from their render loop
    let started = Instant::now();
    let mut last_report = Instant::now();
    while !loader.is_idle() {
        let frame_start = Instant::now();
        std::thread::sleep(FRAME);
        controller.note_frame(frame_start.elapsed());

        if last_report.elapsed() >= REPORT_EVERY {
            last_report = Instant::now();
            let stats = loader.stats();
            info!(
                "pending {}, in flight {}, cached {}, {:.2} Mbps, budget {}",
                loader.pending_len(),
                loader.in_flight_len(),
                loader.cache().len(),
                stats.mbps(),
                loader.max_concurrent()
            );
        }
    }
    controller.shutdown();

    let stats = loader.stats();
    info!(
        "done: {} assets cached, {} bytes in {:.1}s, {:.2} Mbps, final budget {}",
        loader.cache().len(),
        stats.total_bytes(),
        started.elapsed().as_secs_f32(),
        stats.mbps(),
        loader.max_concurrent()
    );
    Ok(())
}
