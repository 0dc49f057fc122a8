mod sinks;

use anyhow::{bail, Result};
use common::{AppConfig, CborSource, StatsSnapshot, WAIT_TIME};
use log::{debug, error, info, trace, warn};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

fn config_path(args: &[String]) -> PathBuf {
    args.iter()
        .position(|arg| arg == "--config")
        .and_then(|i| args.get(i + 1))
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.json"))
}

fn log_stats(stats: &StatsSnapshot) {
    info!(
        "Received {} datagrams ({} dropped, {} empty, {} undecodable, {} receive errors); \
         {} subjects, {} frames published, {} frames rejected, {} sink rejections",
        stats.datagrams_received,
        stats.datagrams_dropped,
        stats.empty_datagrams,
        stats.decode_errors,
        stats.receive_errors,
        stats.subjects_declared,
        stats.frames_published,
        stats.frames_rejected,
        stats.sink_rejections,
    );
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    info!("Starting...");
    debug!("Debug logging is active");
    trace!("Trace logging is active");

    let args: Vec<String> = std::env::args().collect();

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();

    ctrlc::set_handler(move || {
        info!("Received Ctrl-C, shutting down...");
        r.store(false, Ordering::SeqCst);
    })
    .expect("Error setting Ctrl-C handler");

    let config_path = config_path(&args);
    let config = AppConfig::load_or_create(&config_path).unwrap_or_else(|e| {
        error!("Failed to load config: {}. Using defaults.", e);
        AppConfig::default()
    });
    info!("Loaded Config: {:?}", config);

    let mut sink = sinks::create_sink(&config.output);
    if let Err(e) = sink.initialize() {
        error!("Failed to initialize animation sink: {}", e);
        return Err(e);
    }

    let mut source = CborSource::from_config(&config.source, sink)?;
    if !source.is_source_still_valid() {
        bail!(
            "CBOR source on {}: {}",
            source.endpoint(),
            source.status()
        );
    }
    info!(
        "Source {} on {}: {}",
        source.id(),
        source.endpoint(),
        source.status()
    );

    info!("Entering Main Loop (Consumer)...");

    let mut next_log: u64 = 1000;
    let mut log_interval: u64 = 1000;
    let mut last_log = Instant::now();
    let mut last_published: u64 = 0;

    while running.load(Ordering::SeqCst) {
        source.process_for(WAIT_TIME);

        if !source.is_source_still_valid() {
            warn!("CBOR source stopped unexpectedly ({})", source.status());
            break;
        }

        let stats = source.stats();
        if stats.frames_published >= next_log {
            let elapsed = last_log.elapsed().as_secs_f32();
            let fps = (stats.frames_published - last_published) as f32 / elapsed;
            info!(
                "Tracking Active: Published {} frames (approx {:.1} FPS)",
                stats.frames_published, fps
            );
            if stats.datagrams_dropped > 0 || stats.decode_errors > 0 || stats.frames_rejected > 0 {
                log_stats(&stats);
            }
            last_log = Instant::now();
            last_published = stats.frames_published;

            if stats.frames_published >= 1_000_000 {
                log_interval = 1_000_000;
            } else if stats.frames_published >= 100_000 {
                log_interval = 100_000;
            } else if stats.frames_published >= 10_000 {
                log_interval = 10_000;
            }
            next_log = stats.frames_published + log_interval;
        }
    }

    info!("Shutting down...");
    source.shutdown();
    source.process_pending();
    log_stats(&source.stats());
    Ok(())
}
