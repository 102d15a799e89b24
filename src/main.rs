//! ocr-relay - Cached, queued text recognition
//!
//! Submits images through a content-addressed result cache backed by a
//! single-worker recognition queue. Repeated submissions of identical
//! pixel content resolve from the cache without touching the engine.

mod cache;
mod config;
mod dispatch;
mod engine;
mod fingerprint;
mod frame;
mod relay;
mod storage;

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{Level, debug, info, warn};
use tracing_subscriber::FmtSubscriber;

use crate::cache::ResultCache;
use crate::config::AppConfig;
use crate::dispatch::MainLoopDispatcher;
use crate::engine::{EngineError, Recognition, TesseractCli};
use crate::frame::Frame;
use crate::relay::{OcrRelay, RelayEvent, Submission};

/// ocr-relay - Cached, queued text recognition
#[derive(Parser, Debug)]
#[command(name = "ocr-relay")]
#[command(about = "Recognize text in images through a content-addressed result cache")]
struct Args {
    /// Image files to recognize, in submission order
    images: Vec<PathBuf>,

    /// Disable the result cache for this run
    #[arg(long)]
    no_cache: bool,

    /// Delete the persisted cache store before doing anything else
    #[arg(long)]
    clear_cache: bool,

    /// Directory for the cache store (defaults to the app data dir)
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Recognition language passed to the engine
    #[arg(long)]
    language: Option<String>,

    /// Tesseract binary name or path
    #[arg(long)]
    tesseract_bin: Option<String>,

    /// Per-request engine deadline in seconds
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Print per-word bounding boxes
    #[arg(long)]
    boxes: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();

    info!("ocr-relay starting...");

    // Load or create configuration, then apply CLI overrides
    let mut config = load_or_create_config();
    if args.no_cache {
        config.cache.enabled = false;
    }
    if let Some(dir) = &args.data_dir {
        config.cache.directory = Some(dir.clone());
    }
    if let Some(language) = &args.language {
        config.engine.language = language.clone();
    }
    if let Some(binary) = &args.tesseract_bin {
        config.engine.binary = binary.clone();
    }
    if let Some(timeout_secs) = args.timeout_secs {
        config.engine.timeout_secs = timeout_secs;
    }

    let cache_dir = match &config.cache.directory {
        Some(dir) => dir.clone(),
        None => storage::get_data_dir()?,
    };

    let mut cache = ResultCache::open(&cache_dir, config.cache.enabled);
    if args.clear_cache {
        cache.clear();
        info!("Cache store cleared");
        if args.images.is_empty() {
            return Ok(());
        }
    }

    // Probe the engine; cache hits keep working even when this fails
    let engine = Arc::new(TesseractCli::new(&config.engine));
    match engine.init().await {
        Ok(version) => info!("Recognition engine: {}", version),
        Err(e) => warn!("Recognition engine unavailable: {}", e),
    }

    let relay = OcrRelay::new(engine, cache);

    if args.images.is_empty() {
        info!("No images given; nothing to do");
        return Ok(());
    }

    // Log completions from the broadcast side
    tokio::spawn(log_relay_events(relay.subscribe()));

    run_batch(&relay, &args).await;

    relay.close();
    relay.wait_idle().await;
    info!("Done: {} results in cache", relay.cache_len());

    Ok(())
}

/// Load configuration from file or create default
fn load_or_create_config() -> AppConfig {
    if let Ok(config_dir) = storage::get_config_dir() {
        let config_path = config_dir.join("config.toml");
        if config_path.exists() {
            if let Ok(config) = config::load_config(&config_path) {
                info!("Loaded configuration from {:?}", config_path);
                return config;
            }
        }
    }
    info!("Using default configuration");
    AppConfig::default()
}

/// Log relay completions until the relay shuts down. A logger that
/// falls behind skips the overwritten events and keeps receiving;
/// returns how many events it saw.
async fn log_relay_events(mut events: broadcast::Receiver<RelayEvent>) -> usize {
    let mut seen = 0;
    loop {
        match events.recv().await {
            Ok(RelayEvent::Completed {
                fingerprint,
                from_cache,
                ..
            }) => {
                seen += 1;
                debug!("Completed {} (from cache: {})", fingerprint, from_cache);
            }
            Ok(RelayEvent::Failed { fingerprint, error }) => {
                seen += 1;
                debug!("Failed {}: {}", fingerprint, error);
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                debug!("Event log fell behind; skipped {} events", skipped);
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
    seen
}

/// Submit every image, then tick the dispatcher until every outcome
/// has been printed
async fn run_batch(relay: &OcrRelay, args: &Args) {
    let dispatcher = MainLoopDispatcher::new();
    let outstanding = Arc::new(AtomicUsize::new(0));

    for path in &args.images {
        let frame = match Frame::load(path) {
            Ok(frame) => frame,
            Err(e) => {
                warn!("Skipping {:?}: {}", path, e);
                continue;
            }
        };

        let source = path.display().to_string();
        let show_boxes = args.boxes;
        let handle = dispatcher.handle();
        let done = outstanding.clone();
        outstanding.fetch_add(1, Ordering::SeqCst);

        let submission = relay.recognize(frame, move |result| {
            // Hop the outcome onto the tick loop below
            handle.dispatch(move || {
                print_outcome(&source, &result, show_boxes);
                done.fetch_sub(1, Ordering::SeqCst);
            });
        });

        match submission {
            Ok(Submission::CacheHit) => debug!("{:?} answered from cache", path),
            Ok(Submission::Queued { depth }) if depth > 0 => {
                debug!("{:?} queued behind {} others", path, depth)
            }
            Ok(_) => {}
            Err(e) => {
                warn!("Submission rejected for {:?}: {}", path, e);
                outstanding.fetch_sub(1, Ordering::SeqCst);
            }
        }
    }

    // Completions arrive on the drain task; run them here one tick at
    // a time, the way a render loop would.
    loop {
        dispatcher.drain();
        if outstanding.load(Ordering::SeqCst) == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Print one recognition outcome
fn print_outcome(source: &str, result: &Result<Recognition, EngineError>, show_boxes: bool) {
    match result {
        Ok(recognition) if recognition.full_text.is_empty() => {
            println!("{source}: (no text found)");
        }
        Ok(recognition) => {
            println!("{}: {}", source, recognition.full_text);
            if show_boxes {
                for word_box in &recognition.word_boxes {
                    println!(
                        "    {:>5},{:<5} {}x{}  {}",
                        word_box.x, word_box.y, word_box.w, word_box.h, word_box.word
                    );
                }
            }
        }
        Err(e) => println!("{source}: recognition failed: {e}"),
    }
}
