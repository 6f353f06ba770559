use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use engine::TileEngine;
use mapview::{AppConfig, DirectoryFetcher, HeadlessUploader, SyntheticFetcher};
use protocol::{LatLon, TileFetcher};
use renderer::build_draw_batches;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;
use view::{MapView, WebMercator};

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Drive the tile engine through a scripted pan/zoom session"
)]
struct Arguments {
    /// JSON configuration file; flags below override its values.
    #[arg(long, short = 'c', value_parser)]
    config: Option<PathBuf>,
    /// Tile directory laid out as `{root}/{z}/{x}/{y}.{ext}`.
    #[arg(long, value_parser)]
    tiles: Option<PathBuf>,
    #[arg(long)]
    extension: Option<String>,
    #[arg(long)]
    frames: Option<u64>,
    #[arg(long, allow_negative_numbers = true)]
    lat: Option<f64>,
    #[arg(long, allow_negative_numbers = true)]
    lon: Option<f64>,
    #[arg(long)]
    zoom: Option<f64>,
    /// Screen pixels panned per frame.
    #[arg(long, allow_negative_numbers = true)]
    pan_x: Option<f64>,
    #[arg(long, allow_negative_numbers = true)]
    pan_y: Option<f64>,
    /// Zoom levels applied per frame.
    #[arg(long, allow_negative_numbers = true)]
    zoom_step: Option<f64>,
    #[arg(long)]
    workers: Option<usize>,
    #[arg(long)]
    capacity: Option<usize>,
    #[arg(long)]
    frame_ms: Option<u64>,
    /// Artificial fetch latency for synthetic tiles.
    #[arg(long, default_value_t = 5)]
    synthetic_latency_ms: u64,
}

impl Arguments {
    fn apply(&self, config: &mut AppConfig) {
        if let Some(tiles) = &self.tiles {
            config.tiles = Some(tiles.clone());
        }
        if let Some(extension) = &self.extension {
            config.extension = extension.clone();
        }
        if let Some(frames) = self.frames {
            config.session.frames = frames;
        }
        if let Some(lat) = self.lat {
            config.start.lat = lat;
        }
        if let Some(lon) = self.lon {
            config.start.lon = lon;
        }
        if let Some(zoom) = self.zoom {
            config.start.zoom = zoom;
        }
        if let Some(pan_x) = self.pan_x {
            config.session.pan_x = pan_x;
        }
        if let Some(pan_y) = self.pan_y {
            config.session.pan_y = pan_y;
        }
        if let Some(zoom_step) = self.zoom_step {
            config.session.zoom_step = zoom_step;
        }
        if let Some(workers) = self.workers {
            config.engine.worker_count = workers;
        }
        if let Some(capacity) = self.capacity {
            config.engine.capacity = capacity;
        }
        if let Some(frame_ms) = self.frame_ms {
            config.session.frame_ms = frame_ms;
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let arguments = Arguments::parse();
    let mut config = match &arguments.config {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };
    arguments.apply(&mut config);

    let fetcher: Arc<dyn TileFetcher> = match &config.tiles {
        Some(root) => {
            anyhow::ensure!(root.is_dir(), "tile directory {} not found", root.display());
            info!(root = %root.display(), extension = %config.extension, "serving tiles from directory");
            Arc::new(DirectoryFetcher::new(root, config.extension.clone()))
        }
        None => {
            info!("serving synthetic tiles");
            Arc::new(SyntheticFetcher::new(
                config.tile_size.round().max(1.0) as u32,
                Duration::from_millis(arguments.synthetic_latency_ms),
            ))
        }
    };

    let view = MapView::centered_on(
        &WebMercator,
        LatLon::new(config.start.lat, config.start.lon),
        config.start.zoom,
        config.viewport_width,
        config.viewport_height,
        config.tile_size,
    )
    .context("build initial view")?;
    let mut engine = TileEngine::new(
        config.engine.clone(),
        view,
        fetcher,
        HeadlessUploader::new(),
    )
    .context("start tile engine")?;

    run_session(&mut engine, &config)?;

    engine.shutdown();
    let uploader = engine.uploader();
    info!(
        uploads = uploader.uploads(),
        uploaded_bytes = uploader.uploaded_bytes(),
        leaked_textures = uploader.live_textures(),
        "session finished"
    );
    anyhow::ensure!(
        uploader.live_textures() == 0,
        "{} textures survived shutdown",
        uploader.live_textures()
    );
    Ok(())
}

fn run_session(engine: &mut TileEngine<HeadlessUploader>, config: &AppConfig) -> Result<()> {
    let session = config.session;
    let frame_budget = Duration::from_millis(session.frame_ms);
    let started = Instant::now();

    let total_frames = session.frames + session.settle_frames;
    for frame in 0..total_frames {
        let frame_started = Instant::now();
        let scripted = frame < session.frames;
        if scripted && (session.pan_x != 0.0 || session.pan_y != 0.0) {
            engine
                .pan_by(session.pan_x, session.pan_y)
                .with_context(|| format!("pan at frame {frame}"))?;
        }
        if scripted && session.zoom_step != 0.0 {
            engine
                .zoom_by(session.zoom_step)
                .with_context(|| format!("zoom at frame {frame}"))?;
        }

        let report = engine
            .frame()
            .with_context(|| format!("render frame {frame}"))?;
        let batches = build_draw_batches(engine.draw_list());
        debug!(
            frame = report.frame_sequence_id,
            uploaded = report.uploaded,
            released = report.released,
            quads = batches.quad_count(),
            binds = batches.batches.len(),
            vertex_bytes = batches.vertex_bytes().len(),
            "frame submitted"
        );

        if session.stats_every > 0 && frame % session.stats_every == 0 {
            let stats = engine.stats();
            let center = engine.view().center_position(&WebMercator);
            info!(
                frame,
                zoom = engine.view().zoom(),
                lat = center.lat,
                lon = center.lon,
                resident = stats.resident,
                queued = stats.queued,
                loaded_pending = stats.loaded_pending,
                release_pending = stats.release_pending,
                textures = stats.textures,
                draw_items = stats.draw_items,
                "engine stats"
            );
        }

        if !scripted && engine.is_idle() {
            info!(frame, "engine settled");
            break;
        }

        let elapsed = frame_started.elapsed();
        if elapsed < frame_budget {
            thread::sleep(frame_budget - elapsed);
        }
    }

    info!(
        elapsed_ms = started.elapsed().as_millis() as u64,
        "session script complete"
    );
    Ok(())
}
