//! Render-thread facade over the tile cache.
//!
//! Thread layout:
//! 1. The thread that owns [`TileEngine`] is the render thread. It alone touches the
//!    active set, the draw list and the texture uploader.
//! 2. `worker_count` fetch threads block on the load queue, call the fetcher and push
//!    results into the bounded loaded buffer. A full buffer blocks them; that is the
//!    only backpressure.
//! 3. Records whose last holder is released from any thread are parked in the release
//!    buffer and torn down by [`TileEngine::frame`] a few at a time.
//!
//! Per frame: upload up to the scheduler's quota of loaded tiles, refresh the draw
//! list if anything became ready, then free up to the release quota.
//! Per view change: visible leaves, ancestors, eviction, draw list.

mod config;
mod draw;
mod loaded;
mod visible;
mod worker;

use std::sync::Arc;

use crossbeam_channel::Sender;
use frame_scheduler::{FrameScheduler, FrameSchedulerInput};
use protocol::{DrawItem, TextureUploader, TileFetcher, TileKey};
use thiserror::Error;
use tiles::{ActiveSet, LoadQueue, ReleaseBuffer, TileError, TileRef, TileState, enforce_capacity};
use tracing::{debug, info, trace, warn};
use view::{MapView, ViewError};

pub use config::{EngineConfig, MAX_WORKER_COUNT};

use draw::DrawList;
use loaded::{LoadedReceiver, loaded_buffer};
use visible::build_visible_set;
use worker::{WorkerContext, WorkerPool};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid engine configuration: {0}")]
    InvalidConfig(String),
    #[error(transparent)]
    Tile(#[from] TileError),
    #[error(transparent)]
    View(#[from] ViewError),
    #[error("failed to spawn tile worker")]
    SpawnWorker(#[source] std::io::Error),
    #[error("tile engine has been shut down")]
    ShutDown,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RebuildReport {
    pub leaves: usize,
    pub leaves_requested: usize,
    pub ancestors_requested: usize,
    pub evicted: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameReport {
    pub frame_sequence_id: u64,
    pub uploaded: usize,
    /// Loaded tiles dropped because nothing wanted them any more.
    pub orphaned: usize,
    pub upload_failures: usize,
    pub released: usize,
    pub draw_list_refreshed: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineStats {
    pub resident: usize,
    pub queued: usize,
    pub loaded_pending: usize,
    pub release_pending: usize,
    pub textures: usize,
    pub draw_items: usize,
    pub frames: u64,
    pub released_total: u64,
}

/// A resident record whose holder count disagrees with the structures referencing it.
#[cfg(any(test, feature = "test-helpers"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HolderMismatch {
    pub key: TileKey,
    pub expected: usize,
    pub actual: usize,
}

pub struct TileEngine<U: TextureUploader> {
    config: EngineConfig,
    view: MapView,
    uploader: U,
    active: ActiveSet,
    queue: Arc<LoadQueue>,
    releases: Arc<ReleaseBuffer>,
    loaded: LoadedReceiver,
    // Dropped to unblock workers waiting on a full loaded buffer.
    shutdown_signal: Option<Sender<()>>,
    workers: WorkerPool,
    scheduler: FrameScheduler,
    visible: Vec<TileKey>,
    draw_list: DrawList,
    frame_sequence_id: u64,
    live_textures: usize,
    shut_down: bool,
}

impl<U: TextureUploader> TileEngine<U> {
    /// Starts the worker pool and builds the initial visible set.
    pub fn new(
        config: EngineConfig,
        view: MapView,
        fetcher: Arc<dyn TileFetcher>,
        uploader: U,
    ) -> Result<Self, EngineError> {
        config.validate()?;

        let queue = Arc::new(LoadQueue::new());
        let releases = Arc::new(ReleaseBuffer::new());
        let (loaded_sender, loaded, shutdown_signal) = loaded_buffer(config.loaded_buffer_capacity);
        let workers = WorkerPool::spawn(
            config.worker_count,
            WorkerContext {
                queue: Arc::clone(&queue),
                releases: Arc::clone(&releases),
                fetcher,
                loaded: loaded_sender,
            },
        )?;
        info!(
            workers = workers.len(),
            capacity = config.capacity,
            loaded_buffer = config.loaded_buffer_capacity,
            "tile engine started"
        );

        let mut engine = Self {
            active: ActiveSet::with_capacity(config.capacity),
            scheduler: FrameScheduler::new(config.scheduler),
            config,
            view,
            uploader,
            queue,
            releases,
            loaded,
            shutdown_signal: Some(shutdown_signal),
            workers,
            visible: Vec::new(),
            draw_list: DrawList::default(),
            frame_sequence_id: 0,
            live_textures: 0,
            shut_down: false,
        };
        engine.rebuild_visible_set()?;
        Ok(engine)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn view(&self) -> &MapView {
        &self.view
    }

    pub fn uploader(&self) -> &U {
        &self.uploader
    }

    pub fn set_view(&mut self, view: MapView) -> Result<RebuildReport, EngineError> {
        self.ensure_running()?;
        self.view = view;
        self.rebuild_visible_set()
    }

    pub fn pan_by(&mut self, delta_x: f64, delta_y: f64) -> Result<RebuildReport, EngineError> {
        self.ensure_running()?;
        self.view.pan_by(delta_x, delta_y)?;
        self.rebuild_visible_set()
    }

    pub fn zoom_by(&mut self, delta: f64) -> Result<RebuildReport, EngineError> {
        self.ensure_running()?;
        self.view.zoom_by(delta)?;
        self.rebuild_visible_set()
    }

    pub fn zoom_about_point(
        &mut self,
        delta: f64,
        screen_x: f64,
        screen_y: f64,
    ) -> Result<RebuildReport, EngineError> {
        self.ensure_running()?;
        self.view.zoom_about_point(delta, screen_x, screen_y)?;
        self.rebuild_visible_set()
    }

    pub fn set_viewport(&mut self, width: f64, height: f64) -> Result<RebuildReport, EngineError> {
        self.ensure_running()?;
        self.view.set_viewport(width, height)?;
        self.rebuild_visible_set()
    }

    /// Requests visible tiles and their ancestors, trims the cache and refreshes
    /// the draw list.
    pub fn rebuild_visible_set(&mut self) -> Result<RebuildReport, EngineError> {
        self.ensure_running()?;
        let visible = build_visible_set(
            &self.view,
            self.config.max_zoom,
            &mut self.active,
            &self.queue,
        )?;
        let eviction = enforce_capacity(&mut self.active, &self.queue, &self.releases)?;
        self.visible = visible.leaves;
        self.draw_list
            .rebuild(&self.visible, &self.view, &self.active, &self.releases);

        let report = RebuildReport {
            leaves: self.visible.len(),
            leaves_requested: visible.leaves_requested,
            ancestors_requested: visible.ancestors_requested,
            evicted: eviction.evicted.len(),
        };
        trace!(?report, resident = self.active.len(), "visible set rebuilt");
        Ok(report)
    }

    /// One render-thread tick: upload, refresh, release.
    pub fn frame(&mut self) -> Result<FrameReport, EngineError> {
        self.ensure_running()?;
        self.frame_sequence_id += 1;
        let decision = self.scheduler.schedule_frame(FrameSchedulerInput {
            frame_sequence_id: self.frame_sequence_id,
            pending_uploads: saturating_u32(self.loaded.len()),
            pending_releases: saturating_u32(self.releases.len()),
        });

        let mut report = FrameReport {
            frame_sequence_id: self.frame_sequence_id,
            ..FrameReport::default()
        };
        for _ in 0..decision.uploads_to_process {
            let Some(record) = self.loaded.try_recv() else {
                break;
            };
            self.upload_loaded(record, &mut report);
        }

        if report.uploaded > 0 {
            self.draw_list
                .rebuild(&self.visible, &self.view, &self.active, &self.releases);
            report.draw_list_refreshed = true;
        }

        report.released = self.drain_releases(decision.releases_to_process as usize);
        Ok(report)
    }

    pub fn draw_list(&self) -> &[DrawItem] {
        self.draw_list.items()
    }

    /// Base-zoom tiles of the current view in request order.
    pub fn visible_keys(&self) -> &[TileKey] {
        &self.visible
    }

    pub fn is_resident(&self, key: TileKey) -> bool {
        self.active.contains(&key)
    }

    pub fn tile_state(&self, key: TileKey) -> Option<TileState> {
        self.active.find(&key).map(|record| record.state())
    }

    /// Resident keys, most recent first.
    pub fn resident_keys(&self) -> Vec<TileKey> {
        self.active
            .iter_recent()
            .map(|record| record.key())
            .collect()
    }

    /// Queued keys in fetch order.
    pub fn queued_keys(&self) -> Vec<TileKey> {
        self.queue.keys()
    }

    /// True when no fetch is queued or running and nothing waits for upload.
    pub fn is_idle(&self) -> bool {
        // Workers complete only after handing off, so check the queue first.
        self.queue.is_idle() && self.loaded.len() == 0
    }

    pub fn stats(&self) -> EngineStats {
        EngineStats {
            resident: self.active.len(),
            queued: self.queue.len(),
            loaded_pending: self.loaded.len(),
            release_pending: self.releases.len(),
            textures: self.live_textures,
            draw_items: self.draw_list.items().len(),
            frames: self.frame_sequence_id,
            released_total: self.releases.released_total(),
        }
    }

    /// Compares every resident record's holder count with the structures that
    /// reference it. Only meaningful while [`TileEngine::is_idle`] holds.
    #[cfg(any(test, feature = "test-helpers"))]
    pub fn holder_mismatches(&self) -> Vec<HolderMismatch> {
        self.active
            .iter_recent()
            .filter_map(|record| {
                let key = record.key();
                let expected =
                    1 + usize::from(self.queue.contains(key)) + self.draw_list.holds(key);
                let actual = record.holders();
                (expected != actual).then_some(HolderMismatch {
                    key,
                    expected,
                    actual,
                })
            })
            .collect()
    }

    /// Stops the workers and frees every texture. Runs at most once.
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;
        debug!("tile engine shutting down");

        self.queue.close();
        self.shutdown_signal.take();
        self.workers.join();

        for record in self.queue.drain() {
            self.releases.release(record);
        }
        while let Some(record) = self.loaded.try_recv() {
            self.releases.release(record);
        }
        self.draw_list.clear(&self.releases);
        for record in self.active.drain() {
            self.releases.release(record);
        }
        self.visible.clear();

        let freed = self.drain_releases(usize::MAX);
        if self.live_textures != 0 {
            warn!(
                leaked = self.live_textures,
                "textures still live after tile engine shutdown"
            );
        }
        info!(freed, "tile engine stopped");
    }

    fn ensure_running(&self) -> Result<(), EngineError> {
        if self.shut_down {
            return Err(EngineError::ShutDown);
        }
        Ok(())
    }

    /// `record` carries the loaded buffer's holder, released here in every path.
    fn upload_loaded(&mut self, record: TileRef, report: &mut FrameReport) {
        let key = record.key();
        if record.is_sole_holder() {
            trace!(tile = %key, "dropping loaded tile nobody wants");
            drop(record.take_payload());
            self.releases.release(record);
            report.orphaned += 1;
            return;
        }

        let Some(image) = record.take_payload() else {
            panic!("tile {key} reached the loaded buffer without a payload");
        };
        match self
            .uploader
            .upload(image.width(), image.height(), image.pixels())
        {
            Ok(texture) => {
                record.set_texture(texture);
                record.set_state(TileState::TextureReady);
                self.live_textures += 1;
                report.uploaded += 1;
            }
            Err(error) => {
                warn!(tile = %key, %error, "tile texture upload failed");
                record.set_state(TileState::Failed);
                report.upload_failures += 1;
            }
        }
        self.releases.release(record);
    }

    fn drain_releases(&mut self, max_records: usize) -> usize {
        let uploader = &mut self.uploader;
        let live_textures = &mut self.live_textures;
        self.releases.drain_with(max_records, |record| {
            if let Some(texture) = record.take_texture() {
                uploader.free(texture);
                *live_textures -= 1;
            }
            drop(record.take_payload());
        })
    }
}

impl<U: TextureUploader> Drop for TileEngine<U> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn saturating_u32(value: usize) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}
