use frame_scheduler::FrameSchedulerConfig;
use protocol::MAX_SUPPORTED_ZOOM;
use serde::{Deserialize, Serialize};
use tiles::DEFAULT_ACTIVE_CAPACITY;

use crate::EngineError;

pub const MAX_WORKER_COUNT: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Resident tile budget enforced after every visible-set rebuild.
    pub capacity: usize,
    pub worker_count: usize,
    /// Fetched tiles allowed to wait for upload before workers block.
    pub loaded_buffer_capacity: usize,
    pub max_zoom: u8,
    pub scheduler: FrameSchedulerConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_ACTIVE_CAPACITY,
            worker_count: 3,
            loaded_buffer_capacity: 10,
            max_zoom: 18,
            scheduler: FrameSchedulerConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.capacity == 0 {
            return Err(EngineError::InvalidConfig(
                "capacity must be greater than zero".to_string(),
            ));
        }
        if !(1..=MAX_WORKER_COUNT).contains(&self.worker_count) {
            return Err(EngineError::InvalidConfig(format!(
                "worker_count must be within 1..={MAX_WORKER_COUNT}, got {}",
                self.worker_count
            )));
        }
        if self.loaded_buffer_capacity == 0 {
            return Err(EngineError::InvalidConfig(
                "loaded_buffer_capacity must be greater than zero".to_string(),
            ));
        }
        if self.max_zoom > MAX_SUPPORTED_ZOOM {
            return Err(EngineError::InvalidConfig(format!(
                "max_zoom {} exceeds supported maximum {MAX_SUPPORTED_ZOOM}",
                self.max_zoom
            )));
        }
        let scheduler = &self.scheduler;
        if scheduler.min_uploads_per_frame > scheduler.max_uploads_per_frame {
            return Err(EngineError::InvalidConfig(format!(
                "scheduler.min_uploads_per_frame ({}) exceeds scheduler.max_uploads_per_frame ({})",
                scheduler.min_uploads_per_frame, scheduler.max_uploads_per_frame
            )));
        }
        if scheduler.max_uploads_per_frame == 0 || scheduler.releases_per_frame == 0 {
            return Err(EngineError::InvalidConfig(
                "scheduler quotas must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
