use serde::{Deserialize, Serialize};

/// Per-frame work budget for the render thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameSchedulerConfig {
    pub max_uploads_per_frame: u32,
    pub min_uploads_per_frame: u32,
    pub releases_per_frame: u32,
}

impl Default for FrameSchedulerConfig {
    fn default() -> Self {
        Self {
            max_uploads_per_frame: 2,
            min_uploads_per_frame: 1,
            releases_per_frame: 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSchedulerInput {
    pub frame_sequence_id: u64,
    pub pending_uploads: u32,
    pub pending_releases: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSchedulerDecision {
    pub frame_sequence_id: u64,
    pub uploads_to_process: u32,
    pub releases_to_process: u32,
}

#[derive(Debug, Clone)]
pub struct FrameScheduler {
    config: FrameSchedulerConfig,
}

impl FrameScheduler {
    pub fn new(config: FrameSchedulerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> FrameSchedulerConfig {
        self.config
    }

    pub fn schedule_frame(&self, input: FrameSchedulerInput) -> FrameSchedulerDecision {
        FrameSchedulerDecision {
            frame_sequence_id: input.frame_sequence_id,
            uploads_to_process: self.upload_quota_for_pending(input.pending_uploads),
            releases_to_process: self.release_quota_for_pending(input.pending_releases),
        }
    }

    fn upload_quota_for_pending(&self, pending_uploads: u32) -> u32 {
        if pending_uploads == 0 {
            return 0;
        }
        let floor = self.config.min_uploads_per_frame;
        let ceiling = self.config.max_uploads_per_frame;
        if floor > ceiling {
            panic!(
                "invalid frame scheduler config: min_uploads_per_frame ({floor}) exceeds max_uploads_per_frame ({ceiling})"
            );
        }
        pending_uploads.clamp(floor, ceiling)
    }

    fn release_quota_for_pending(&self, pending_releases: u32) -> u32 {
        pending_releases.min(self.config.releases_per_frame)
    }
}

impl Default for FrameScheduler {
    fn default() -> Self {
        Self::new(FrameSchedulerConfig::default())
    }
}
