//! Queue-side job metadata.
//!
//! Progress is a whole-value percentage. Writers overwrite it, they never
//! increment it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Percentage at which a job counts as complete.
pub const COMPLETE_PERCENT: u8 = 100;

/// Typed metadata attached to a queued job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobMeta {
    /// Percent complete, always within 0..=100
    pub progress: u8,

    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub updated_at: DateTime<Utc>,
}

impl JobMeta {
    pub fn new(progress: u8) -> Self {
        Self {
            progress: progress.min(COMPLETE_PERCENT),
            updated_at: Utc::now(),
        }
    }

    /// Clamp an arbitrary percentage into 0..=100.
    pub fn clamp_percent(percent: i64) -> u8 {
        percent.clamp(0, COMPLETE_PERCENT as i64) as u8
    }

    pub fn is_complete(&self) -> bool {
        self.progress >= COMPLETE_PERCENT
    }

    pub fn state(&self) -> JobState {
        JobState::from_progress(self.progress)
    }
}

impl Default for JobMeta {
    fn default() -> Self {
        Self::new(0)
    }
}

/// Lifecycle position derived from progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Pending,
    InProgress,
    Complete,
}

impl JobState {
    pub fn from_progress(progress: u8) -> Self {
        match progress {
            0 => JobState::Pending,
            p if p >= COMPLETE_PERCENT => JobState::Complete,
            _ => JobState::InProgress,
        }
    }
}
