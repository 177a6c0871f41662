//! Run summary and reporting

use crate::domain::ids::{ImageId, RawItemId};
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Summary of one [`Batcher::run`](super::Batcher::run)
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// When the run started
    pub started_at: DateTime<Utc>,

    /// Number of items the procedures were applied to
    pub processed_items: usize,

    /// Input items whose export was not skipped by the overwrite policy
    pub exported_items: Vec<RawItemId>,

    /// Items whose procedures ended early with a skip
    pub skipped_items: Vec<RawItemId>,

    /// Duration of the run
    pub duration: Duration,

    /// Working copy of the input image, if the run kept it
    pub image_copy: Option<ImageId>,
}

impl RunSummary {
    /// Create a new empty run summary
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            processed_items: 0,
            exported_items: Vec::new(),
            skipped_items: Vec::new(),
            duration: Duration::from_secs(0),
            image_copy: None,
        }
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    pub fn exported_count(&self) -> usize {
        self.exported_items.len()
    }

    pub fn skipped_count(&self) -> usize {
        self.skipped_items.len()
    }

    /// Log the summary
    pub fn log_summary(&self) {
        tracing::info!(
            started_at = %self.started_at.to_rfc3339(),
            processed = self.processed_items,
            exported = self.exported_count(),
            skipped = self.skipped_count(),
            duration_ms = self.duration.as_millis(),
            image_copy = ?self.image_copy,
            "Run summary"
        );

        if !self.skipped_items.is_empty() {
            tracing::warn!(
                skipped_count = self.skipped_items.len(),
                "Some items were skipped"
            );
        }
    }
}

impl Default for RunSummary {
    fn default() -> Self {
        Self::new(Utc::now())
    }
}
