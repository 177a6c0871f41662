//! Progress reporting
//!
//! The batcher reports progress through [`ProgressUpdater`]; rendering is up
//! to the caller.

use tracing::{debug, info};

/// Collaborator receiving progress updates
pub trait ProgressUpdater {
    /// Clears counters and text
    fn reset(&mut self);

    fn set_num_total_tasks(&mut self, total: usize);

    /// Marks `count` more tasks as finished
    fn update_tasks(&mut self, count: usize);

    fn update_text(&mut self, text: &str);
}

/// Progress updater emitting `tracing` events
#[derive(Debug, Default, Clone)]
pub struct LoggingProgressUpdater {
    num_total_tasks: usize,
    num_finished_tasks: usize,
    text: String,
}

impl LoggingProgressUpdater {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn num_total_tasks(&self) -> usize {
        self.num_total_tasks
    }

    pub fn num_finished_tasks(&self) -> usize {
        self.num_finished_tasks
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Percentage of finished tasks (0.0 when there are no tasks)
    pub fn percent_complete(&self) -> f64 {
        if self.num_total_tasks == 0 {
            return 0.0;
        }
        (self.num_finished_tasks as f64 / self.num_total_tasks as f64) * 100.0
    }
}

impl ProgressUpdater for LoggingProgressUpdater {
    fn reset(&mut self) {
        self.num_total_tasks = 0;
        self.num_finished_tasks = 0;
        self.text.clear();
    }

    fn set_num_total_tasks(&mut self, total: usize) {
        self.num_total_tasks = total;
    }

    fn update_tasks(&mut self, count: usize) {
        self.num_finished_tasks = (self.num_finished_tasks + count).min(self.num_total_tasks);
        info!(
            finished = self.num_finished_tasks,
            total = self.num_total_tasks,
            percent = %format!("{:.1}", self.percent_complete()),
            "Progress"
        );
    }

    fn update_text(&mut self, text: &str) {
        self.text = text.to_string();
        debug!(status = text, "Progress text");
    }
}
