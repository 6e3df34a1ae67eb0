//! Per-run progress steps.
//!
//! A [`StepTracker`] owns the ordered step list for one run. Opening a step
//! with [`StepTracker::begin`] returns a [`StepGuard`]; the guard reports
//! `start`/`complete` snapshots and marks its step done when dropped, so a
//! step never stays pending after its scope ends, whether the scope
//! finished, returned early with an error, or the run was cancelled.
//!
//! ```rust
//! use dewey::models::StepStatus;
//! use dewey::steps::StepTracker;
//!
//! let mut tracker = StepTracker::new(true);
//! {
//!     let mut step = tracker.begin("Searching articles");
//!     assert!(step.start(Some("Digging")).is_some());
//!     assert!(step.start(None).is_none());
//! }
//! assert_eq!(tracker.steps()[0].status, StepStatus::Done);
//! ```

use crate::models::{PipelineStep, PipelineUpdate, StepStatus};

/// Ordered step sequence for a single run.
#[derive(Debug, Default)]
pub struct StepTracker {
    steps: Vec<PipelineStep>,
    enabled: bool,
}

impl StepTracker {
    /// `enabled = false` suppresses all step reporting; guards still exist
    /// but never produce snapshots and nothing is recorded.
    pub fn new(enabled: bool) -> Self {
        Self {
            steps: Vec::new(),
            enabled,
        }
    }

    pub fn reset(&mut self) {
        self.steps.clear();
    }

    /// Append a pending step and return the guard bound to it.
    pub fn begin(&mut self, title: &str) -> StepGuard<'_> {
        let index = if self.enabled {
            self.steps.push(PipelineStep {
                title: title.to_string(),
                status: StepStatus::Pending,
                content: None,
            });
            Some(self.steps.len() - 1)
        } else {
            None
        };
        StepGuard {
            tracker: self,
            index,
            started: false,
        }
    }

    pub fn steps(&self) -> &[PipelineStep] {
        &self.steps
    }

    /// Owned copy of the steps so far. Later mutation never reaches it.
    pub fn snapshot(&self) -> Vec<PipelineStep> {
        self.steps.clone()
    }

    fn event(&self) -> PipelineUpdate {
        PipelineUpdate {
            answer: String::new(),
            steps: self.snapshot(),
        }
    }
}

/// Scoped handle to one step. Marks the step done on drop.
#[derive(Debug)]
pub struct StepGuard<'a> {
    tracker: &'a mut StepTracker,
    index: Option<usize>,
    started: bool,
}

impl StepGuard<'_> {
    /// Report the step as started. Fires at most once; later calls return `None`.
    pub fn start(&mut self, content: Option<&str>) -> Option<PipelineUpdate> {
        let index = self.index?;
        if self.started {
            return None;
        }
        self.started = true;
        if let Some(text) = content.filter(|c| !c.is_empty()) {
            self.tracker.steps[index].content = Some(text.to_string());
        }
        Some(self.tracker.event())
    }

    /// Mark the step done, overwriting its content when given.
    pub fn complete(&mut self, content: Option<&str>) -> Option<PipelineUpdate> {
        let index = self.index?;
        let step = &mut self.tracker.steps[index];
        step.status = StepStatus::Done;
        if let Some(text) = content.filter(|c| !c.is_empty()) {
            step.content = Some(text.to_string());
        }
        Some(self.tracker.event())
    }
}

impl Drop for StepGuard<'_> {
    fn drop(&mut self) {
        if let Some(index) = self.index {
            self.tracker.steps[index].status = StepStatus::Done;
        }
    }
}
