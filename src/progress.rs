//! Step progress reporting for the CLI.
//!
//! Every update from the pipeline carries the full step list so far. The CLI
//! diffs consecutive snapshots with [`changed_steps`] and hands each changed
//! step to a [`StepProgressReporter`]. Progress is emitted on **stderr** so
//! stdout remains the answer channel.

use std::io::Write;

use crate::models::{PipelineStep, StepStatus};

/// Reports step changes. Implementations write to stderr (human or JSON).
pub trait StepProgressReporter: Send + Sync {
    fn report(&self, step: &PipelineStep);
}

/// Human-friendly progress on stderr:
///
/// ```text
/// … Searching articles
///     🔍 Digging through the archives
/// ✓ Searching articles
///     🔍 Retrieved 10 articles.
/// ```
pub struct StderrProgress;

impl StepProgressReporter for StderrProgress {
    fn report(&self, step: &PipelineStep) {
        let line = format_step(step);
        let mut err = std::io::stderr().lock();
        let _ = err.write_all(line.as_bytes());
        let _ = err.flush();
    }
}

fn format_step(step: &PipelineStep) -> String {
    let marker = match step.status {
        StepStatus::Pending => "…",
        StepStatus::Done => "✓",
    };
    let mut out = format!("{} {}\n", marker, step.title);
    if let Some(content) = &step.content {
        for line in content.lines() {
            out.push_str("    ");
            out.push_str(line);
            out.push('\n');
        }
    }
    out
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl StepProgressReporter for JsonProgress {
    fn report(&self, step: &PipelineStep) {
        let line = json_line(step);
        let mut err = std::io::stderr().lock();
        let _ = writeln!(err, "{}", line);
        let _ = err.flush();
    }
}

fn json_line(step: &PipelineStep) -> serde_json::Value {
    serde_json::json!({
        "event": "step",
        "step": step,
    })
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl StepProgressReporter for NoProgress {
    fn report(&self, _step: &PipelineStep) {}
}

/// Steps in `current` that are new or differ from their entry in `previous`.
pub fn changed_steps<'a>(
    previous: &'a [PipelineStep],
    current: &'a [PipelineStep],
) -> impl Iterator<Item = &'a PipelineStep> + 'a {
    current
        .iter()
        .enumerate()
        .filter(move |(i, step)| previous.get(*i) != Some(*step))
        .map(|(_, step)| step)
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    /// Parse a `--progress` value. `auto` picks [`ProgressMode::default_for_tty`].
    pub fn from_flag(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "auto" => Some(Self::default_for_tty()),
            "human" => Some(ProgressMode::Human),
            "json" => Some(ProgressMode::Json),
            "off" | "none" => Some(ProgressMode::Off),
            _ => None,
        }
    }

    pub fn reporter(&self) -> Box<dyn StepProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}
