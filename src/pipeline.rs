//! Answer orchestration.
//!
//! [`Pipeline::process`] runs one question through three stages and yields a
//! lazy stream of [`PipelineUpdate`]s:
//!
//! ```text
//! Idle ─▶ ExtractingIntent ─▶ Retrieving ─▶ Generating ─▶ Done
//!              │                  │              │
//!              └──────────────────┴──────────────┴─▶ Failed
//! ```
//!
//! Each stage opens a step on the run's [`StepTracker`]; step snapshots are
//! yielded as the stage starts and completes, then every generated fragment
//! is yielded as the fully rewritten answer so far paired with the final
//! step list. A failure ends the stream with one `Err` item after the
//! in-flight step has been marked done.
//!
//! All per-run state (tracker, citation index, accumulator) lives inside the
//! stream. Concurrent runs share only the immutable service handles.
//! Dropping the stream drops the upstream generation stream with it.

use chrono::{Local, NaiveDate};
use futures::stream::{Stream, StreamExt};
use std::sync::Arc;
use tracing::{debug, info_span, warn, Instrument};
use uuid::Uuid;

use crate::citations::{CitationIndex, CitationRewriter};
use crate::config::Config;
use crate::error::{DeweyError, Result};
use crate::intent::IntentExtractor;
use crate::llm::LanguageModel;
use crate::models::{ConversationTurn, PipelineUpdate};
use crate::prompts::answer_instructions;
use crate::retrieve::{serialize_sources, ArticleRetriever};
use crate::search::ArticleIndex;
use crate::steps::StepTracker;
use crate::summary::{describe_intent, describe_retrieval, DIGGING, PLANNING};

pub const INTENT_STEP: &str = "Generating metadata";
pub const SEARCH_STEP: &str = "Searching articles";

/// Lifecycle of a single run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    ExtractingIntent,
    Retrieving,
    Generating,
    Done,
    Failed,
}

impl RunState {
    pub fn is_terminal(self) -> bool {
        matches!(self, RunState::Done | RunState::Failed)
    }

    /// Forward-only transitions; `Failed` is reachable from every
    /// non-terminal state.
    pub fn can_transition_to(self, next: RunState) -> bool {
        use RunState::*;
        match (self, next) {
            (from, Failed) => !from.is_terminal(),
            (Idle, ExtractingIntent)
            | (ExtractingIntent, Retrieving)
            | (Retrieving, Generating)
            | (Generating, Done) => true,
            _ => false,
        }
    }
}

struct RunContext {
    id: Uuid,
    state: RunState,
}

impl RunContext {
    fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            state: RunState::Idle,
        }
    }

    fn advance(&mut self, next: RunState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "invalid transition {:?} -> {:?}",
            self.state,
            next
        );
        debug!(run_id = %self.id, from = ?self.state, to = ?next, "run state");
        self.state = next;
    }

    fn fail(&mut self, error: DeweyError) -> DeweyError {
        warn!(run_id = %self.id, state = ?self.state, code = error.code(), error = %error, "run failed");
        self.advance(RunState::Failed);
        error
    }
}

/// Shared, immutable handles for answering questions. Cheap to clone; each
/// call to [`Pipeline::process`] starts an independent run.
#[derive(Clone)]
pub struct Pipeline {
    model: Arc<dyn LanguageModel>,
    index: Arc<dyn ArticleIndex>,
    config: Arc<Config>,
    today: Option<NaiveDate>,
}

impl Pipeline {
    pub fn new(model: Arc<dyn LanguageModel>, index: Arc<dyn ArticleIndex>, config: Config) -> Self {
        Self {
            model,
            index,
            config: Arc::new(config),
            today: None,
        }
    }

    /// Pin the date woven into the instructions instead of using the local clock.
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// e.g. `Thursday, May 02, 2024`.
    pub fn date_label(&self) -> String {
        self.today
            .unwrap_or_else(|| Local::now().date_naive())
            .format("%A, %B %d, %Y")
            .to_string()
    }

    /// Caller history trimmed to the most recent non-empty turns, followed by
    /// the new user message.
    pub fn conversation(&self, message: &str, history: &[ConversationTurn]) -> Vec<ConversationTurn> {
        let limit = self.config.assistant.max_history_turns;
        let kept: Vec<&ConversationTurn> = history
            .iter()
            .filter(|turn| !turn.content.trim().is_empty())
            .collect();
        let skip = kept.len().saturating_sub(limit);
        let mut conversation: Vec<ConversationTurn> =
            kept.into_iter().skip(skip).cloned().collect();
        conversation.push(ConversationTurn::user(message));
        conversation
    }

    /// Answer `message` given the caller's `history`.
    ///
    /// With `show_steps = false` no step-only updates are yielded and every
    /// update carries an empty step list.
    pub fn process(
        &self,
        message: &str,
        history: &[ConversationTurn],
        show_steps: bool,
    ) -> impl Stream<Item = Result<PipelineUpdate>> + Send + 'static {
        let pipeline = self.clone();
        let message = message.to_string();
        let conversation = self.conversation(&message, history);
        let mut run = RunContext::new();
        let span = info_span!("run", run_id = %run.id, show_steps);

        async_stream::stream! {
            let date_label = pipeline.date_label();
            let mut tracker = StepTracker::new(show_steps);
            tracker.reset();

            run.advance(RunState::ExtractingIntent);
            let intent = {
                let mut step = tracker.begin(INTENT_STEP);
                if let Some(update) = step.start(Some(PLANNING)) {
                    yield Ok(update);
                }
                let extractor = IntentExtractor::new(pipeline.model.as_ref(), &pipeline.config.assistant);
                match extractor.extract(&conversation, &date_label).instrument(span.clone()).await {
                    Ok(intent) => {
                        if let Some(update) = step.complete(Some(&describe_intent(&intent))) {
                            yield Ok(update);
                        }
                        intent
                    }
                    Err(e) => {
                        drop(step);
                        yield Err(run.fail(e));
                        return;
                    }
                }
            };

            run.advance(RunState::Retrieving);
            let (sources, source_text) = {
                let mut step = tracker.begin(SEARCH_STEP);
                if let Some(update) = step.start(Some(DIGGING)) {
                    yield Ok(update);
                }
                let retriever = ArticleRetriever::new(
                    pipeline.model.as_ref(),
                    pipeline.index.as_ref(),
                    &pipeline.config.search,
                );
                let retrieved = retriever
                    .retrieve(&intent)
                    .instrument(span.clone())
                    .await
                    .and_then(|sources| serialize_sources(&sources).map(|text| (sources, text)));
                match retrieved {
                    Ok((sources, text)) => {
                        if let Some(update) = step.complete(Some(&describe_retrieval(sources.len()))) {
                            yield Ok(update);
                        }
                        (sources, text)
                    }
                    Err(e) => {
                        drop(step);
                        yield Err(run.fail(e));
                        return;
                    }
                }
            };

            run.advance(RunState::Generating);
            let mut request = conversation;
            request.push(ConversationTurn::user(format!(
                "{}\n\n## Sources\n{}",
                message, source_text
            )));
            let mut rewriter = CitationRewriter::new(CitationIndex::from_sources(&sources));
            let instructions = answer_instructions(&pipeline.config.assistant, &date_label);

            let opened = pipeline
                .model
                .stream_text(&instructions, &request)
                .instrument(span.clone())
                .await;
            let mut fragments = match opened {
                Ok(fragments) => fragments,
                Err(e) => {
                    yield Err(run.fail(DeweyError::GenerationStream(e.to_string())));
                    return;
                }
            };

            let mut emitted = 0usize;
            while let Some(fragment) = fragments.next().await {
                match fragment {
                    Ok(text) => {
                        let answer = rewriter.feed(&text).to_string();
                        emitted += 1;
                        yield Ok(PipelineUpdate {
                            answer,
                            steps: tracker.snapshot(),
                        });
                    }
                    Err(e) => {
                        yield Err(run.fail(DeweyError::GenerationStream(e.to_string())));
                        return;
                    }
                }
            }

            debug!(fragments = emitted, answer_len = rewriter.rendered().len(), "generation finished");
            run.advance(RunState::Done);
        }
    }
}
