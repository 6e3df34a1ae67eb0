//! Core data models used throughout the answer pipeline.
//!
//! These types represent the conversation, the extracted search intent, the
//! retrieved articles, and the progress snapshots that flow between stages.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Speaker of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One recorded message of the caller's conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
}

impl ConversationTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Optional publication window. Dates are kept as the ISO strings the model
/// produced; this layer does not check that `end_date` follows `start_date`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

/// Author filter entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorFilter {
    pub name: String,
}

/// Structured search intent produced once per run by the intent extractor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchIntent {
    /// Full-sentence search question, stripped of filter criteria.
    pub question: String,
    pub date_range: DateRange,
    pub authors: Vec<AuthorFilter>,
}

/// A retrieved article, normalized for citation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleSource {
    pub url: String,
    pub publish_date: NaiveDate,
    pub authors: Vec<String>,
    pub headline: String,
    /// Single-line content: line breaks collapsed to spaces.
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Pending,
    Done,
}

/// One named unit of pipeline progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineStep {
    pub title: String,
    pub status: StepStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

/// One emission of a run: the rewritten answer so far plus a copy of the
/// steps so far. Step events carry an empty `answer`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PipelineUpdate {
    pub answer: String,
    pub steps: Vec<PipelineStep>,
}
