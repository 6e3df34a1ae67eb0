//! Intent extraction: conversation in, [`SearchIntent`] out.
//!
//! The model is called once with the search instructions and the
//! `search_archive` function forced. Its arguments are parsed into a typed
//! struct; a missing call, malformed JSON, or an empty question is an
//! [`DeweyError::IntentExtraction`] for the run.

use serde::Deserialize;
use tracing::debug;

use crate::config::AssistantConfig;
use crate::error::{DeweyError, Result};
use crate::llm::{FunctionCall, LanguageModel};
use crate::models::{AuthorFilter, ConversationTurn, DateRange, SearchIntent};
use crate::prompts::{search_instructions, search_tool, SEARCH_FUNCTION};

/// Wire shape of the function arguments. Unknown keys are rejected, matching
/// the strict schema the model was given.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct IntentArguments {
    question: String,
    date_range: DateRangeArguments,
    authors: Vec<AuthorArguments>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct DateRangeArguments {
    start_date: Option<String>,
    end_date: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct AuthorArguments {
    name: String,
}

/// Parse the raw function arguments into a [`SearchIntent`].
pub fn parse_intent(arguments: &str) -> Result<SearchIntent> {
    let args: IntentArguments = serde_json::from_str(arguments).map_err(|e| {
        DeweyError::IntentExtraction(format!("arguments do not match the schema: {}", e))
    })?;

    let question = args.question.trim().to_string();
    if question.is_empty() {
        return Err(DeweyError::IntentExtraction(
            "model returned an empty question".to_string(),
        ));
    }

    Ok(SearchIntent {
        question,
        date_range: DateRange {
            start_date: non_blank(args.date_range.start_date),
            end_date: non_blank(args.date_range.end_date),
        },
        authors: args
            .authors
            .into_iter()
            .map(|a| a.name.trim().to_string())
            .filter(|name| !name.is_empty())
            .map(|name| AuthorFilter { name })
            .collect(),
    })
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub struct IntentExtractor<'a> {
    model: &'a dyn LanguageModel,
    assistant: &'a AssistantConfig,
}

impl<'a> IntentExtractor<'a> {
    pub fn new(model: &'a dyn LanguageModel, assistant: &'a AssistantConfig) -> Self {
        Self { model, assistant }
    }

    /// `conversation` already ends with the new user message.
    pub async fn extract(
        &self,
        conversation: &[ConversationTurn],
        current_date: &str,
    ) -> Result<SearchIntent> {
        let instructions = search_instructions(self.assistant, current_date);
        let tool = search_tool(&self.assistant.organization);

        let arguments = self
            .model
            .call_function(FunctionCall {
                instructions: &instructions,
                messages: conversation,
                tool: &tool,
                function_name: SEARCH_FUNCTION,
            })
            .await
            .map_err(|e| DeweyError::IntentExtraction(e.to_string()))?
            .ok_or_else(|| {
                DeweyError::IntentExtraction(format!("model did not call {}", SEARCH_FUNCTION))
            })?;

        let intent = parse_intent(&arguments)?;
        debug!(
            question = %intent.question,
            start_date = ?intent.date_range.start_date,
            end_date = ?intent.date_range.end_date,
            authors = intent.authors.len(),
            "extracted search intent"
        );
        Ok(intent)
    }
}
