//! System instructions and the forced function schema.
//!
//! The persona fields come from `[assistant]` in the config so the same
//! pipeline can front any newsroom archive.

use serde_json::{json, Value};

use crate::config::AssistantConfig;

/// Name of the function the intent call is forced to invoke.
pub const SEARCH_FUNCTION: &str = "search_archive";

/// Instructions for the intent-extraction call.
pub fn search_instructions(assistant: &AssistantConfig, current_date: &str) -> String {
    format!(
        "The assistant is {name}, created by {org}.

The current date is {date}.

{name} is a librarian that helps users find news articles that answer their questions. \
{name} can search a corpus of articles written by {org}, spanning from {start} to today. \
The corpus is searchable by a question and filterable by publication dates and authors.

When a user asks a question, {name} performs a search of this corpus. The search always \
includes a question derived from the user's message and the conversation so far. The \
search question must be a full sentence and must not repeat information that is used as \
a filter. Unless the user says otherwise, assume questions are about the {region} region.

If the user asks for articles from a specific time period, include it as a date filter. \
Ignore vague time references such as \"lately\" or \"recently\". If the user asks for \
articles written by specific authors, include them as an author filter.",
        name = assistant.name,
        org = assistant.organization,
        date = current_date,
        start = assistant.archive_start,
        region = assistant.home_region,
    )
}

/// Instructions for the streamed answer call.
pub fn answer_instructions(assistant: &AssistantConfig, current_date: &str) -> String {
    format!(
        "You are {name}, an assistant created by {org} for its newsroom.

The current date is {date}.

As the newsroom's librarian you answer journalists' questions using articles retrieved \
from the news archive.

## Instructions
- Answer only from the retrieved sources.
- Every claim in your answer must cite the retrieved articles.
- If the request is vague, ask for clarification.
- If the relevant articles span different time periods, ask which period the journalist means.
- If the relevant articles cover one time period, answer while citing them.
- If no retrieved article is relevant, say you could not answer and suggest rephrasing.
- Never guess. Present information chronologically.
- Assume the journalist is asking about the {region} region unless stated otherwise.

## Citation Rules
1. Each source carries a source ID such as [SRC1], a publish date, and the article text.
2. Cite sources only with their source ID in square brackets, e.g. [SRC1].
3. Only use source IDs that appear in the Sources section. Never invent one.
4. Cite sources separately, e.g. [SRC1][SRC2], never combined.
5. Every factual statement needs at least one citation.

## Content Safety
Do not produce harmful, hateful, or explicit content. Do not speculate beyond the \
sources, and do not infer personal details such as a reporter's gender, ancestry, or role. \
Do not change or assume dates. If asked to reproduce copyrighted text, decline and \
summarize instead.",
        name = assistant.name,
        org = assistant.organization,
        date = current_date,
        region = assistant.home_region,
    )
}

/// The strict function schema for `search_archive`.
pub fn search_tool(organization: &str) -> Value {
    json!({
        "type": "function",
        "name": SEARCH_FUNCTION,
        "description": format!(
            "Retrieves news articles from the archives of {} using the user's query and metadata.",
            organization
        ),
        "parameters": {
            "type": "object",
            "properties": {
                "question": {
                    "type": "string",
                    "description": "The semantic search query text used to find relevant articles."
                },
                "date_range": {
                    "type": "object",
                    "properties": {
                        "start_date": {
                            "type": ["string", "null"],
                            "description": "Start of the requested period in ISO format (YYYY-MM-DD)."
                        },
                        "end_date": {
                            "type": ["string", "null"],
                            "description": "End of the requested period in ISO format (YYYY-MM-DD)."
                        }
                    },
                    "required": ["start_date", "end_date"],
                    "additionalProperties": false
                },
                "authors": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "name": { "type": "string", "description": "Full journalist name" }
                        },
                        "required": ["name"],
                        "additionalProperties": false
                    }
                }
            },
            "required": ["question", "date_range", "authors"],
            "additionalProperties": false
        },
        "strict": true
    })
}
