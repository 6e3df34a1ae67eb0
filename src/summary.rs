//! Human-readable step content.

use crate::models::SearchIntent;

pub const PLANNING: &str = "🔍 I'm planning my approach.";
pub const DIGGING: &str = "🔍 Digging through the archives";

/// Summarize an intent: quoted search text, then the date window and the
/// author filter when present, one per line.
pub fn describe_intent(intent: &SearchIntent) -> String {
    let search_text = format!("🔍 Searched \"{}\"", intent.question);

    let start = intent.date_range.start_date.as_deref().filter(|s| !s.is_empty());
    let end = intent.date_range.end_date.as_deref().filter(|s| !s.is_empty());
    let date_text = match (start, end) {
        (Some(start), Some(end)) => format!("⏳ From {} to {}.", start, end),
        (Some(start), None) => format!("⏳ After {}.", start),
        (None, Some(end)) => format!("⏳ Until {}", end),
        (None, None) => String::new(),
    };

    let names: Vec<&str> = intent.authors.iter().map(|a| a.name.as_str()).collect();
    let author_text = if names.is_empty() {
        String::new()
    } else {
        format!("🖊️ Written by {}", join_names(&names))
    };

    [search_text, date_text, author_text]
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn describe_retrieval(count: usize) -> String {
    format!("🔍 Retrieved {} articles.", count)
}

/// `A`, `A and B`, `A, B, and C`.
fn join_names(names: &[&str]) -> String {
    match names {
        [] => String::new(),
        [only] => only.to_string(),
        [first, second] => format!("{} and {}", first, second),
        [init @ .., last] => format!("{}, and {}", init.join(", "), last),
    }
}
