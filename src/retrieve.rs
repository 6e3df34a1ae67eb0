//! Article retrieval: [`SearchIntent`] in, ranked [`ArticleSource`]s out.
//!
//! One embedding of the intent question, one hybrid query, then each hit is
//! normalized: authors decoded into names, the publish timestamp reduced to
//! a calendar date, and line breaks in the content collapsed to spaces.
//!
//! The intent's date range and author list are not sent as a server-side
//! filter. They shape the step summary only.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::Serialize;
use tracing::debug;

use crate::config::SearchConfig;
use crate::error::{DeweyError, Result};
use crate::llm::LanguageModel;
use crate::models::{ArticleSource, SearchIntent};
use crate::search::{ArticleIndex, HybridQuery, RawArticle, StoredAuthors};

pub struct ArticleRetriever<'a> {
    model: &'a dyn LanguageModel,
    index: &'a dyn ArticleIndex,
    k_nearest: usize,
    top: usize,
}

impl<'a> ArticleRetriever<'a> {
    pub fn new(model: &'a dyn LanguageModel, index: &'a dyn ArticleIndex, search: &SearchConfig) -> Self {
        Self {
            model,
            index,
            k_nearest: search.k_nearest,
            top: search.top,
        }
    }

    pub async fn retrieve(&self, intent: &SearchIntent) -> Result<Vec<ArticleSource>> {
        let vector = self
            .model
            .embed(&intent.question)
            .await
            .map_err(|e| DeweyError::Retrieval(format!("embedding failed: {}", e)))?;

        let query = HybridQuery {
            text: intent.question.clone(),
            vector,
            k_nearest: self.k_nearest,
            top: self.top,
            semantic: true,
        };

        let hits = self
            .index
            .hybrid_search(&query)
            .await
            .map_err(|e| DeweyError::Retrieval(format!("search failed: {}", e)))?;

        let sources = hits
            .into_iter()
            .take(self.top)
            .map(normalize_article)
            .collect::<Result<Vec<_>>>()?;

        debug!(count = sources.len(), "retrieved articles");
        Ok(sources)
    }
}

/// Normalize one raw hit. Headline and url pass through unchanged.
pub fn normalize_article(raw: RawArticle) -> Result<ArticleSource> {
    let publish_date = parse_publish_date(&raw.publish_date)?;
    let authors = decode_authors(&raw.authors)?;
    Ok(ArticleSource {
        url: raw.url,
        publish_date,
        authors,
        headline: raw.headline,
        content: single_line(&raw.content),
    })
}

/// Calendar date of an ISO timestamp or date, in the timestamp's own offset.
pub fn parse_publish_date(value: &str) -> Result<NaiveDate> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.date_naive());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f") {
        return Ok(dt.date());
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| {
        DeweyError::Retrieval(format!("unparseable publish_date: {:?}", value))
    })
}

pub fn decode_authors(stored: &StoredAuthors) -> Result<Vec<String>> {
    match stored {
        StoredAuthors::List(names) => Ok(names.clone()),
        StoredAuthors::Encoded(text) if text.trim().is_empty() => Ok(Vec::new()),
        StoredAuthors::Encoded(text) => serde_json::from_str::<Vec<String>>(text)
            .map_err(|e| DeweyError::Retrieval(format!("malformed authors {:?}: {}", text, e))),
    }
}

/// Collapse every line break (`\r\n`, `\n`, `\r`) to one space.
pub fn single_line(text: &str) -> String {
    text.replace("\r\n", " ").replace(&['\r', '\n'][..], " ")
}

#[derive(Serialize)]
struct SourceRecord<'a> {
    source_id: String,
    url: &'a str,
    publish_date: String,
    authors: &'a [String],
    headline: &'a str,
    content: &'a str,
}

/// One-line JSON record for source `ordinal` (1-based).
pub fn serialize_source(ordinal: usize, source: &ArticleSource) -> Result<String> {
    let record = SourceRecord {
        source_id: format!("SRC{}", ordinal),
        url: &source.url,
        publish_date: source.publish_date.format("%Y-%m-%d").to_string(),
        authors: &source.authors,
        headline: &source.headline,
        content: &source.content,
    };
    serde_json::to_string(&record)
        .map_err(|e| DeweyError::Retrieval(format!("could not serialize source SRC{}: {}", ordinal, e)))
}

/// All sources, one record per line, numbered in rank order.
pub fn serialize_sources(sources: &[ArticleSource]) -> Result<String> {
    let lines = sources
        .iter()
        .enumerate()
        .map(|(i, s)| serialize_source(i + 1, s))
        .collect::<Result<Vec<_>>>()?;
    Ok(lines.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(authors: StoredAuthors, date: &str, content: &str) -> RawArticle {
        RawArticle {
            url: "https://inquirer.example/a".to_string(),
            headline: "Council  votes\n".to_string(),
            publish_date: date.to_string(),
            content: content.to_string(),
            authors,
        }
    }

    #[test]
    fn publish_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        assert_eq!(parse_publish_date("2024-05-01T18:30:00Z").unwrap(), expected);
        assert_eq!(parse_publish_date("2024-05-01T23:30:00-04:00").unwrap(), expected);
        assert_eq!(parse_publish_date("2024-05-01T08:00:00.123").unwrap(), expected);
        assert_eq!(parse_publish_date("2024-05-01").unwrap(), expected);
        assert!(matches!(
            parse_publish_date("May first"),
            Err(DeweyError::Retrieval(_))
        ));
    }

    #[test]
    fn authors_decoding() {
        let encoded = StoredAuthors::Encoded(r#"["Ana Ruiz","Sam Lee"]"#.to_string());
        assert_eq!(decode_authors(&encoded).unwrap(), vec!["Ana Ruiz", "Sam Lee"]);
        assert!(decode_authors(&StoredAuthors::Encoded(String::new())).unwrap().is_empty());
        assert!(decode_authors(&StoredAuthors::Encoded("Ana Ruiz".to_string())).is_err());
    }

    #[test]
    fn content_is_single_line_and_idempotent() {
        let once = single_line("First line.\r\nSecond\nThird\rFourth");
        assert_eq!(once, "First line. Second Third Fourth");
        assert_eq!(single_line(&once), once);
    }

    #[test]
    fn headline_and_url_pass_through() {
        let article = normalize_article(raw(
            StoredAuthors::List(vec!["Ana Ruiz".to_string()]),
            "2024-05-01T12:00:00Z",
            "a\nb",
        ))
        .unwrap();
        assert_eq!(article.headline, "Council  votes\n");
        assert_eq!(article.url, "https://inquirer.example/a");
        assert_eq!(article.content, "a b");
    }

    #[test]
    fn serialized_sources_are_numbered_lines() {
        let a = normalize_article(raw(StoredAuthors::List(vec![]), "2024-05-01", "x")).unwrap();
        let mut b = a.clone();
        b.url = "https://inquirer.example/b".to_string();
        let text = serialize_sources(&[a, b]).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        let second: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second["source_id"], "SRC2");
        assert_eq!(second["url"], "https://inquirer.example/b");
        assert_eq!(second["publish_date"], "2024-05-01");
    }

    #[test]
    fn no_sources_serialize_to_empty_text() {
        assert_eq!(serialize_sources(&[]).unwrap(), "");
    }

    #[test]
    fn serialized_source_keeps_author_list() {
        let mut a = normalize_article(raw(StoredAuthors::List(vec![]), "2024-05-01", "x")).unwrap();
        a.authors = vec!["Ana Ruiz".to_string(), "Sam Lee".to_string()];
        let line = serialize_source(3, &a).unwrap();
        let record: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(record["source_id"], "SRC3");
        assert_eq!(record["authors"], serde_json::json!(["Ana Ruiz", "Sam Lee"]));
        assert!(!line.contains('\n'));
    }
}
