//! Streaming citation rewriting.
//!
//! Generated answers cite sources with markers of the form `[SRC<n>]`, where
//! `n` is the 1-based position of the source in the run's retrieval order.
//! [`CitationRewriter`] keeps the raw text received so far and, on every
//! fragment, re-renders the whole accumulator, turning each complete marker
//! into `[[n]](url)` (or `[[n]](#)` when `n` names no source). A marker split
//! across fragments (`...[SR` then `C3]...`) stays literal until its closing
//! bracket arrives.
//!
//! Re-rendering from scratch costs a rescan per fragment but needs no
//! partial-match state, and answers are a few KB at most.
//!
//! ```rust
//! use dewey::citations::{CitationIndex, CitationRewriter};
//!
//! let index = CitationIndex::new(vec!["https://news.example/a".to_string()]);
//! let mut rewriter = CitationRewriter::new(index);
//! assert_eq!(rewriter.feed("Council met [SR"), "Council met [SR");
//! assert_eq!(
//!     rewriter.feed("C1]."),
//!     "Council met [[1]](https://news.example/a)."
//! );
//! ```

use regex::{Captures, Regex};
use std::sync::LazyLock;

use crate::models::ArticleSource;

static MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[SRC(\d+)\]").expect("citation marker pattern is valid"));

/// A trailing, not yet closed marker: `[`, `[S`, `[SR`, `[SRC`, `[SRC12`.
static PARTIAL_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[(?:S(?:R(?:C\d*)?)?)?$").expect("partial marker pattern is valid")
});

/// Placeholder anchor for markers that name no retrieved source.
pub const UNRESOLVED_ANCHOR: &str = "#";

/// `rendered` minus any trailing incomplete marker. Successive settled texts
/// of one answer are literal prefixes of one another, so a terminal can
/// append the difference without ever retracting output.
pub fn settled(rendered: &str) -> &str {
    match PARTIAL_MARKER.find(rendered) {
        Some(m) => &rendered[..m.start()],
        None => rendered,
    }
}

/// Per-run mapping from 1-based ordinal to source URL. Positional: the same
/// URL retrieved twice gets two ordinals.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CitationIndex {
    urls: Vec<String>,
}

impl CitationIndex {
    pub fn new(urls: Vec<String>) -> Self {
        Self { urls }
    }

    pub fn from_sources(sources: &[ArticleSource]) -> Self {
        Self::new(sources.iter().map(|s| s.url.clone()).collect())
    }

    /// URL for ordinal `n` (1-based).
    pub fn url(&self, n: usize) -> Option<&str> {
        n.checked_sub(1)
            .and_then(|i| self.urls.get(i))
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }

    /// Render every complete marker in `text`.
    pub fn render(&self, text: &str) -> String {
        MARKER
            .replace_all(text, |caps: &Captures| {
                let digits = &caps[1];
                let url = digits
                    .parse::<usize>()
                    .ok()
                    .and_then(|n| self.url(n))
                    .unwrap_or(UNRESOLVED_ANCHOR);
                format!("[[{}]]({})", digits, url)
            })
            .into_owned()
    }
}

/// Accumulates raw fragments and keeps the fully rendered text current.
#[derive(Debug, Clone, Default)]
pub struct CitationRewriter {
    index: CitationIndex,
    raw: String,
    rendered: String,
}

impl CitationRewriter {
    pub fn new(index: CitationIndex) -> Self {
        Self {
            index,
            raw: String::new(),
            rendered: String::new(),
        }
    }

    /// Append a fragment and return the rendered text of everything fed so far.
    pub fn feed(&mut self, fragment: &str) -> &str {
        self.raw.push_str(fragment);
        self.rendered = self.index.render(&self.raw);
        &self.rendered
    }

    /// Unrewritten text received so far.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn rendered(&self) -> &str {
        &self.rendered
    }

    /// Rendered text minus any trailing incomplete marker. See [`settled`].
    pub fn settled(&self) -> &str {
        settled(&self.rendered)
    }
}
