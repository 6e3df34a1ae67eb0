//! Document-search service boundary.
//!
//! [`ArticleIndex`] runs one hybrid query (keyword + vector + semantic
//! re-ranking) and returns hits in the service's rank order.
//! [`AzureSearchClient`] implements it against an Azure AI Search index
//! whose documents carry `url`, `headline`, `publish_date`, `content`,
//! `authors`, and a `content_vector` embedding field.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::{require_secret, SearchConfig, SEARCH_KEY_VAR};
use crate::error::{DeweyError, ServiceError};

/// Fields requested from the index, in projection order.
pub const SELECT_FIELDS: [&str; 5] = ["url", "headline", "publish_date", "content", "authors"];

/// One hybrid query.
#[derive(Debug, Clone)]
pub struct HybridQuery {
    /// Raw question text, used for keyword and semantic ranking.
    pub text: String,
    pub vector: Vec<f32>,
    /// Nearest-neighbour candidates for the vector leg.
    pub k_nearest: usize,
    /// Result cap.
    pub top: usize,
    pub semantic: bool,
}

/// An index hit before normalization.
#[derive(Debug, Clone, Deserialize)]
pub struct RawArticle {
    pub url: String,
    pub headline: String,
    pub publish_date: String,
    pub content: String,
    pub authors: StoredAuthors,
}

/// The index stores authors as a JSON-encoded string list; some indexes
/// return a native collection instead.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum StoredAuthors {
    List(Vec<String>),
    Encoded(String),
}

#[async_trait]
pub trait ArticleIndex: Send + Sync {
    async fn hybrid_search(&self, query: &HybridQuery) -> Result<Vec<RawArticle>, ServiceError>;
}

/// [`ArticleIndex`] backed by Azure AI Search.
#[derive(Clone)]
pub struct AzureSearchClient {
    http: reqwest::Client,
    endpoint: String,
    index: String,
    api_key: String,
    api_version: String,
    semantic_configuration: String,
    vector_field: String,
}

impl AzureSearchClient {
    pub fn new(config: &SearchConfig, api_key: impl Into<String>) -> Result<Self, DeweyError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(DeweyError::Configuration(
                "Azure AI Search API key must not be empty".into(),
            ));
        }
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| DeweyError::Configuration(format!("HTTP client: {}", e)))?;

        Ok(Self {
            http,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            index: config.index.clone(),
            api_key,
            api_version: config.api_version.clone(),
            semantic_configuration: config.semantic_configuration.clone(),
            vector_field: config.vector_field.clone(),
        })
    }

    /// Build a client with the key from `AZURE_SEARCH_API_KEY`.
    pub fn from_env(config: &SearchConfig) -> Result<Self, DeweyError> {
        let key = require_secret(SEARCH_KEY_VAR)?;
        Self::new(config, key)
    }

    fn search_url(&self) -> String {
        format!(
            "{}/indexes/{}/docs/search?api-version={}",
            self.endpoint, self.index, self.api_version
        )
    }

    fn request_body<'a>(&'a self, query: &'a HybridQuery) -> SearchBody<'a> {
        SearchBody {
            search: &query.text,
            top: query.top,
            select: SELECT_FIELDS.join(","),
            vector_queries: vec![VectorQuery {
                kind: "vector",
                vector: &query.vector,
                k: query.k_nearest,
                fields: &self.vector_field,
            }],
            query_type: query.semantic.then_some("semantic"),
            semantic_configuration: query.semantic.then_some(self.semantic_configuration.as_str()),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchBody<'a> {
    search: &'a str,
    top: usize,
    select: String,
    vector_queries: Vec<VectorQuery<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    query_type: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    semantic_configuration: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct VectorQuery<'a> {
    kind: &'static str,
    vector: &'a [f32],
    k: usize,
    fields: &'a str,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    value: Vec<RawArticle>,
}

#[async_trait]
impl ArticleIndex for AzureSearchClient {
    async fn hybrid_search(&self, query: &HybridQuery) -> Result<Vec<RawArticle>, ServiceError> {
        let start = std::time::Instant::now();
        let response = self
            .http
            .post(self.search_url())
            .header("api-key", &self.api_key)
            .json(&self.request_body(query))
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "Azure AI Search request failed");
                ServiceError::from(e)
            })?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            warn!(status = %status, error = %body_text, "Azure AI Search API error");
            return Err(ServiceError::Api(format!("{}: {}", status, body_text)));
        }

        let parsed: SearchResponse = response.json().await?;

        debug!(
            index = %self.index,
            hits = parsed.value.len(),
            duration_ms = start.elapsed().as_millis(),
            "Azure AI Search hybrid query"
        );

        Ok(parsed.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn query() -> HybridQuery {
        HybridQuery {
            text: "What happened at City Hall?".to_string(),
            vector: vec![0.25, -0.5],
            k_nearest: 50,
            top: 10,
            semantic: true,
        }
    }

    #[test]
    fn body_combines_text_vector_and_semantic_ranking() {
        let client = AzureSearchClient::new(&Config::minimal().search, "key").unwrap();
        let q = query();
        let body = serde_json::to_value(client.request_body(&q)).unwrap();
        assert_eq!(body["search"], "What happened at City Hall?");
        assert_eq!(body["top"], 10);
        assert_eq!(body["select"], "url,headline,publish_date,content,authors");
        assert_eq!(body["queryType"], "semantic");
        assert_eq!(body["semanticConfiguration"], "default");
        assert_eq!(body["vectorQueries"][0]["kind"], "vector");
        assert_eq!(body["vectorQueries"][0]["k"], 50);
        assert_eq!(body["vectorQueries"][0]["fields"], "content_vector");
        assert_eq!(body["vectorQueries"][0]["vector"][1], -0.5);
    }

    #[test]
    fn body_omits_semantic_fields_when_disabled() {
        let client = AzureSearchClient::new(&Config::minimal().search, "key").unwrap();
        let mut q = query();
        q.semantic = false;
        let body = serde_json::to_value(client.request_body(&q)).unwrap();
        assert!(body.get("queryType").is_none());
        assert!(body.get("semanticConfiguration").is_none());
    }

    #[test]
    fn authors_accept_both_encodings() {
        let encoded: StoredAuthors = serde_json::from_str(r#""[\"Ana Ruiz\"]""#).unwrap();
        assert_eq!(encoded, StoredAuthors::Encoded("[\"Ana Ruiz\"]".to_string()));
        let list: StoredAuthors = serde_json::from_str(r#"["Ana Ruiz"]"#).unwrap();
        assert_eq!(list, StoredAuthors::List(vec!["Ana Ruiz".to_string()]));
    }

    #[test]
    fn search_url_targets_index() {
        let client = AzureSearchClient::new(&Config::minimal().search, "key").unwrap();
        assert_eq!(
            client.search_url(),
            "https://example.search.windows.net/indexes/articles/docs/search?api-version=2024-07-01"
        );
    }
}
