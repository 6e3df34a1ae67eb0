//! HTTP surface against a pipeline wired to fake services.

use async_trait::async_trait;
use futures::stream;
use serde_json::Value;
use std::sync::Arc;

use dewey::config::Config;
use dewey::error::ServiceError;
use dewey::llm::{FunctionCall, LanguageModel, TextStream};
use dewey::models::ConversationTurn;
use dewey::pipeline::Pipeline;
use dewey::search::{ArticleIndex, HybridQuery, RawArticle, StoredAuthors};
use dewey::server::router;

struct ScriptedModel {
    arguments: Option<String>,
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn call_function(&self, _call: FunctionCall<'_>) -> Result<Option<String>, ServiceError> {
        Ok(self.arguments.clone())
    }

    async fn embed(&self, _text: &str) -> Result<Vec<f32>, ServiceError> {
        Ok(vec![1.0])
    }

    async fn stream_text(
        &self,
        _instructions: &str,
        _messages: &[ConversationTurn],
    ) -> Result<TextStream, ServiceError> {
        let fragments = vec![Ok("Budget passed ".to_string()), Ok("[SRC1].".to_string())];
        Ok(Box::pin(stream::iter(fragments)))
    }
}

struct OneArticle;

#[async_trait]
impl ArticleIndex for OneArticle {
    async fn hybrid_search(&self, _query: &HybridQuery) -> Result<Vec<RawArticle>, ServiceError> {
        Ok(vec![RawArticle {
            url: "https://news.example/budget".to_string(),
            headline: "Budget passes".to_string(),
            publish_date: "2024-06-13".to_string(),
            content: "Council passed the budget.".to_string(),
            authors: StoredAuthors::List(vec![]),
        }])
    }
}

const INTENT: &str = r#"{"question":"Did the budget pass?","date_range":{"start_date":null,"end_date":null},"authors":[]}"#;

async fn serve(arguments: Option<&str>) -> String {
    let pipeline = Pipeline::new(
        Arc::new(ScriptedModel {
            arguments: arguments.map(str::to_string),
        }),
        Arc::new(OneArticle),
        Config::minimal(),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router(pipeline)).await.unwrap();
    });
    format!("http://{}", addr)
}

/// `(event, data)` pairs of an SSE body.
fn parse_events(body: &str) -> Vec<(String, Value)> {
    body.split("\n\n")
        .filter(|block| !block.trim().is_empty())
        .filter_map(|block| {
            let mut event = String::new();
            let mut data = String::new();
            for line in block.lines() {
                if let Some(v) = line.strip_prefix("event:") {
                    event = v.trim().to_string();
                } else if let Some(v) = line.strip_prefix("data:") {
                    data.push_str(v.trim());
                }
            }
            if event.is_empty() {
                return None;
            }
            Some((event, serde_json::from_str(&data).unwrap()))
        })
        .collect()
}

#[tokio::test]
async fn health_reports_version() {
    let base = serve(Some(INTENT)).await;
    let body: Value = reqwest::get(format!("{}/health", base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn ask_streams_updates_then_done() {
    let base = serve(Some(INTENT)).await;
    let response = reqwest::Client::new()
        .post(format!("{}/ask", base))
        .json(&serde_json::json!({ "message": "Did the budget pass?" }))
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());
    assert!(response
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .starts_with("text/event-stream"));

    let events = parse_events(&response.text().await.unwrap());
    let (last_event, _) = events.last().unwrap();
    assert_eq!(last_event, "done");

    let updates: Vec<&Value> = events
        .iter()
        .filter(|(e, _)| e == "update")
        .map(|(_, d)| d)
        .collect();
    // 4 step events + 2 fragments
    assert_eq!(updates.len(), 6);
    assert_eq!(updates[0]["steps"][0]["title"], "Generating metadata");
    assert_eq!(updates[0]["steps"][0]["status"], "pending");
    let last = updates.last().unwrap();
    assert_eq!(last["answer"], "Budget passed [[1]](https://news.example/budget).");
    assert_eq!(last["steps"][1]["status"], "done");
}

#[tokio::test]
async fn ask_without_steps() {
    let base = serve(Some(INTENT)).await;
    let body = reqwest::Client::new()
        .post(format!("{}/ask", base))
        .json(&serde_json::json!({ "message": "Did the budget pass?", "history": [], "show_steps": false }))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    let events = parse_events(&body);
    let updates: Vec<_> = events.iter().filter(|(e, _)| e == "update").collect();
    assert_eq!(updates.len(), 2);
    assert!(updates.iter().all(|(_, d)| d["steps"].as_array().unwrap().is_empty()));
}

#[tokio::test]
async fn run_failure_ends_with_error_event() {
    let base = serve(None).await;
    let body = reqwest::Client::new()
        .post(format!("{}/ask", base))
        .json(&serde_json::json!({ "message": "Did the budget pass?", "show_steps": false }))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    let events = parse_events(&body);
    assert_eq!(events.len(), 1);
    let (event, data) = &events[0];
    assert_eq!(event, "error");
    assert_eq!(data["error"]["code"], "intent_extraction");
}

#[tokio::test]
async fn empty_message_is_bad_request() {
    let base = serve(Some(INTENT)).await;
    let response = reqwest::Client::new()
        .post(format!("{}/ask", base))
        .json(&serde_json::json!({ "message": "  " }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"]["code"], "bad_request");
}
