//! SSE parser for streamed Responses API output.
//!
//! Converts a raw byte stream into text fragments. Only
//! `response.output_text.delta` events carry text; `response.completed` (or
//! a `[DONE]` sentinel) ends the stream; `error` and `response.failed`
//! become errors. Lines split across network chunks are buffered as bytes,
//! so multi-byte characters split across chunks decode correctly.
//!
//! With [`TextDeltaStream::idle_timeout`] set, a body that goes quiet for
//! longer than the limit ends the stream with a network error.

use bytes::Bytes;
use futures::stream::{Stream, StreamExt};
use serde::Deserialize;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::time::{Instant, Sleep};

use crate::error::ServiceError;

#[derive(Debug, Deserialize)]
struct StreamEvent {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    delta: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    response: Option<FailedResponse>,
}

#[derive(Debug, Deserialize)]
struct FailedResponse {
    #[serde(default)]
    error: Option<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    message: String,
}

enum Parsed {
    Text(String),
    Finished,
    Failed(ServiceError),
}

type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, ServiceError>> + Send>>;

/// Stream adapter yielding the text deltas of one streamed response.
pub struct TextDeltaStream {
    inner: ByteStream,
    buffer: Vec<u8>,
    upstream_done: bool,
    finished: bool,
    idle: Option<IdleDeadline>,
}

/// Deadline pushed forward every time a chunk arrives.
struct IdleDeadline {
    limit: Duration,
    sleep: Pin<Box<Sleep>>,
}

impl TextDeltaStream {
    pub fn new<S, E>(byte_stream: S) -> Self
    where
        S: Stream<Item = Result<Bytes, E>> + Send + 'static,
        E: std::fmt::Display,
    {
        Self {
            inner: Box::pin(byte_stream.map(|r| r.map_err(|e| ServiceError::Network(e.to_string())))),
            buffer: Vec::new(),
            upstream_done: false,
            finished: false,
            idle: None,
        }
    }

    /// Fail the stream when no bytes arrive for `limit`. Must be called
    /// inside a tokio runtime.
    pub fn idle_timeout(mut self, limit: Duration) -> Self {
        self.idle = Some(IdleDeadline {
            limit,
            sleep: Box::pin(tokio::time::sleep(limit)),
        });
        self
    }

    /// Pull the next meaningful event out of the buffered lines.
    fn next_event(&mut self) -> Option<Parsed> {
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&raw);
            if let Some(parsed) = parse_line(line.trim()) {
                return Some(parsed);
            }
        }
        None
    }
}

fn parse_line(line: &str) -> Option<Parsed> {
    // Blank lines separate events; `event:`/`id:`/`retry:` lines carry nothing we need.
    let data = line.strip_prefix("data:")?.trim();
    if data.is_empty() {
        return None;
    }
    if data == "[DONE]" {
        return Some(Parsed::Finished);
    }

    let event: StreamEvent = match serde_json::from_str(data) {
        Ok(event) => event,
        Err(e) => {
            return Some(Parsed::Failed(ServiceError::Parse(format!(
                "Failed to parse stream event: {} (data: {})",
                e,
                data.chars().take(200).collect::<String>()
            ))))
        }
    };

    match event.kind.as_str() {
        "response.output_text.delta" => event
            .delta
            .filter(|d| !d.is_empty())
            .map(Parsed::Text),
        "response.completed" => Some(Parsed::Finished),
        "error" => Some(Parsed::Failed(ServiceError::Api(
            event.message.unwrap_or_else(|| "stream error".to_string()),
        ))),
        "response.failed" | "response.incomplete" => {
            let message = event
                .response
                .and_then(|r| r.error)
                .map(|e| e.message)
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| event.kind.clone());
            Some(Parsed::Failed(ServiceError::Api(message)))
        }
        _ => None,
    }
}

impl Stream for TextDeltaStream {
    type Item = Result<String, ServiceError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.finished {
            return Poll::Ready(None);
        }

        loop {
            match this.next_event() {
                Some(Parsed::Text(text)) => return Poll::Ready(Some(Ok(text))),
                Some(Parsed::Finished) => {
                    this.finished = true;
                    return Poll::Ready(None);
                }
                Some(Parsed::Failed(e)) => {
                    this.finished = true;
                    return Poll::Ready(Some(Err(e)));
                }
                None => {}
            }

            if this.upstream_done {
                this.finished = true;
                return Poll::Ready(Some(Err(ServiceError::Network(
                    "stream closed before the response completed".to_string(),
                ))));
            }

            match this.inner.as_mut().poll_next(cx) {
                Poll::Ready(Some(Ok(bytes))) => {
                    if let Some(idle) = this.idle.as_mut() {
                        idle.sleep.as_mut().reset(Instant::now() + idle.limit);
                    }
                    this.buffer.extend_from_slice(&bytes);
                }
                Poll::Ready(Some(Err(e))) => {
                    this.finished = true;
                    return Poll::Ready(Some(Err(e)));
                }
                Poll::Ready(None) => {
                    this.upstream_done = true;
                    // A final line without a trailing newline.
                    if !this.buffer.is_empty() {
                        this.buffer.push(b'\n');
                    }
                }
                Poll::Pending => {
                    if let Some(idle) = this.idle.as_mut() {
                        if idle.sleep.as_mut().poll(cx).is_ready() {
                            this.finished = true;
                            return Poll::Ready(Some(Err(ServiceError::Network(format!(
                                "generation stream idle for {:?}",
                                idle.limit
                            )))));
                        }
                    }
                    return Poll::Pending;
                }
            }
        }
    }
}
