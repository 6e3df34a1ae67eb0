//! # Dewey
//!
//! Question answering over a newspaper archive, with every claim linked back
//! to the article it came from.
//!
//! A run takes the reader's message and conversation history, asks the
//! language model for a structured search intent, retrieves the best
//! matching articles with one hybrid (keyword + vector + semantic) query, and
//! streams a generated answer in which `[SRC<n>]` markers are rewritten into
//! Markdown links to the cited articles.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────────┐   ┌─────────────┐   ┌────────────┐
//! │  Caller  │──▶│    Intent    │──▶│  Retrieval  │──▶│ Generation │
//! │ CLI/HTTP │   │ (forced call)│   │ (embed+hyb) │   │  (stream)  │
//! └────▲─────┘   └──────────────┘   └─────────────┘   └─────┬──────┘
//!      │                                                    │
//!      └──────────── steps + rewritten answer ◀── citations ◀┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! export AZURE_OPENAI_API_KEY=... AZURE_SEARCH_API_KEY=...
//! dewey ask "What happened at City Hall yesterday?"
//! dewey serve
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`error`] | Error kinds |
//! | [`models`] | Core data types |
//! | [`steps`] | Per-run progress steps |
//! | [`summary`] | Step summary text |
//! | [`prompts`] | Model instructions and function schema |
//! | [`llm`] | Language-model boundary and Azure OpenAI client |
//! | [`sse`] | Streaming response parser |
//! | [`search`] | Search boundary and Azure AI Search client |
//! | [`intent`] | Intent extraction |
//! | [`retrieve`] | Article retrieval and normalization |
//! | [`citations`] | Streaming citation rewriting |
//! | [`pipeline`] | Run orchestration |
//! | [`progress`] | CLI step reporting |
//! | [`server`] | HTTP server |

pub mod citations;
pub mod config;
pub mod error;
pub mod intent;
pub mod llm;
pub mod models;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod retrieve;
pub mod search;
pub mod server;
pub mod sse;
pub mod steps;
pub mod summary;
