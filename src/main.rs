//! # Dewey CLI (`dewey`)
//!
//! Ask questions about the newspaper archive from the terminal, inspect the
//! individual pipeline stages, or start the HTTP server.
//!
//! ## Usage
//!
//! ```bash
//! dewey --config ./config/dewey.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `dewey ask "<message>"` | Stream a cited answer to stdout, steps to stderr |
//! | `dewey intent "<message>"` | Print the extracted search intent as JSON |
//! | `dewey search "<question>"` | Print the articles retrieved for a question |
//! | `dewey serve` | Start the HTTP server |
//!
//! Service keys come from `AZURE_OPENAI_API_KEY` and `AZURE_SEARCH_API_KEY`;
//! a `.env` file in the working directory is loaded first.

use anyhow::Result;
use clap::{Parser, Subcommand};
use futures::stream::StreamExt;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use dewey::citations::settled;
use dewey::config::{load_config, Config};
use dewey::intent::IntentExtractor;
use dewey::llm::AzureOpenAiClient;
use dewey::models::{DateRange, PipelineStep, SearchIntent};
use dewey::pipeline::Pipeline;
use dewey::progress::{changed_steps, ProgressMode};
use dewey::retrieve::ArticleRetriever;
use dewey::search::AzureSearchClient;
use dewey::server::run_server;

/// Dewey: answers questions from a newspaper archive with cited sources.
#[derive(Parser)]
#[command(
    name = "dewey",
    about = "Dewey: answers questions from a newspaper archive with cited sources",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/dewey.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Answer a question, streaming the cited answer to stdout.
    Ask {
        message: String,

        /// Do not report pipeline steps.
        #[arg(long)]
        no_steps: bool,

        /// Emit every update as one JSON line on stdout instead of plain text.
        #[arg(long)]
        json: bool,

        /// Step progress on stderr: auto, human, json or off.
        #[arg(long, default_value = "auto", value_parser = parse_progress)]
        progress: ProgressMode,
    },

    /// Print the search intent extracted from a message.
    Intent { message: String },

    /// Retrieve articles for a question and list them.
    Search {
        question: String,

        /// Print each source as the JSON line sent to the model.
        #[arg(long)]
        json: bool,
    },

    /// Start the HTTP server on `[server].bind`.
    Serve,
}

fn parse_progress(value: &str) -> Result<ProgressMode, String> {
    ProgressMode::from_flag(value)
        .ok_or_else(|| format!("unknown progress mode '{}' (auto, human, json, off)", value))
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true),
        )
        .init();
}

fn connect(config: &Config) -> Result<(Arc<AzureOpenAiClient>, Arc<AzureSearchClient>)> {
    let model = AzureOpenAiClient::from_env(&config.openai)?;
    let index = AzureSearchClient::from_env(&config.search)?;
    Ok((Arc::new(model), Arc::new(index)))
}

fn build_pipeline(config: &Config) -> Result<Pipeline> {
    let (model, index) = connect(config)?;
    Ok(Pipeline::new(model, index, config.clone()))
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    match cli.command {
        Commands::Ask {
            message,
            no_steps,
            json,
            progress,
        } => ask(&config, &message, no_steps, json, progress).await?,
        Commands::Intent { message } => intent(&config, &message).await?,
        Commands::Search { question, json } => search(&config, &question, json).await?,
        Commands::Serve => {
            let pipeline = build_pipeline(&config)?;
            run_server(&config, pipeline).await?;
        }
    }

    Ok(())
}

async fn ask(
    config: &Config,
    message: &str,
    no_steps: bool,
    json: bool,
    progress: ProgressMode,
) -> Result<()> {
    let message = message.trim();
    if message.is_empty() {
        anyhow::bail!("message must not be empty");
    }

    let pipeline = build_pipeline(config)?;
    let mode = if no_steps || json {
        ProgressMode::Off
    } else {
        progress
    };
    let reporter = mode.reporter();

    let mut updates = Box::pin(pipeline.process(message, &[], !no_steps));
    let mut stdout = std::io::stdout().lock();
    let mut last_steps: Vec<PipelineStep> = Vec::new();
    let mut answer = String::new();
    let mut printed = 0usize;

    while let Some(update) = updates.next().await {
        let update = match update {
            Ok(update) => update,
            Err(e) => {
                if printed > 0 {
                    writeln!(stdout)?;
                }
                return Err(e.into());
            }
        };

        if json {
            writeln!(stdout, "{}", serde_json::to_string(&update)?)?;
            continue;
        }

        for step in changed_steps(&last_steps, &update.steps) {
            reporter.report(step);
        }
        last_steps = update.steps;

        if !update.answer.is_empty() {
            answer = update.answer;
            let ready = settled(&answer);
            if ready.len() > printed {
                stdout.write_all(ready[printed..].as_bytes())?;
                stdout.flush()?;
                printed = ready.len();
            }
        }
    }

    if !json {
        stdout.write_all(answer[printed..].as_bytes())?;
        writeln!(stdout)?;
    }
    Ok(())
}

async fn intent(config: &Config, message: &str) -> Result<()> {
    let (model, index) = connect(config)?;
    let pipeline = Pipeline::new(model.clone(), index, config.clone());
    let conversation = pipeline.conversation(message, &[]);

    let extractor = IntentExtractor::new(model.as_ref(), &config.assistant);
    let intent = extractor
        .extract(&conversation, &pipeline.date_label())
        .await?;
    println!("{}", serde_json::to_string_pretty(&intent)?);
    Ok(())
}

async fn search(config: &Config, question: &str, json: bool) -> Result<()> {
    let (model, index) = connect(config)?;
    let retriever = ArticleRetriever::new(model.as_ref(), index.as_ref(), &config.search);
    let intent = SearchIntent {
        question: question.trim().to_string(),
        date_range: DateRange::default(),
        authors: Vec::new(),
    };
    let sources = retriever.retrieve(&intent).await?;

    if json {
        println!("{}", dewey::retrieve::serialize_sources(&sources)?);
        return Ok(());
    }

    if sources.is_empty() {
        println!("No articles found.");
        return Ok(());
    }

    for (i, source) in sources.iter().enumerate() {
        let byline = if source.authors.is_empty() {
            String::new()
        } else {
            format!("  by {}", source.authors.join(", "))
        };
        println!(
            "{}. {}  ({}){}",
            i + 1,
            source.headline.trim(),
            source.publish_date,
            byline
        );
        println!("   {}", source.url);
    }
    Ok(())
}
