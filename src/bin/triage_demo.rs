//! Feed a JSONL stream of articles through the triage pipeline and print one
//! decision per line. Reads the file given as the first argument, or stdin.
//!
//! ```text
//! cargo run --bin triage_demo -- demo-feed.jsonl
//! cat feed.jsonl | cargo run --bin triage_demo
//! ```

use anyhow::Context;
use std::io::BufRead;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use newswire_triage::maintenance::spawn_maintenance;
use newswire_triage::metrics::Metrics;
use newswire_triage::{run_stream, Article, Decision, DecisionSink, TriageConfig, TriagePipeline};

struct StdoutSink;

#[async_trait::async_trait]
impl DecisionSink for StdoutSink {
    async fn deliver(&self, decision: Decision) -> anyhow::Result<()> {
        println!("{}", serde_json::to_string(&decision)?);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "stdout"
    }
}

fn open_input() -> anyhow::Result<Box<dyn BufRead + Send>> {
    match std::env::args().nth(1) {
        Some(path) => {
            let f = std::fs::File::open(&path)
                .with_context(|| format!("cannot open input file {path}"))?;
            Ok(Box::new(std::io::BufReader::new(f)))
        }
        None => Ok(Box::new(std::io::BufReader::new(std::io::stdin()))),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let metrics = Metrics::init();
    let cfg = TriageConfig::load_or_default()?;
    let pipeline = Arc::new(TriagePipeline::new(&cfg)?);
    let _sweeper = spawn_maintenance(Arc::clone(&pipeline), Duration::from_secs(60));

    let input = open_input()?;
    let (tx, rx) = mpsc::channel::<Article>(256);

    // Blocking reader feeds the async runner through the channel.
    let reader = std::thread::spawn(move || {
        for line in input.lines() {
            let line = match line {
                Ok(l) => l,
                Err(e) => {
                    tracing::warn!(error = %e, "input read error, stopping");
                    break;
                }
            };
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_str::<Article>(trimmed) {
                Ok(article) => {
                    if tx.blocking_send(article).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "skipping unparsable line");
                }
            }
        }
    });

    let processed = run_stream(Arc::clone(&pipeline), rx, &StdoutSink).await;
    if let Err(e) = reader.join() {
        tracing::warn!(?e, "reader thread panicked");
    }

    pipeline.sweep_now(chrono::Utc::now());
    tracing::info!(processed, "triage demo finished");
    eprintln!("{}", metrics.render());
    Ok(())
}
