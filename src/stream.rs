// src/stream.rs
use std::sync::Arc;

use metrics::counter;
use tokio::sync::mpsc;

use crate::article::Article;
use crate::decision::Decision;
use crate::pipeline::TriagePipeline;

/// Downstream consumer of triage decisions (persistence, serving, a queue).
/// Delivery failures are the sink's own problem to retry; the runner logs
/// and counts them but never stops the feed.
#[async_trait::async_trait]
pub trait DecisionSink: Send + Sync {
    async fn deliver(&self, decision: Decision) -> anyhow::Result<()>;
    fn name(&self) -> &'static str;
}

/// Drain the article channel through the pipeline until the senders hang up.
/// Returns the number of articles processed.
pub async fn run_stream(
    pipeline: Arc<TriagePipeline>,
    mut rx: mpsc::Receiver<Article>,
    sink: &dyn DecisionSink,
) -> usize {
    let mut processed = 0usize;
    while let Some(article) = rx.recv().await {
        let decision = pipeline.process(&article);
        processed += 1;
        if let Err(e) = sink.deliver(decision).await {
            counter!("triage_sink_errors_total", "sink" => sink.name()).increment(1);
            tracing::warn!(
                target: "stream",
                sink = sink.name(),
                error = %e,
                "decision delivery failed"
            );
        }
    }
    tracing::info!(target: "stream", processed, "article stream drained");
    processed
}
