// src/maintenance.rs
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::pipeline::TriagePipeline;

/// Spawn the periodic retention sweep: expired fingerprints leave the dedup
/// index, idle clusters leave the burst controller, and the size gauges are
/// refreshed. The handle can be aborted at shutdown; a missed tick only
/// delays cleanup, never correctness, since both stores also age entries out
/// at read time.
pub fn spawn_maintenance(pipeline: Arc<TriagePipeline>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        // The first tick fires immediately; skip straight to the cadence.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let (purged, removed) = pipeline.sweep_now(chrono::Utc::now());
            tracing::info!(
                target: "maintenance",
                purged_fingerprints = purged,
                removed_clusters = removed,
                "retention sweep"
            );
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::article::Article;
    use crate::config::TriageConfig;
    use chrono::Utc;

    #[tokio::test(start_paused = true)]
    async fn sweep_task_ticks_on_the_interval() {
        let pipeline =
            Arc::new(TriagePipeline::new(&TriageConfig::default_seed()).expect("build"));
        let a = Article::new(
            "a-1",
            "reuters",
            "Aid convoys reach flooded Aden districts after heavy rain",
            "Relief convoys carrying food and medicine reached the flooded districts of Aden \
             on Tuesday morning, aid workers said, after days of heavy rain cut off several \
             neighbourhoods from the city centre and forced families into shelters.",
            Utc::now(),
            "en",
        );
        pipeline.process(&a);

        let handle = spawn_maintenance(Arc::clone(&pipeline), Duration::from_secs(60));
        // Advance past two ticks; entries are fresh so nothing is purged,
        // but the task must stay alive and keep sweeping.
        tokio::time::sleep(Duration::from_secs(130)).await;
        assert!(!handle.is_finished());
        handle.abort();
    }
}
