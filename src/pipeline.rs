// src/pipeline.rs
//! Stage orchestration: gate → classify → tier → dedup → score → burst.
//!
//! `process_at` takes the clock as an argument and touches no global state
//! beyond metrics, so replaying a feed yields identical decisions. Stages
//! short-circuit in order: a gated article is never classified, a duplicate
//! is never scored, and only hard admissions move burst counters.

use chrono::{DateTime, Utc};
use metrics::{counter, gauge};

use crate::article::Article;
use crate::burst::{BurstController, BurstOutcome};
use crate::classify::CategoryClassifier;
use crate::config::TriageConfig;
use crate::decision::{CategoryMatch, Decision, Verdict};
use crate::dedup::{DedupOutcome, Deduplicator};
use crate::gate::{GateOutcome, IngestGate};
use crate::metrics::ensure_metrics_described;
use crate::scoring::HeuristicScorer;
use crate::tiers::TierRegistry;

pub struct TriagePipeline {
    gate: IngestGate,
    classifier: CategoryClassifier,
    tiers: TierRegistry,
    dedup: Deduplicator,
    scorer: HeuristicScorer,
    burst: BurstController,
    downrank_factor: f32,
}

impl TriagePipeline {
    /// Validate the config and compile every stage. Errors here are startup
    /// errors; a built pipeline never fails per article.
    pub fn new(cfg: &TriageConfig) -> anyhow::Result<Self> {
        cfg.validate()?;
        ensure_metrics_described();
        Ok(Self {
            gate: IngestGate::new(&cfg.gate)?,
            classifier: CategoryClassifier::new(&cfg.classify),
            tiers: TierRegistry::new(&cfg.tiers),
            dedup: Deduplicator::new(&cfg.dedup),
            scorer: HeuristicScorer::new(&cfg.scoring),
            burst: BurstController::new(&cfg.burst),
            downrank_factor: cfg.burst.downrank_factor.clamp(0.0, 1.0),
        })
    }

    pub fn process(&self, article: &Article) -> Decision {
        self.process_at(article, Utc::now())
    }

    pub fn process_at(&self, article: &Article, now: DateTime<Utc>) -> Decision {
        // 1) Gate: cheap rejects before any heavier work.
        if let GateOutcome::Reject(reason) = self.gate.evaluate(article) {
            counter!("triage_gate_rejected_total", "reason" => reason.as_str()).increment(1);
            tracing::debug!(
                target: "pipeline",
                article_id = %article.id,
                reason = reason.as_str(),
                "rejected at the gate"
            );
            return Decision::rejected(&article.id, reason);
        }

        // 2) Categories; empty is a valid "uncategorized" result.
        let categories = self.classifier.classify(article);
        if categories.is_empty() {
            counter!("triage_uncategorized_total").increment(1);
        } else {
            counter!("triage_classified_total").increment(1);
        }

        // 3) Source trust profile (unknown sources get the default tier).
        let profile = self.tiers.resolve(&article.source_id);

        // 4) Dedup: duplicates terminate here, keeping categories and tier.
        if let DedupOutcome::DuplicateOf(canonical) = self.dedup.check(article, now) {
            counter!("triage_duplicates_total").increment(1);
            tracing::debug!(
                target: "pipeline",
                article_id = %article.id,
                canonical = %canonical,
                "near-duplicate folded into lineage"
            );
            return Decision::duplicate(&article.id, canonical, categories, profile.tier);
        }

        // 5) Composite score.
        let (score, breakdown) = self.scorer.score(article, &categories, &profile, now);

        // 6) Burst control on the story cluster.
        let cluster = self.cluster_key(article, &categories);
        let (verdict, final_score) = match self.burst.admit(&cluster, now) {
            BurstOutcome::Admit => (Verdict::Admitted, score),
            BurstOutcome::Downrank => (Verdict::Downranked, score * self.downrank_factor),
            BurstOutcome::Suppress => (Verdict::Suppressed, score),
        };
        match verdict {
            Verdict::Admitted => counter!("triage_admitted_total").increment(1),
            Verdict::Downranked => counter!("triage_downranked_total").increment(1),
            Verdict::Suppressed => counter!("triage_suppressed_total").increment(1),
            _ => {}
        }
        tracing::debug!(
            target: "pipeline",
            article_id = %article.id,
            verdict = ?verdict,
            score = final_score,
            cluster = %cluster,
            "decision"
        );

        Decision::scored(
            &article.id,
            verdict,
            categories,
            final_score,
            profile.tier,
            breakdown,
        )
    }

    /// Cluster key for burst accounting: dominant category plus the sorted
    /// locality markers, so "another flood piece about Aden" lands in the
    /// same window regardless of source or wording.
    fn cluster_key(&self, article: &Article, categories: &[CategoryMatch]) -> String {
        let dominant = CategoryClassifier::dominant(categories);
        let hits = self.scorer.marker_hits(article);
        if hits.is_empty() {
            dominant.to_string()
        } else {
            format!("{}|{}", dominant, hits.join("+"))
        }
    }

    /// Run both stores' retention sweeps and refresh the size gauges.
    /// Returns `(fingerprints purged, clusters removed)`.
    pub fn sweep_now(&self, now: DateTime<Utc>) -> (usize, usize) {
        let purged = self.dedup.purge_expired(now);
        let removed = self.burst.sweep_expired(now);
        if purged > 0 {
            counter!("triage_sweep_purged_total").increment(purged as u64);
        }
        gauge!("triage_fingerprint_entries").set(self.dedup.len() as f64);
        gauge!("triage_clusters_active").set(self.burst.active_clusters() as f64);
        (purged, removed)
    }

    /// The live tier registry, for administrative upserts while running.
    pub fn registry(&self) -> &TierRegistry {
        &self.tiers
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::burst::BurstConfig;
    use crate::classify::{CategoryRule, ClassifyConfig, KeywordCfg};
    use crate::decision::RejectReason;
    use crate::gate::GateConfig;
    use crate::scoring::ScoringConfig;
    use crate::tiers::{Tier, TiersConfig};
    use chrono::{Duration, TimeZone};

    fn test_config() -> TriageConfig {
        TriageConfig {
            gate: GateConfig {
                min_tokens: 5,
                languages: vec!["en".into()],
                blocklist: Vec::new(),
            },
            classify: ClassifyConfig {
                title_multiplier: 2.0,
                categories: vec![CategoryRule {
                    name: "humanitarian".into(),
                    threshold: 2.0,
                    keywords: vec![
                        KeywordCfg {
                            phrase: "aid".into(),
                            weight: 1.5,
                        },
                        KeywordCfg {
                            phrase: "displaced".into(),
                            weight: 2.0,
                        },
                    ],
                }],
            },
            tiers: TiersConfig::default_seed(),
            dedup: crate::dedup::DedupConfig::default(),
            scoring: ScoringConfig {
                markers: vec!["aden".into(), "crater".into()],
                ..ScoringConfig::default()
            },
            burst: BurstConfig {
                max_admissions: 1,
                ..BurstConfig::default()
            },
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 10, 9, 0, 0).unwrap()
    }

    fn article(id: &str, source: &str, title: &str, body: &str) -> Article {
        Article::new(id, source, title, body, now(), "en")
    }

    #[test]
    fn gate_reject_short_circuits_everything_else() {
        let p = TriagePipeline::new(&test_config()).expect("build");
        let a = article("a-1", "reuters", "Brief", "Too little.");
        let d = p.process_at(&a, now());
        assert_eq!(d.verdict, Verdict::Rejected);
        assert_eq!(d.reject_reason, Some(RejectReason::TooShort));
        assert!(d.tier.is_none());
        assert!(d.categories.is_empty());
        assert_eq!(p.sweep_now(now()), (0, 0), "nothing was indexed");
    }

    #[test]
    fn clean_article_is_admitted_with_breakdown() {
        let p = TriagePipeline::new(&test_config()).expect("build");
        let a = article(
            "a-1",
            "reuters",
            "Aid convoys reach Aden",
            "Displaced families in Crater received aid packages this morning.",
        );
        let d = p.process_at(&a, now());
        assert_eq!(d.verdict, Verdict::Admitted);
        assert_eq!(d.tier, Some(Tier::Tier1));
        assert_eq!(d.categories.len(), 1);
        assert!(d.score > 50.0, "tier1 fresh local story, got {}", d.score);
        let b = d.breakdown.expect("breakdown present");
        assert!(b.trust > 0.99);
        assert!(b.recency > 0.99);
    }

    #[test]
    fn second_copy_becomes_duplicate_and_keeps_context() {
        let p = TriagePipeline::new(&test_config()).expect("build");
        let body = "Displaced families in Crater received aid packages this morning \
            as convoys entered the port district after days of heavy rain.";
        let a = article("a-1", "reuters", "Aid convoys reach Aden", body);
        let b = article("b-2", "saba news", "Aid convoys reach Aden", body);

        assert_eq!(p.process_at(&a, now()).verdict, Verdict::Admitted);
        let d = p.process_at(&b, now() + Duration::minutes(10));
        assert_eq!(d.verdict, Verdict::Duplicate);
        assert_eq!(d.duplicate_of.as_deref(), Some("a-1"));
        assert_eq!(d.tier, Some(Tier::Tier3), "duplicate keeps its own source tier");
        assert_eq!(d.categories.len(), 1, "categories resolved before dedup");
        assert_eq!(d.score, 0.0);
    }

    #[test]
    fn same_cluster_overflow_is_downranked_at_half_score() {
        let p = TriagePipeline::new(&test_config()).expect("build");
        // Same story cluster (humanitarian|aden+crater), different wording so
        // dedup keeps both.
        let a = article(
            "a-1",
            "reuters",
            "Aid convoys reach Aden",
            "Displaced families in Crater received aid packages this morning.",
        );
        let b = article(
            "b-2",
            "bbc",
            "Aden aid operation widens",
            "Volunteers handed out aid across Crater while displaced residents queued.",
        );
        let first = p.process_at(&a, now());
        assert_eq!(first.verdict, Verdict::Admitted);

        let second = p.process_at(&b, now() + Duration::minutes(5));
        assert_eq!(second.verdict, Verdict::Downranked);
        let fresh = TriagePipeline::new(&test_config()).expect("build");
        let undamped = fresh.process_at(&b, now() + Duration::minutes(5));
        assert!(
            (second.score - undamped.score * 0.5).abs() < 1e-3,
            "downrank halves the score: {} vs {}",
            second.score,
            undamped.score
        );
    }

    #[test]
    fn unknown_source_runs_through_on_the_default_tier() {
        let p = TriagePipeline::new(&test_config()).expect("build");
        let a = article(
            "a-1",
            "some random blog",
            "Aid convoys reach Aden",
            "Displaced families in Crater received aid packages this morning.",
        );
        let d = p.process_at(&a, now());
        assert_eq!(d.verdict, Verdict::Admitted);
        assert_eq!(d.tier, Some(Tier::Tier4));
        let b = d.breakdown.expect("breakdown");
        assert!((b.trust - 0.3).abs() < 1e-6);
    }

    #[test]
    fn sweep_reports_purged_state() {
        let p = TriagePipeline::new(&test_config()).expect("build");
        let a = article(
            "a-1",
            "reuters",
            "Aid convoys reach Aden",
            "Displaced families in Crater received aid packages this morning.",
        );
        p.process_at(&a, now());
        let (purged, removed) = p.sweep_now(now() + Duration::hours(50));
        assert_eq!(purged, 1, "fingerprint aged out");
        assert_eq!(removed, 1, "cluster window idle");
    }

    #[test]
    fn uncategorized_articles_still_flow_to_scoring() {
        let p = TriagePipeline::new(&test_config()).expect("build");
        let a = article(
            "a-1",
            "reuters",
            "Port schedule update for the week",
            "Ferry departures from the harbour resume on their usual timetable.",
        );
        let d = p.process_at(&a, now());
        assert_eq!(d.verdict, Verdict::Admitted);
        assert!(d.categories.is_empty());
        let b = d.breakdown.expect("breakdown");
        assert_eq!(b.category, 0.0);
    }
}
