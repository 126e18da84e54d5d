// src/lib.rs
// Public library surface for integration tests (and potential reuse).

pub mod article;
pub mod config;
pub mod decision;
pub mod text;
pub mod tiers;

// Per-article stages, in pipeline order
pub mod gate;
pub mod classify;
pub mod dedup;
pub mod scoring;
pub mod burst;

// Orchestration & background jobs
pub mod pipeline;
pub mod maintenance;
pub mod stream;
pub mod metrics;

// ---- Re-exports for stable public API ----
pub use crate::article::Article;
pub use crate::config::TriageConfig;
pub use crate::decision::{CategoryMatch, Decision, RejectReason, ScoreBreakdown, Verdict};
pub use crate::pipeline::TriagePipeline;
pub use crate::stream::{run_stream, DecisionSink};
pub use crate::tiers::{SourceProfile, Tier, TierRegistry};
