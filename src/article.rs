// src/article.rs
//! Raw article input type shared by every pipeline stage.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One syndicated article as handed over by the feed-ingestion collaborator.
/// Immutable once constructed; the pipeline only borrows it for a single pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    /// Stable unique id assigned upstream (e.g., feed guid).
    pub id: String,
    /// Source identifier, e.g. "reuters" or "Aden Al-Ghad".
    pub source_id: String,
    pub title: String,
    pub body: String,
    pub published_at: DateTime<Utc>,
    /// BCP-47-ish language tag, e.g. "en" or "ar-YE".
    pub language: String,
}

impl Article {
    pub fn new(
        id: impl Into<String>,
        source_id: impl Into<String>,
        title: impl Into<String>,
        body: impl Into<String>,
        published_at: DateTime<Utc>,
        language: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            source_id: source_id.into(),
            title: title.into(),
            body: body.into(),
            published_at,
            language: language.into(),
        }
    }

    /// Age in whole seconds at `now`. Future publish timestamps clamp to 0.
    pub fn age_secs(&self, now: DateTime<Utc>) -> u64 {
        (now - self.published_at).num_seconds().max(0) as u64
    }

    /// Primary language subtag, lowercased ("en-US" → "en").
    pub fn language_primary(&self) -> String {
        self.language
            .split(['-', '_'])
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase()
    }
}
