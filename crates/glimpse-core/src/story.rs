//! The story record and its expiry rules.

use chrono::{Local, TimeZone};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Retention window: a story is live for 24 hours after creation.
pub const DEFAULT_RETENTION_MS: u64 = 24 * 60 * 60 * 1000;

/// A single expiring image post.
///
/// Serialized as `{ "id", "imageRef", "timestamp", "viewed" }`. Older stores
/// wrote the image under `imageUrl`; that name is still accepted on read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Story {
    pub id: String,
    #[serde(alias = "imageUrl")]
    pub image_ref: String,
    /// Creation time in milliseconds since the Unix epoch.
    pub timestamp: u64,
    pub viewed: bool,
}

/// What the image-acquisition pipeline hands back: a story without a viewed flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewStory {
    pub id: String,
    pub image_ref: String,
    pub timestamp: u64,
}

impl NewStory {
    /// Create a story record with a fresh id.
    pub fn new(image_ref: impl Into<String>, timestamp: u64) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            image_ref: image_ref.into(),
            timestamp,
        }
    }
}

impl From<NewStory> for Story {
    fn from(new: NewStory) -> Self {
        Story {
            id: new.id,
            image_ref: new.image_ref,
            timestamp: new.timestamp,
            viewed: false,
        }
    }
}

impl Story {
    /// Age in milliseconds at `now`. Timestamps in the future count as age 0.
    pub fn age_ms(&self, now: u64) -> u64 {
        now.saturating_sub(self.timestamp)
    }

    pub fn is_live(&self, now: u64, retention_ms: u64) -> bool {
        self.age_ms(now) < retention_ms
    }

    /// Mark as viewed. Returns `true` if the flag changed.
    pub fn mark_viewed(&mut self) -> bool {
        let changed = !self.viewed;
        self.viewed = true;
        changed
    }

    /// Relative age label, e.g. "3 hours ago".
    pub fn time_ago(&self, now: u64) -> String {
        time_ago(self.age_ms(now))
    }

    /// Local wall-clock time of creation as `HH:MM`.
    pub fn clock_label(&self) -> String {
        i64::try_from(self.timestamp)
            .ok()
            .and_then(|ms| Local.timestamp_millis_opt(ms).single())
            .map(|dt| dt.format("%H:%M").to_string())
            .unwrap_or_else(|| "--:--".to_string())
    }
}

/// Keep only the stories that are still live at `now`, preserving order.
pub fn retain_live(stories: &[Story], now: u64, retention_ms: u64) -> Vec<Story> {
    stories
        .iter()
        .filter(|s| s.is_live(now, retention_ms))
        .cloned()
        .collect()
}

fn plural(n: u64, unit: &str) -> String {
    if n > 1 {
        format!("{} {}s ago", n, unit)
    } else {
        format!("{} {} ago", n, unit)
    }
}

fn time_ago(age_ms: u64) -> String {
    let minutes = age_ms / 1000 / 60;
    let hours = minutes / 60;
    let days = hours / 24;

    if days > 0 {
        plural(days, "day")
    } else if hours > 0 {
        plural(hours, "hour")
    } else if minutes > 0 {
        plural(minutes, "minute")
    } else {
        "Just now".to_string()
    }
}
