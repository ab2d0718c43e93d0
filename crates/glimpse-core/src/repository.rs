//! Load, save and mark-viewed over the persisted story collection.
//!
//! Reads fail closed: anything that cannot be read or parsed as a list of
//! stories is treated as an empty feed. Loading never writes; expired
//! stories are only pruned from storage by an explicit `save` (the feed's
//! sweep).

use crate::clock::Clock;
use crate::error::Result;
use crate::story::{DEFAULT_RETENTION_MS, Story, retain_live};
use crate::store::KeyValueStore;
use log::{debug, warn};
use std::sync::Arc;

/// Storage key the feed is persisted under.
pub const STORIES_KEY: &str = "stories";

/// Persistence operations the feed and the viewer rely on.
pub trait StoryRepository: Send + Sync {
    /// Live stories in persisted order. Never fails; unreadable data is empty.
    fn load(&self) -> Vec<Story>;

    /// Replace the persisted collection with exactly `stories`.
    fn save(&self, stories: &[Story]) -> Result<()>;

    /// Set `viewed` on the persisted story with this id. Unknown ids are a
    /// no-op.
    fn mark_viewed(&self, id: &str) -> Result<()>;
}

/// `StoryRepository` backed by a `KeyValueStore`.
pub struct StoreRepository<S> {
    store: S,
    key: String,
    clock: Arc<dyn Clock>,
    retention_ms: u64,
}

impl<S: KeyValueStore> StoreRepository<S> {
    pub fn new(store: S, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            key: STORIES_KEY.to_string(),
            clock,
            retention_ms: DEFAULT_RETENTION_MS,
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    pub fn with_retention_ms(mut self, retention_ms: u64) -> Self {
        self.retention_ms = retention_ms;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Every persisted story, expired ones included.
    pub fn load_unfiltered(&self) -> Vec<Story> {
        match self.store.get(&self.key) {
            Ok(Some(raw)) => parse_stories(&self.key, &raw).unwrap_or_default(),
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!("reading '{}' failed, treating feed as empty: {}", self.key, e);
                Vec::new()
            }
        }
    }
}

fn parse_stories(key: &str, raw: &str) -> Option<Vec<Story>> {
    match serde_json::from_str::<Vec<Story>>(raw) {
        Ok(stories) => Some(stories),
        Err(e) => {
            warn!("'{}' is not a story list, treating feed as empty: {}", key, e);
            None
        }
    }
}

impl<S: KeyValueStore> StoryRepository for StoreRepository<S> {
    fn load(&self) -> Vec<Story> {
        let now = self.clock.now_millis();
        let all = self.load_unfiltered();
        let live = retain_live(&all, now, self.retention_ms);
        if live.len() != all.len() {
            debug!("load skipped {} expired stories", all.len() - live.len());
        }
        live
    }

    fn save(&self, stories: &[Story]) -> Result<()> {
        let json = serde_json::to_string(stories)?;
        self.store.set(&self.key, &json)?;
        debug!("saved {} stories under '{}'", stories.len(), self.key);
        Ok(())
    }

    fn mark_viewed(&self, id: &str) -> Result<()> {
        let key = self.key.as_str();
        self.store.update(key, &mut |current| {
            let mut stories = parse_stories(key, &current?)?;
            let story = stories.iter_mut().find(|s| s.id == id)?;
            if !story.mark_viewed() {
                return None;
            }
            match serde_json::to_string(&stories) {
                Ok(json) => Some(json),
                Err(e) => {
                    warn!("could not re-encode stories after marking '{}': {}", id, e);
                    None
                }
            }
        })?;
        Ok(())
    }
}
