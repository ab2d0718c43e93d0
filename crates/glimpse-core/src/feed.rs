//! The feed: the authoritative in-memory story list.
//!
//! `FeedController` loads the list at startup, prunes expired stories on a
//! periodic sweep, appends uploads and opens the viewer. It holds the sweep
//! as a wall-clock deadline rather than a task, so the owner decides how to
//! wait for it (`next_sweep_in`) and calls `poll_sweep` when it is due.

use crate::clock::Clock;
use crate::config::Config;
use crate::error::{Result, StoryError};
use crate::playback::{PlaybackConfig, PlaybackEngine};
use crate::repository::StoryRepository;
use crate::story::{NewStory, Story, retain_live};
use log::{debug, info, warn};
use std::collections::HashSet;
use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;

/// A transient, user-facing message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub message: String,
    /// Wall-clock time the notice was raised.
    pub raised_at_ms: u64,
}

pub struct FeedController {
    repo: Arc<dyn StoryRepository>,
    clock: Arc<dyn Clock>,
    playback: PlaybackConfig,
    retention_ms: u64,
    sweep_interval_ms: u64,
    stories: Vec<Story>,
    selected_index: Option<usize>,
    loading: bool,
    next_sweep_ms: Option<u64>,
    notices: Vec<Notice>,
}

impl FeedController {
    pub fn new(repo: Arc<dyn StoryRepository>, clock: Arc<dyn Clock>, config: &Config) -> Self {
        let sweep_interval_ms =
            u64::try_from(config.sweep_interval().as_millis()).unwrap_or(u64::MAX);
        Self {
            repo,
            clock,
            playback: PlaybackConfig::from(config),
            retention_ms: config.retention_ms(),
            sweep_interval_ms,
            stories: Vec::new(),
            selected_index: None,
            loading: false,
            next_sweep_ms: None,
            notices: Vec::new(),
        }
    }

    /// Load the persisted feed and start the sweep schedule.
    pub fn init(&mut self) {
        self.loading = true;
        self.stories = self.repo.load();
        self.loading = false;
        debug!("feed loaded with {} stories", self.stories.len());

        let now = self.clock.now_millis();
        self.next_sweep_ms = Some(now.saturating_add(self.sweep_interval_ms));
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn stories(&self) -> &[Story] {
        &self.stories
    }

    pub fn selected_index(&self) -> Option<usize> {
        self.selected_index
    }

    /// The repository the feed persists through, for the viewer's writes.
    pub fn repository(&self) -> Arc<dyn StoryRepository> {
        Arc::clone(&self.repo)
    }

    pub fn now_millis(&self) -> u64 {
        self.clock.now_millis()
    }

    // ========================================================================
    // Expiry sweep
    // ========================================================================

    /// Drop expired stories from memory and storage. Returns how many were
    /// removed. Storage is only written when something was removed.
    pub fn sweep(&mut self) -> usize {
        let now = self.clock.now_millis();
        let live = retain_live(&self.stories, now, self.retention_ms);
        let removed = self.stories.len() - live.len();
        if removed == 0 {
            return 0;
        }

        if let Err(e) = self.repo.save(&live) {
            warn!("could not persist swept feed: {}", e);
        }
        self.stories = live;
        info!("sweep removed {} expired stories", removed);
        removed
    }

    /// Wall-clock time of the next scheduled sweep, if the schedule is running.
    pub fn next_sweep_at(&self) -> Option<u64> {
        self.next_sweep_ms
    }

    /// Time left until the next sweep is due.
    pub fn next_sweep_in(&self) -> Option<Duration> {
        let now = self.clock.now_millis();
        self.next_sweep_ms
            .map(|at| Duration::from_millis(at.saturating_sub(now)))
    }

    /// Run the sweep if it is due and schedule the next one.
    pub fn poll_sweep(&mut self) -> Option<usize> {
        let now = self.clock.now_millis();
        let due = self.next_sweep_ms.filter(|at| now >= *at)?;
        debug!("sweep due at {}, running at {}", due, now);
        let removed = self.sweep();
        self.next_sweep_ms = Some(now.saturating_add(self.sweep_interval_ms));
        Some(removed)
    }

    /// Stop the sweep schedule.
    pub fn teardown(&mut self) {
        self.next_sweep_ms = None;
    }

    // ========================================================================
    // Viewer
    // ========================================================================

    /// Open the viewer at `index`.
    ///
    /// The story is marked viewed in the feed immediately; persisting the
    /// flag is left to the viewer. The engine works on a snapshot of the
    /// list taken here.
    pub fn select_story(&mut self, index: usize) -> Result<PlaybackEngine> {
        let len = self.stories.len();
        let story = self
            .stories
            .get_mut(index)
            .ok_or(StoryError::IndexOutOfRange { index, len })?;
        story.mark_viewed();
        self.selected_index = Some(index);

        PlaybackEngine::open(self.stories.clone(), index, self.playback, 0)
    }

    /// The viewer closed: clear the selection and pick up the viewed flags
    /// it persisted.
    pub fn close_viewer(&mut self) {
        self.selected_index = None;

        let viewed: HashSet<String> = self
            .repo
            .load()
            .into_iter()
            .filter(|s| s.viewed)
            .map(|s| s.id)
            .collect();
        for story in &mut self.stories {
            if viewed.contains(&story.id) {
                story.mark_viewed();
            }
        }
    }

    // ========================================================================
    // Uploads
    // ========================================================================

    /// Append a story at the end of the feed and persist the list.
    ///
    /// A failed save leaves the story in memory.
    pub fn append_story(&mut self, story: Story) -> Result<()> {
        if self.stories.iter().any(|s| s.id == story.id) {
            return Err(StoryError::DuplicateId(story.id));
        }
        self.stories.push(story);
        if let Err(e) = self.repo.save(&self.stories) {
            warn!("could not persist new story: {}", e);
        }
        Ok(())
    }

    /// Take the outcome of an image upload.
    ///
    /// Success appends the new story and returns it. Failure leaves the feed
    /// untouched and raises a notice carrying the error's message.
    pub fn accept_upload<E: Display>(
        &mut self,
        upload: std::result::Result<NewStory, E>,
    ) -> Option<&Story> {
        let result = match upload {
            Ok(new) => self.append_story(new.into()).map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };
        match result {
            Ok(()) => self.stories.last(),
            Err(message) => {
                warn!("upload rejected: {}", message);
                self.notices.push(Notice {
                    message,
                    raised_at_ms: self.clock.now_millis(),
                });
                None
            }
        }
    }

    /// Take the pending notices.
    pub fn drain_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }
}
