//! Async driver for a `PlaybackEngine`.
//!
//! `run_viewer` owns the engine for the lifetime of one viewer session. It
//! multiplexes the engine's auto-advance deadline, the input channel and a
//! redraw tick, carries out the effects the engine emits, and returns when
//! the engine reaches `Closed`.
//!
//! Viewed-flag writes are queued to a single writer task and never awaited
//! by the loop. The writer applies them one at a time, in the order the
//! stories were opened, on the blocking pool. A failed write is logged and
//! playback carries on. The queue is drained before `run_viewer` returns so
//! the feed reloads what the viewer persisted.

use super::{CloseReason, PlaybackEffect, PlaybackEngine, PlaybackInput, ViewFrame};
use crate::repository::StoryRepository;
use log::{debug, warn};
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

/// Receives frames to draw.
pub trait FrameSink {
    fn frame(&mut self, frame: &ViewFrame) -> io::Result<()>;

    /// Called once after the last frame.
    fn closed(&mut self, _reason: CloseReason) -> io::Result<()> {
        Ok(())
    }
}

/// Collects every frame; useful for tests and headless embedding.
#[derive(Debug, Default)]
pub struct CollectingSink {
    pub frames: Vec<ViewFrame>,
    pub closed: Option<CloseReason>,
}

impl FrameSink for CollectingSink {
    fn frame(&mut self, frame: &ViewFrame) -> io::Result<()> {
        self.frames.push(frame.clone());
        Ok(())
    }

    fn closed(&mut self, reason: CloseReason) -> io::Result<()> {
        self.closed = Some(reason);
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ViewerOptions {
    /// How often to redraw while nothing else happens.
    pub frame_interval: Duration,
}

impl Default for ViewerOptions {
    fn default() -> Self {
        Self {
            frame_interval: Duration::from_millis(250),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewerOutcome {
    pub reason: CloseReason,
    /// Index the viewer was on when it closed.
    pub last_index: usize,
}

/// Run the viewer until it closes.
///
/// Engine time starts at zero when this function is entered. When `inputs`
/// is closed by the sender the viewer keeps auto-advancing to the end.
pub async fn run_viewer<S: FrameSink + ?Sized>(
    mut engine: PlaybackEngine,
    repo: Arc<dyn StoryRepository>,
    mut inputs: mpsc::UnboundedReceiver<PlaybackInput>,
    sink: &mut S,
    options: ViewerOptions,
) -> io::Result<ViewerOutcome> {
    let opened = Instant::now();
    let now_ms = || u64::try_from(opened.elapsed().as_millis()).unwrap_or(u64::MAX);

    let (viewed_tx, viewed_rx) = mpsc::unbounded_channel();
    let writer = spawn_viewed_writer(repo, viewed_rx);
    let mut inputs_open = true;
    let mut redraw = tokio::time::interval(options.frame_interval);
    redraw.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let reason = loop {
        let mut closed = None;
        for effect in engine.drain_effects() {
            match effect {
                PlaybackEffect::MarkViewed { id, .. } => {
                    if let Err(e) = viewed_tx.send(id) {
                        warn!("viewed writer is gone, dropping flag for '{}'", e.0);
                    }
                }
                PlaybackEffect::Closed(reason) => closed = Some(reason),
            }
        }

        if let Some(reason) = closed {
            break reason;
        }

        sink.frame(&engine.frame(now_ms()))?;

        let deadline = engine
            .next_deadline_ms()
            .map(|ms| opened + Duration::from_millis(ms));
        let sleep = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now));

        tokio::select! {
            _ = sleep, if deadline.is_some() => engine.tick(now_ms()),
            input = inputs.recv(), if inputs_open => match input {
                Some(input) => engine.dispatch(input, now_ms()),
                None => {
                    debug!("viewer input closed, playing to the end");
                    inputs_open = false;
                }
            },
            _ = redraw.tick() => {}
        }
    };

    let closed = sink.closed(reason);

    drop(viewed_tx);
    if let Err(e) = writer.await {
        warn!("viewed writer failed: {}", e);
    }
    closed?;

    Ok(ViewerOutcome {
        reason,
        last_index: engine.current_index(),
    })
}

/// Persist viewed flags in arrival order until the sender is dropped.
///
/// Each write runs on the blocking pool, but only one is in flight at a time.
fn spawn_viewed_writer(
    repo: Arc<dyn StoryRepository>,
    mut ids: mpsc::UnboundedReceiver<String>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(id) = ids.recv().await {
            let repo = Arc::clone(&repo);
            let write = tokio::task::spawn_blocking(move || {
                if let Err(e) = repo.mark_viewed(&id) {
                    warn!("could not persist viewed flag for '{}': {}", id, e);
                }
            });
            if let Err(e) = write.await {
                warn!("viewed write task failed: {}", e);
            }
        }
    })
}

/// Convenience: an unbounded input channel for `run_viewer`.
pub fn input_channel() -> (
    mpsc::UnboundedSender<PlaybackInput>,
    mpsc::UnboundedReceiver<PlaybackInput>,
) {
    mpsc::unbounded_channel()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::playback::{PlaybackConfig, PlaybackState, TouchPoint};
    use crate::repository::StoreRepository;
    use crate::store::{KeyValueStore, MemoryStore};
    use crate::story::Story;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const NOW: u64 = 1_700_000_000_000;

    fn stories(n: usize) -> Vec<Story> {
        (0..n)
            .map(|i| Story {
                id: format!("story-{}", i),
                image_ref: format!("data:image/jpeg;base64,{}", i),
                timestamp: NOW - 1000,
                viewed: false,
            })
            .collect()
    }

    fn repo_with(stories: &[Story]) -> Arc<StoreRepository<MemoryStore>> {
        let repo = StoreRepository::new(MemoryStore::new(), Arc::new(ManualClock::new(NOW)));
        repo.save(stories).unwrap();
        Arc::new(repo)
    }

    #[tokio::test(start_paused = true)]
    async fn test_auto_advance_closes_after_all_durations() {
        let feed = stories(3);
        let repo = repo_with(&feed);
        let engine = PlaybackEngine::open(feed, 0, PlaybackConfig::default(), 0).unwrap();
        let (tx, rx) = input_channel();
        drop(tx);
        let mut sink = CollectingSink::default();

        let started = Instant::now();
        let outcome = run_viewer(engine, repo.clone(), rx, &mut sink, ViewerOptions::default())
            .await
            .unwrap();
        let elapsed = started.elapsed();

        assert_eq!(outcome.reason, CloseReason::EndOfFeed);
        assert_eq!(outcome.last_index, 2);
        assert!(elapsed >= Duration::from_millis(9000), "{:?}", elapsed);
        assert!(elapsed < Duration::from_millis(9250), "{:?}", elapsed);
        assert_eq!(sink.closed, Some(CloseReason::EndOfFeed));
        assert!(repo.load().iter().all(|s| s.viewed));
    }

    #[tokio::test(start_paused = true)]
    async fn test_escape_closes_and_persists_opened_story() {
        let feed = stories(3);
        let repo = repo_with(&feed);
        let engine = PlaybackEngine::open(feed, 1, PlaybackConfig::default(), 0).unwrap();
        let (tx, rx) = input_channel();
        tx.send(PlaybackInput::KeyEscape).unwrap();
        let mut sink = CollectingSink::default();

        let outcome = run_viewer(engine, repo.clone(), rx, &mut sink, ViewerOptions::default())
            .await
            .unwrap();

        assert_eq!(outcome.reason, CloseReason::Escape);
        assert_eq!(outcome.last_index, 1);
        let persisted = repo.load();
        assert!(persisted[1].viewed);
        assert!(!persisted[0].viewed);
        assert!(!persisted[2].viewed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_write_failure_does_not_stop_playback() {
        let feed = stories(2);
        let repo = repo_with(&feed);
        repo.store().set_fail_writes(true);
        let engine = PlaybackEngine::open(feed, 0, PlaybackConfig::default(), 0).unwrap();
        let (_tx, rx) = input_channel();
        let mut sink = CollectingSink::default();

        let outcome = run_viewer(engine, repo.clone(), rx, &mut sink, ViewerOptions::default())
            .await
            .unwrap();

        assert_eq!(outcome.reason, CloseReason::EndOfFeed);
        assert!(repo.load().iter().all(|s| !s.viewed));
    }

    #[tokio::test(start_paused = true)]
    async fn test_paused_viewer_does_not_advance() {
        let feed = stories(2);
        let repo = repo_with(&feed);
        let engine = PlaybackEngine::open(feed, 0, PlaybackConfig::default(), 0).unwrap();
        let (tx, rx) = input_channel();
        tx.send(PlaybackInput::TouchStart(TouchPoint::new(10.0, 10.0)))
            .unwrap();
        let mut sink = CollectingSink::default();

        let outcome = {
            let viewer = run_viewer(engine, repo, rx, &mut sink, ViewerOptions::default());
            tokio::pin!(viewer);

            // Held for far longer than a story lasts: still open.
            let held = tokio::time::timeout(Duration::from_secs(30), &mut viewer).await;
            assert!(held.is_err(), "viewer must stay open while paused");

            tx.send(PlaybackInput::CloseButton).unwrap();
            viewer.await.unwrap()
        };
        assert_eq!(outcome.reason, CloseReason::CloseButton);
        assert_eq!(outcome.last_index, 0);

        let last = sink.frames.last().unwrap();
        assert_eq!(last.state, PlaybackState::Paused);
        assert!(!last.progress[0].animating);
    }

    /// A store whose read-modify-writes are slow and which records how many
    /// ran at once.
    #[derive(Default)]
    struct SlowStore {
        inner: MemoryStore,
        active: AtomicUsize,
        peak: AtomicUsize,
    }

    impl KeyValueStore for SlowStore {
        fn get(&self, key: &str) -> io::Result<Option<String>> {
            self.inner.get(key)
        }

        fn set(&self, key: &str, value: &str) -> io::Result<()> {
            self.inner.set(key, value)
        }

        fn update(
            &self,
            key: &str,
            f: &mut dyn FnMut(Option<String>) -> Option<String>,
        ) -> io::Result<()> {
            let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(active, Ordering::SeqCst);
            std::thread::sleep(std::time::Duration::from_millis(5));
            let result = self.inner.update(key, f);
            self.active.fetch_sub(1, Ordering::SeqCst);
            result
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_fast_navigation_persists_every_opened_story() {
        let feed = stories(4);
        let repo = StoreRepository::new(SlowStore::default(), Arc::new(ManualClock::new(NOW)));
        repo.save(&feed).unwrap();
        let repo = Arc::new(repo);
        let engine = PlaybackEngine::open(feed, 0, PlaybackConfig::default(), 0).unwrap();
        let (tx, rx) = input_channel();
        for _ in 0..3 {
            tx.send(PlaybackInput::KeyRight).unwrap();
        }
        tx.send(PlaybackInput::KeyEscape).unwrap();
        let mut sink = CollectingSink::default();

        let outcome = run_viewer(engine, repo.clone(), rx, &mut sink, ViewerOptions::default())
            .await
            .unwrap();

        assert_eq!(outcome.reason, CloseReason::Escape);
        assert_eq!(outcome.last_index, 3);
        let viewed: Vec<bool> = repo.load().iter().map(|s| s.viewed).collect();
        assert_eq!(viewed, vec![true; 4]);
        assert_eq!(repo.store().peak.load(Ordering::SeqCst), 1);
    }
}
