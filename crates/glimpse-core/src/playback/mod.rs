//! Story viewer playback engine.
//!
//! `PlaybackEngine` is an explicit state machine over a snapshot of the
//! feed. It is driven by `PlaybackInput`s pushed onto its queue and by
//! `tick`, which turns an expired timer into a `TimerElapsed` input. Each
//! input is applied in full (index change, viewed effect, timer re-arm)
//! before the next one is taken off the queue.
//!
//! The engine does no I/O. Persisting a viewed flag and notifying the feed
//! that the viewer closed are emitted as `PlaybackEffect`s for the caller to
//! carry out; `session::run_viewer` is the async driver that does so.
//!
//! Time is passed in explicitly as milliseconds since the viewer opened.
//!
//! ```
//! use glimpse_core::playback::{PlaybackConfig, PlaybackEngine, PlaybackInput, PlaybackState};
//! use glimpse_core::Story;
//!
//! let stories: Vec<Story> = (0..2)
//!     .map(|i| Story { id: i.to_string(), image_ref: String::new(), timestamp: 0, viewed: false })
//!     .collect();
//! let mut engine = PlaybackEngine::open(stories, 0, PlaybackConfig::default(), 0).unwrap();
//!
//! engine.dispatch(PlaybackInput::KeyRight, 500);
//! assert_eq!(engine.current_index(), 1);
//!
//! engine.tick(3500);
//! assert_eq!(engine.state(), PlaybackState::Closed);
//! ```

mod gesture;
pub mod session;
mod timer;
mod view;


pub use gesture::{GestureTracker, SwipeDirection, TouchPoint, classify_swipe};
pub use timer::{StoryTimer, TimerToken};
pub use view::{ProgressSegment, ViewFrame};

use crate::config::Config;
use crate::error::{Result, StoryError};
use crate::story::Story;
use log::debug;
use std::collections::VecDeque;
use std::collections::vec_deque::Drain;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    /// Showing a story with the auto-advance timer armed.
    Playing,
    /// A touch is in progress; no auto-advance.
    Paused,
    /// Terminal.
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlaybackInput {
    TimerElapsed(TimerToken),
    /// Recognised swipe towards the left: next story.
    SwipeLeft,
    /// Recognised swipe towards the right: previous story.
    SwipeRight,
    KeyLeft,
    KeyRight,
    KeyEscape,
    PreviousButton,
    NextButton,
    CloseButton,
    TouchStart(TouchPoint),
    TouchMove(TouchPoint),
    TouchEnd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// Auto-advance ran past the last story.
    EndOfFeed,
    Escape,
    CloseButton,
}

/// Side effects requested by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackEffect {
    /// Persist `viewed = true` for this story. Fire-and-forget.
    MarkViewed { index: usize, id: String },
    /// The viewer reached `Closed`; hand control back to the feed.
    Closed(CloseReason),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackConfig {
    pub story_duration_ms: u64,
    pub swipe_threshold: f32,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            story_duration_ms: 3000,
            swipe_threshold: 50.0,
        }
    }
}

impl From<&Config> for PlaybackConfig {
    fn from(config: &Config) -> Self {
        Self {
            story_duration_ms: config.story_duration_ms,
            swipe_threshold: config.swipe_threshold,
        }
    }
}

pub struct PlaybackEngine {
    stories: Vec<Story>,
    current_index: usize,
    state: PlaybackState,
    config: PlaybackConfig,
    timer: StoryTimer,
    gesture: GestureTracker,
    /// Fill of the current segment when the timer was last stopped.
    frozen_progress: f32,
    /// Indices a MarkViewed effect has already been emitted for.
    write_issued: Vec<bool>,
    inbox: VecDeque<PlaybackInput>,
    effects: VecDeque<PlaybackEffect>,
}

impl PlaybackEngine {
    /// Open the viewer over `stories` at `index` and start playing.
    ///
    /// `stories` is a snapshot: later changes to the feed are not observed.
    pub fn open(
        stories: Vec<Story>,
        index: usize,
        config: PlaybackConfig,
        now_ms: u64,
    ) -> Result<Self> {
        if stories.is_empty() {
            return Err(StoryError::EmptyFeed);
        }
        if index >= stories.len() {
            return Err(StoryError::IndexOutOfRange {
                index,
                len: stories.len(),
            });
        }

        let len = stories.len();
        let mut engine = Self {
            stories,
            current_index: index,
            state: PlaybackState::Playing,
            config,
            timer: StoryTimer::new(),
            gesture: GestureTracker::default(),
            frozen_progress: 0.0,
            write_issued: vec![false; len],
            inbox: VecDeque::new(),
            effects: VecDeque::new(),
        };
        engine.enter_playing(now_ms);
        Ok(engine)
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn is_closed(&self) -> bool {
        self.state == PlaybackState::Closed
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    /// The engine's view of the stories, including the viewed flags it set.
    pub fn stories(&self) -> &[Story] {
        &self.stories
    }

    pub fn current_story(&self) -> &Story {
        &self.stories[self.current_index]
    }

    pub fn has_previous(&self) -> bool {
        self.current_index > 0
    }

    pub fn has_next(&self) -> bool {
        self.current_index + 1 < self.stories.len()
    }

    /// When the armed timer expires, if one is armed.
    pub fn next_deadline_ms(&self) -> Option<u64> {
        self.timer.deadline_ms()
    }

    /// Queue an input without applying it.
    pub fn push(&mut self, input: PlaybackInput) {
        self.inbox.push_back(input);
    }

    /// Apply every queued input in order.
    pub fn process(&mut self, now_ms: u64) {
        while let Some(input) = self.inbox.pop_front() {
            self.apply(input, now_ms);
        }
    }

    /// Queue `input` and process the queue.
    pub fn dispatch(&mut self, input: PlaybackInput, now_ms: u64) {
        self.push(input);
        self.process(now_ms);
    }

    /// Fire the timer if it is due at `now_ms`.
    pub fn tick(&mut self, now_ms: u64) {
        if let Some(token) = self.timer.due(now_ms) {
            self.dispatch(PlaybackInput::TimerElapsed(token), now_ms);
        }
    }

    /// Take the effects emitted so far.
    pub fn drain_effects(&mut self) -> Drain<'_, PlaybackEffect> {
        self.effects.drain(..)
    }

    fn apply(&mut self, input: PlaybackInput, now_ms: u64) {
        if self.state == PlaybackState::Closed {
            debug!("viewer closed, ignoring {:?}", input);
            return;
        }

        match input {
            PlaybackInput::TimerElapsed(token) => {
                if self.state != PlaybackState::Playing || !self.timer.fire(token) {
                    debug!("dropping stale timer firing");
                    return;
                }
                if self.has_next() {
                    self.go_to(self.current_index + 1, now_ms);
                } else {
                    self.frozen_progress = 1.0;
                    self.close(CloseReason::EndOfFeed, now_ms);
                }
            }
            PlaybackInput::SwipeLeft | PlaybackInput::KeyRight | PlaybackInput::NextButton => {
                self.step(SwipeDirection::Next, now_ms);
            }
            PlaybackInput::SwipeRight | PlaybackInput::KeyLeft | PlaybackInput::PreviousButton => {
                self.step(SwipeDirection::Previous, now_ms);
            }
            PlaybackInput::KeyEscape => self.close(CloseReason::Escape, now_ms),
            PlaybackInput::CloseButton => self.close(CloseReason::CloseButton, now_ms),
            PlaybackInput::TouchStart(point) => {
                if self.state == PlaybackState::Playing {
                    self.frozen_progress = self.timer.progress(now_ms).unwrap_or(0.0);
                }
                self.timer.cancel();
                self.gesture.begin(point);
                self.state = PlaybackState::Paused;
            }
            PlaybackInput::TouchMove(point) => {
                if self.state == PlaybackState::Paused {
                    self.gesture.move_to(point);
                }
            }
            PlaybackInput::TouchEnd => {
                if self.state != PlaybackState::Paused {
                    return;
                }
                let swipe = self.gesture.finish().and_then(|(dx, dy)| {
                    classify_swipe(dx, dy, self.config.swipe_threshold)
                });
                let target = swipe.and_then(|dir| self.neighbour(dir));
                match target {
                    Some(target) => self.go_to(target, now_ms),
                    // Taps, short drags and swipes past either end resume
                    // the current story from the start.
                    None => self.enter_playing(now_ms),
                }
            }
        }
    }

    fn neighbour(&self, direction: SwipeDirection) -> Option<usize> {
        match direction {
            SwipeDirection::Next if self.has_next() => Some(self.current_index + 1),
            SwipeDirection::Previous if self.has_previous() => Some(self.current_index - 1),
            _ => None,
        }
    }

    fn step(&mut self, direction: SwipeDirection, now_ms: u64) {
        match self.neighbour(direction) {
            Some(target) => self.go_to(target, now_ms),
            None => debug!("{:?} at boundary {}, ignoring", direction, self.current_index),
        }
    }

    fn go_to(&mut self, index: usize, now_ms: u64) {
        self.timer.cancel();
        self.gesture.reset();
        self.current_index = index;
        self.enter_playing(now_ms);
    }

    fn enter_playing(&mut self, now_ms: u64) {
        self.timer.cancel();
        self.state = PlaybackState::Playing;
        self.frozen_progress = 0.0;

        let index = self.current_index;
        self.stories[index].mark_viewed();
        if !self.write_issued[index] {
            self.write_issued[index] = true;
            self.effects.push_back(PlaybackEffect::MarkViewed {
                index,
                id: self.stories[index].id.clone(),
            });
        }

        self.timer.arm(now_ms, self.config.story_duration_ms);
        debug!("playing story {} of {}", index + 1, self.stories.len());
    }

    fn close(&mut self, reason: CloseReason, now_ms: u64) {
        if let Some(progress) = self.timer.progress(now_ms) {
            self.frozen_progress = progress;
        }
        self.timer.cancel();
        self.gesture.reset();
        self.state = PlaybackState::Closed;
        self.effects.push_back(PlaybackEffect::Closed(reason));
        debug!("viewer closed: {:?}", reason);
    }
}
