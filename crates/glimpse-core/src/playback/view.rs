//! Render projection of the engine state.
//!
//! A `ViewFrame` is everything a front-end needs to draw the viewer at one
//! instant. It is computed from the engine and the current time and carries
//! no behaviour of its own.

use super::{PlaybackEngine, PlaybackState};

/// One progress bar at the top of the viewer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressSegment {
    /// Fill in `0.0..=1.0`.
    pub fill: f32,
    /// True only for the current story while playing.
    pub animating: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ViewFrame {
    pub state: PlaybackState,
    pub current_index: usize,
    pub total: usize,
    pub image_ref: String,
    /// `HH:MM` creation time of the current story.
    pub clock_label: String,
    pub progress: Vec<ProgressSegment>,
    pub has_previous: bool,
    pub has_next: bool,
    /// Time until auto-advance, when the timer is armed.
    pub remaining_ms: Option<u64>,
}

impl PlaybackEngine {
    pub fn frame(&self, now_ms: u64) -> ViewFrame {
        let playing = self.state == PlaybackState::Playing;
        let current_fill = if playing {
            self.timer.progress(now_ms).unwrap_or(0.0)
        } else {
            self.frozen_progress
        };

        let progress = (0..self.stories.len())
            .map(|idx| {
                if idx < self.current_index {
                    ProgressSegment {
                        fill: 1.0,
                        animating: false,
                    }
                } else if idx == self.current_index {
                    ProgressSegment {
                        fill: current_fill,
                        animating: playing,
                    }
                } else {
                    ProgressSegment {
                        fill: 0.0,
                        animating: false,
                    }
                }
            })
            .collect();

        let story = self.current_story();
        ViewFrame {
            state: self.state,
            current_index: self.current_index,
            total: self.stories.len(),
            image_ref: story.image_ref.clone(),
            clock_label: story.clock_label(),
            progress,
            has_previous: self.has_previous(),
            has_next: self.has_next(),
            remaining_ms: self
                .timer
                .deadline_ms()
                .map(|deadline| deadline.saturating_sub(now_ms)),
        }
    }
}
