//! Touch gesture tracking and swipe classification.

/// A single-pointer position in the input coordinate system.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TouchPoint {
    pub x: f32,
    pub y: f32,
}

impl TouchPoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Which neighbour a swipe navigates to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwipeDirection {
    /// Finger moved left (negative dx): show the next story.
    Next,
    /// Finger moved right (positive dx): show the previous story.
    Previous,
}

/// Classify a gesture displacement (end minus start).
///
/// A swipe needs more horizontal than vertical travel and horizontal travel
/// strictly greater than `threshold`.
pub fn classify_swipe(dx: f32, dy: f32, threshold: f32) -> Option<SwipeDirection> {
    if dx.abs() > dy.abs() && dx.abs() > threshold {
        if dx > 0.0 {
            Some(SwipeDirection::Previous)
        } else {
            Some(SwipeDirection::Next)
        }
    } else {
        None
    }
}

/// Accumulates one touch-start → touch-move* → touch-end sequence.
#[derive(Debug, Default, Clone)]
pub struct GestureTracker {
    start: Option<TouchPoint>,
    last: Option<TouchPoint>,
}

impl GestureTracker {
    pub fn begin(&mut self, point: TouchPoint) {
        self.start = Some(point);
        self.last = None;
    }

    pub fn move_to(&mut self, point: TouchPoint) {
        if self.start.is_some() {
            self.last = Some(point);
        }
    }

    /// End the gesture and return its displacement `(dx, dy)`.
    ///
    /// A touch that never moved has no displacement.
    pub fn finish(&mut self) -> Option<(f32, f32)> {
        let start = self.start.take()?;
        let end = self.last.take()?;
        Some((end.x - start.x, end.y - start.y))
    }

    pub fn reset(&mut self) {
        self.start = None;
        self.last = None;
    }
}
