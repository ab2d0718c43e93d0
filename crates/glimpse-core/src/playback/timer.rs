//! The viewer's single auto-advance timer.
//!
//! At most one timer is armed at any time: arming always cancels the
//! previous one. Every arm hands out a fresh `TimerToken`, and a firing is
//! only honoured if its token is still the armed one, so an elapsed event
//! that raced with a cancel is dropped.

/// Identifies one arming of the timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerToken(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ArmedTimer {
    token: TimerToken,
    armed_at_ms: u64,
    deadline_ms: u64,
}

#[derive(Debug, Default)]
pub struct StoryTimer {
    next_token: u64,
    armed: Option<ArmedTimer>,
}

impl StoryTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm a one-shot timer for `duration_ms`, replacing any armed one.
    pub fn arm(&mut self, now_ms: u64, duration_ms: u64) -> TimerToken {
        self.cancel();
        let token = TimerToken(self.next_token);
        self.next_token = self.next_token.wrapping_add(1);
        self.armed = Some(ArmedTimer {
            token,
            armed_at_ms: now_ms,
            deadline_ms: now_ms.saturating_add(duration_ms),
        });
        token
    }

    /// Disarm. Returns the token that was armed, if any.
    pub fn cancel(&mut self) -> Option<TimerToken> {
        self.armed.take().map(|armed| armed.token)
    }

    pub fn is_armed(&self) -> bool {
        self.armed.is_some()
    }

    pub fn token(&self) -> Option<TimerToken> {
        self.armed.map(|armed| armed.token)
    }

    pub fn deadline_ms(&self) -> Option<u64> {
        self.armed.map(|armed| armed.deadline_ms)
    }

    /// The armed token if its deadline has passed at `now_ms`.
    pub fn due(&self, now_ms: u64) -> Option<TimerToken> {
        self.armed
            .filter(|armed| now_ms >= armed.deadline_ms)
            .map(|armed| armed.token)
    }

    /// Consume a firing. Returns `false` for stale tokens.
    pub fn fire(&mut self, token: TimerToken) -> bool {
        if self.token() == Some(token) {
            self.armed = None;
            true
        } else {
            false
        }
    }

    /// How far through its duration the armed timer is, in `0.0..=1.0`.
    pub fn progress(&self, now_ms: u64) -> Option<f32> {
        self.armed.map(|armed| {
            let total = armed.deadline_ms.saturating_sub(armed.armed_at_ms);
            if total == 0 {
                return 1.0;
            }
            let elapsed = now_ms.saturating_sub(armed.armed_at_ms).min(total);
            elapsed as f32 / total as f32
        })
    }
}
