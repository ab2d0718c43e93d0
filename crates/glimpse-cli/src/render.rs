//! Terminal presentation of the feed and the viewer.

use glimpse_core::playback::session::FrameSink;
use glimpse_core::playback::{CloseReason, PlaybackState, ProgressSegment, ViewFrame};
use glimpse_core::{Notice, Story};
use std::fmt::Write as _;
use std::io::{self, Write};

pub const EMPTY_FEED_HINT: &str = "No stories yet. Add one with `glimpse add <PATH>`.";

/// One line per live story: index, viewed marker, age.
pub fn format_feed(stories: &[Story], now: u64) -> String {
    if stories.is_empty() {
        return EMPTY_FEED_HINT.to_string();
    }
    let mut out = String::new();
    for (idx, story) in stories.iter().enumerate() {
        let marker = if story.viewed { ' ' } else { '*' };
        let _ = writeln!(
            out,
            "{:>3} {} {:<16} {}",
            idx,
            marker,
            story.time_ago(now),
            describe_image(&story.image_ref)
        );
    }
    out.pop();
    out
}

/// Short form of an image reference: data URLs show type and size.
pub fn describe_image(image_ref: &str) -> String {
    match image_ref
        .strip_prefix("data:")
        .and_then(|rest| rest.split_once(";base64,"))
    {
        // base64 inflates by 4/3
        Some((mime, payload)) => format!("{} ({})", mime, human_size(payload.len() / 4 * 3)),
        None => image_ref.to_string(),
    }
}

fn human_size(bytes: usize) -> String {
    if bytes >= 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else if bytes >= 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{} B", bytes)
    }
}

/// Progress bars, one cell per story.
pub fn progress_bar(segments: &[ProgressSegment]) -> String {
    segments
        .iter()
        .map(|segment| match segment.fill {
            f if f >= 1.0 => '#',
            f if f > 0.0 => '=',
            _ => '-',
        })
        .collect()
}

pub fn print_notices(notices: &[Notice]) {
    for notice in notices {
        eprintln!("[NOTICE] {}", notice.message);
    }
}

/// Seconds left on the current story, or `--` while the timer is stopped.
fn remaining_label(remaining_ms: Option<u64>) -> String {
    match remaining_ms {
        Some(ms) => format!("{:.1}s", ms as f64 / 1000.0),
        None => "--".to_string(),
    }
}

fn close_message(reason: CloseReason) -> &'static str {
    match reason {
        CloseReason::EndOfFeed => "end of stories",
        CloseReason::Escape => "closed",
        CloseReason::CloseButton => "closed",
    }
}

/// Writes a status line whenever the viewer moves to another story or
/// changes state. Redraws that change neither are skipped.
pub struct TerminalSink<W: Write> {
    out: W,
    last: Option<(usize, PlaybackState)>,
}

impl<W: Write> TerminalSink<W> {
    pub fn new(out: W) -> Self {
        Self { out, last: None }
    }
}

impl<W: Write> FrameSink for TerminalSink<W> {
    fn frame(&mut self, frame: &ViewFrame) -> io::Result<()> {
        let key = (frame.current_index, frame.state);
        if self.last == Some(key) {
            return Ok(());
        }
        self.last = Some(key);

        let state = match frame.state {
            PlaybackState::Playing => "playing",
            PlaybackState::Paused => "paused",
            PlaybackState::Closed => "closed",
        };
        let nav = match (frame.has_previous, frame.has_next) {
            (true, true) => "< >",
            (true, false) => "<  ",
            (false, true) => "  >",
            (false, false) => "   ",
        };
        writeln!(
            self.out,
            "[{}/{}] {} {} {} {:<7} {:>5} {}",
            frame.current_index + 1,
            frame.total,
            progress_bar(&frame.progress),
            nav,
            frame.clock_label,
            state,
            remaining_label(frame.remaining_ms),
            describe_image(&frame.image_ref)
        )?;
        self.out.flush()
    }

    fn closed(&mut self, reason: CloseReason) -> io::Result<()> {
        writeln!(self.out, "[viewer {}]", close_message(reason))?;
        self.out.flush()
    }
}
