//! Line-driven viewer input.
//!
//! Stdin is read on a plain thread and handed over as lines, so a viewer
//! can be fed from a pipe or a terminal and the feed REPL can share the
//! same reader.

use glimpse_core::StoryRepository;
use glimpse_core::playback::session::{
    FrameSink, ViewerOptions, ViewerOutcome, input_channel, run_viewer,
};
use glimpse_core::playback::{PlaybackEngine, PlaybackInput, TouchPoint};
use std::io::{self, BufRead};
use std::sync::Arc;
use std::thread;
use tokio::sync::mpsc;

/// Where a synthesized gesture starts. Only the displacement matters.
const GESTURE_ORIGIN: TouchPoint = TouchPoint { x: 0.0, y: 0.0 };

/// Start reading stdin lines in the background. The receiver yields `None`
/// once stdin is closed.
pub fn stdin_lines() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

/// Translate one input line into viewer inputs.
///
/// Returns `None` for lines that are not viewer commands.
pub fn parse_input(line: &str) -> Option<Vec<PlaybackInput>> {
    let mut words = line.split_whitespace();
    let command = words.next()?.to_ascii_lowercase();
    let inputs = match command.as_str() {
        "h" | "left" | "prev" => vec![PlaybackInput::KeyLeft],
        "l" | "right" | "next" => vec![PlaybackInput::KeyRight],
        "q" | "esc" => vec![PlaybackInput::KeyEscape],
        "close" => vec![PlaybackInput::CloseButton],
        "hold" => vec![PlaybackInput::TouchStart(GESTURE_ORIGIN)],
        "release" => vec![PlaybackInput::TouchEnd],
        "swipe" => {
            let dx: f32 = words.next()?.parse().ok()?;
            let dy: f32 = words.next().map_or(Some(0.0), |w| w.parse().ok())?;
            vec![
                PlaybackInput::TouchStart(GESTURE_ORIGIN),
                PlaybackInput::TouchMove(TouchPoint::new(
                    GESTURE_ORIGIN.x + dx,
                    GESTURE_ORIGIN.y + dy,
                )),
                PlaybackInput::TouchEnd,
            ]
        }
        _ => return None,
    };
    Some(inputs)
}

/// Run a viewer session fed from `lines`.
///
/// If `lines` ends the viewer is left to play to the end of the feed.
pub async fn run_with_lines<S: FrameSink>(
    engine: PlaybackEngine,
    repo: Arc<dyn StoryRepository>,
    lines: &mut mpsc::UnboundedReceiver<String>,
    sink: &mut S,
    options: ViewerOptions,
) -> io::Result<ViewerOutcome> {
    let (tx, rx) = input_channel();
    let mut tx = Some(tx);

    let viewer = run_viewer(engine, repo, rx, sink, options);
    tokio::pin!(viewer);

    loop {
        tokio::select! {
            outcome = &mut viewer => return outcome,
            line = lines.recv(), if tx.is_some() => match line {
                Some(line) => match parse_input(&line) {
                    Some(inputs) => {
                        if let Some(sender) = &tx {
                            for input in inputs {
                                // The viewer may already be closing.
                                let _ = sender.send(input);
                            }
                        }
                    }
                    None if line.trim().is_empty() => {}
                    None => eprintln!("[WARN] unknown viewer input: {}", line.trim()),
                },
                None => tx = None,
            },
        }
    }
}
