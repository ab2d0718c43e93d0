//! Interactive feed session.
//!
//! Reads commands line by line while the feed's expiry sweep keeps running
//! between them. `open N` hands the same line reader to the viewer until it
//! closes; the sweep keeps running underneath the viewer, which plays from
//! its own snapshot of the feed.

use crate::render::{TerminalSink, format_feed, print_notices};
use crate::upload::story_from_file;
use crate::viewer::run_with_lines;
use glimpse_core::playback::PlaybackEngine;
use glimpse_core::playback::session::{FrameSink, ViewerOptions, ViewerOutcome};
use glimpse_core::{FeedController, ImageConfig};
use log::{debug, info};
use std::io::{self, Write};
use std::path::PathBuf;
use tokio::sync::mpsc;

const HELP: &str = "commands: list | open <N> | add <PATH> | help | quit";

#[derive(Debug, PartialEq, Eq)]
pub enum FeedCommand {
    List,
    Open(usize),
    Add(PathBuf),
    Help,
    Quit,
}

/// Parse one REPL line. Blank lines are `None`; anything unrecognised is an
/// error message for the user.
pub fn parse_command(line: &str) -> Result<Option<FeedCommand>, String> {
    let line = line.trim();
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };
    let command = match word {
        "" => return Ok(None),
        "list" | "ls" => FeedCommand::List,
        "help" | "?" => FeedCommand::Help,
        "quit" | "exit" | "q" => FeedCommand::Quit,
        "open" | "view" => {
            let index = rest
                .parse()
                .map_err(|_| format!("open needs a story index, got '{}'", rest))?;
            FeedCommand::Open(index)
        }
        "add" => {
            if rest.is_empty() {
                return Err("add needs a file path".to_string());
            }
            FeedCommand::Add(PathBuf::from(rest))
        }
        other => return Err(format!("unknown command '{}'. {}", other, HELP)),
    };
    Ok(Some(command))
}

/// Run a viewer session while continuing to sweep expired stories from the
/// feed. Returns once the viewer closes; the caller refreshes the feed.
pub async fn view_while_sweeping<S: FrameSink>(
    feed: &mut FeedController,
    engine: PlaybackEngine,
    lines: &mut mpsc::UnboundedReceiver<String>,
    sink: &mut S,
    options: ViewerOptions,
) -> io::Result<ViewerOutcome> {
    let viewer = run_with_lines(engine, feed.repository(), lines, sink, options);
    tokio::pin!(viewer);

    loop {
        let sweep_in = feed.next_sweep_in();
        let sleep = tokio::time::sleep(sweep_in.unwrap_or_default());

        tokio::select! {
            outcome = &mut viewer => return outcome,
            _ = sleep, if sweep_in.is_some() => {
                if let Some(removed) = feed.poll_sweep().filter(|n| *n > 0) {
                    info!("{} expired stories removed while viewing", removed);
                }
            }
        }
    }
}

/// Run the feed session until `quit` or end of input.
pub async fn run_feed<W: Write>(
    feed: &mut FeedController,
    lines: &mut mpsc::UnboundedReceiver<String>,
    image: &ImageConfig,
    viewer: ViewerOptions,
    out: &mut W,
) -> io::Result<()> {
    writeln!(out, "{}", format_feed(feed.stories(), feed.now_millis()))?;

    loop {
        let sweep_in = feed.next_sweep_in();
        let sleep = tokio::time::sleep(sweep_in.unwrap_or_default());

        let line = tokio::select! {
            _ = sleep, if sweep_in.is_some() => {
                if let Some(removed) = feed.poll_sweep().filter(|n| *n > 0) {
                    writeln!(out, "[{} expired stories removed]", removed)?;
                }
                continue;
            }
            line = lines.recv() => line,
        };
        let Some(line) = line else {
            debug!("feed input closed");
            break;
        };

        let command = match parse_command(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(message) => {
                eprintln!("{}", message);
                continue;
            }
        };

        match command {
            FeedCommand::List => {
                writeln!(out, "{}", format_feed(feed.stories(), feed.now_millis()))?;
            }
            FeedCommand::Help => writeln!(out, "{}", HELP)?,
            FeedCommand::Quit => break,
            FeedCommand::Add(path) => {
                let upload = story_from_file(&path, image, feed.now_millis());
                if let Some(story) = feed.accept_upload(upload) {
                    writeln!(out, "Added story {}", story.id)?;
                }
                print_notices(&feed.drain_notices());
            }
            FeedCommand::Open(index) => {
                let engine = match feed.select_story(index) {
                    Ok(engine) => engine,
                    Err(e) => {
                        eprintln!("{}", e);
                        continue;
                    }
                };
                let mut sink = TerminalSink::new(&mut *out);
                view_while_sweeping(feed, engine, lines, &mut sink, viewer).await?;
                feed.close_viewer();
            }
        }
    }

    feed.teardown();
    Ok(())
}
