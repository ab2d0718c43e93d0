// glimpse-cli: CLI frontend for glimpse
// Argument parsing, image acquisition, terminal viewer

mod cli;
mod render;
mod repl;
mod upload;
mod viewer;

use clap::Parser;
use cli::{Cli, Command};
use glimpse_core::playback::session::ViewerOptions;
use glimpse_core::{Clock, FeedController, GlimpseHome, SystemClock};
use render::{TerminalSink, format_feed, print_notices};
use std::io::{self, ErrorKind};
use std::sync::Arc;

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp(None)
        .init();
}

#[tokio::main]
async fn main() -> io::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let home = GlimpseHome::load(cli.home)?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let repo = Arc::new(home.repository(clock.clone()));
    let mut feed = FeedController::new(repo, clock, &home.config);
    feed.init();

    let viewer_options = ViewerOptions {
        frame_interval: home.config.frame_interval(),
    };

    match cli.command {
        Command::List { json } => {
            if json {
                let json = serde_json::to_string_pretty(feed.stories())
                    .map_err(|e| io::Error::new(ErrorKind::InvalidData, e))?;
                println!("{}", json);
            } else {
                println!("{}", format_feed(feed.stories(), feed.now_millis()));
            }
        }
        Command::Add { path } => {
            let upload = upload::story_from_file(&path, &home.config.image, feed.now_millis());
            if let Some(story) = feed.accept_upload(upload) {
                println!("Added story {}", story.id);
            }
            // Rejected uploads are reported, not fatal.
            print_notices(&feed.drain_notices());
        }
        Command::View { index } => {
            let engine = feed
                .select_story(index)
                .map_err(|e| io::Error::new(ErrorKind::InvalidInput, e))?;
            let mut lines = viewer::stdin_lines();
            let mut sink = TerminalSink::new(io::stdout());
            viewer::run_with_lines(
                engine,
                feed.repository(),
                &mut lines,
                &mut sink,
                viewer_options,
            )
            .await?;
            feed.close_viewer();
        }
        Command::Sweep => {
            let removed = feed.sweep();
            println!("Removed {} expired stories", removed);
        }
        Command::Feed => {
            let mut lines = viewer::stdin_lines();
            repl::run_feed(
                &mut feed,
                &mut lines,
                &home.config.image,
                viewer_options,
                &mut io::stdout(),
            )
            .await?;
        }
    }

    feed.teardown();
    Ok(())
}
