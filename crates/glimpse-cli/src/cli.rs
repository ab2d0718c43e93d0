//! Command-line arguments.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

const CLI_AFTER_HELP: &str = "\
VIEWER INPUT (one per line on stdin):
  h, left, prev        previous story
  l, right, next       next story
  q, esc               close the viewer
  swipe <DX> <DY>      touch gesture with this displacement
  hold / release       touch down / touch up
  Closing stdin lets the viewer play to the end of the feed.

ENVIRONMENT:
  GLIMPSE_HOME         home directory (default ~/.glimpse)
  RUST_LOG             log filter, overrides -v";

#[derive(Parser, Debug)]
#[command(
    name = "glimpse",
    version,
    about = "Ephemeral image stories that expire after a day",
    after_help = CLI_AFTER_HELP
)]
pub struct Cli {
    /// Home directory (overrides GLIMPSE_HOME)
    #[arg(long = "home", value_name = "DIR", global = true)]
    pub home: Option<PathBuf>,

    /// Log state transitions and absorbed failures
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// List live stories, oldest first
    List {
        /// Print the stories as JSON
        #[arg(long)]
        json: bool,
    },
    /// Add an image as a new story
    Add {
        #[arg(value_name = "PATH")]
        path: PathBuf,
    },
    /// Open the viewer at a story
    View {
        #[arg(value_name = "INDEX")]
        index: usize,
    },
    /// Remove expired stories now
    Sweep,
    /// Interactive feed session
    Feed,
}
