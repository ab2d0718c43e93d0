//! glimpse-core: Ephemeral image stories
//!
//! Provides the persisted story list with 24-hour expiry, the feed that owns
//! it, and the playback engine behind the full-screen viewer.
//!
//! # Quick Start
//!
//! ```no_run
//! use glimpse_core::playback::session::{CollectingSink, ViewerOptions, input_channel, run_viewer};
//! use glimpse_core::{FeedController, GlimpseHome, SystemClock};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> std::io::Result<()> {
//!     let home = GlimpseHome::load(None)?;
//!     let clock = Arc::new(SystemClock);
//!     let repo = Arc::new(home.repository(clock.clone()));
//!     let mut feed = FeedController::new(repo, clock, &home.config);
//!     feed.init();
//!
//!     if let Ok(engine) = feed.select_story(0) {
//!         let (_tx, rx) = input_channel();
//!         let mut sink = CollectingSink::default();
//!         run_viewer(engine, feed.repository(), rx, &mut sink, ViewerOptions::default()).await?;
//!         feed.close_viewer();
//!     }
//!     Ok(())
//! }
//! ```
//!
//! For lower-level access, use the individual modules directly.

pub mod clock;
pub mod config;
pub mod error;
pub mod feed;
pub mod home;
pub mod playback;
pub mod repository;
pub mod store;
pub mod story;

// Re-export commonly used types
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{Config, ImageConfig};
pub use error::{Result, StoryError};
pub use feed::{FeedController, Notice};
pub use home::{GlimpseHome, HOME_ENV};
pub use playback::{
    CloseReason, PlaybackConfig, PlaybackEffect, PlaybackEngine, PlaybackInput, PlaybackState,
    ViewFrame,
};
pub use repository::{STORIES_KEY, StoreRepository, StoryRepository};
pub use store::{FileStore, KeyValueStore, MemoryStore};
pub use story::{NewStory, Story};
