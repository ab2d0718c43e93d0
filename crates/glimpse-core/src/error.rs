//! Error type for the story library.
//!
//! Most failures in glimpse degrade to a safe default at the call site (an
//! empty feed, unchanged state, playback without persistence). `StoryError`
//! is what the lower layers report before that absorption happens.

use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoryError {
    /// The underlying key-value store could not be read or written.
    #[error("storage error: {0}")]
    Storage(#[from] io::Error),

    /// The story collection could not be encoded.
    #[error("failed to serialize stories: {0}")]
    Serialize(#[from] serde_json::Error),

    /// An index outside the current feed was requested.
    #[error("story index {index} out of range (feed has {len} stories)")]
    IndexOutOfRange { index: usize, len: usize },

    /// A story with this id is already part of the feed.
    #[error("story id '{0}' already exists in the feed")]
    DuplicateId(String),

    #[error("no stories to play")]
    EmptyFeed,
}

pub type Result<T> = std::result::Result<T, StoryError>;
