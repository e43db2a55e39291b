//! # Lectern Common Library
//!
//! Shared code for the Lectern player and its tooling:
//! - Course data model (items, progress records, read-along segments)
//! - Playback status and snapshot types
//! - Event types (LecternEvent enum) and the EventBus
//! - Bootstrap configuration loading
//! - Time helpers

pub mod config;
pub mod error;
pub mod events;
pub mod models;
pub mod time;

pub use error::{Error, Result};
pub use models::{Item, ProgressRecord, ReadAlongData, ReadAlongSegment, SegmentType};
pub use events::{EventBus, LecternEvent, PlaybackSnapshot, PlaybackStatus, TextSize};
