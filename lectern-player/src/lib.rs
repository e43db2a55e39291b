//! # Lectern Player Library (lectern-player)
//!
//! Single-session audio playback with a synchronized read-along overlay.
//!
//! **Purpose:** Own one playback engine per session, track listening
//! progress, highlight the narrated sentence, warm upcoming items and
//! expose all of it over an HTTP/SSE control surface.

pub mod api;
pub mod backend;
pub mod config;
pub mod context;
pub mod error;
pub mod observer;
pub mod playback;
pub mod readalong;
pub mod services;

pub use config::PlayerConfig;
pub use context::{PlayerContext, SelectOptions, ViewHandle};
pub use error::{Error, Result};
