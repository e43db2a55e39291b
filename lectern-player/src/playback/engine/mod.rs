//! Playback engine
//!
//! **Module Structure:**
//! - `core.rs`: construction, shared state, snapshot publication, `load`
//! - `transport.rs`: user controls (play, pause, seek, skip, rate, volume, mute)
//! - `resource_events.rs`: backend event intake and the event loop

mod core;
mod resource_events;
mod transport;

pub use self::core::{EngineSettings, LoadOptions, PlaybackEngine};
