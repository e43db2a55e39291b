//! Playback subsystem
//!
//! The engine owns the one playback resource and the observable snapshot.
//! Progress persistence and preloading observe the engine through the
//! event bus and never drive it.

pub mod autoplay;
pub mod engine;
pub mod preloader;
pub mod progress;

pub use autoplay::AutoplayGate;
pub use engine::{EngineSettings, LoadOptions, PlaybackEngine};
pub use preloader::Preloader;
pub use progress::ProgressTracker;
