//! HTTP control surface
//!
//! JSON endpoints driving the engine and the read-along overlay, plus an
//! SSE stream of every event for attached views.

pub mod handlers;
pub mod server;
pub mod sse;

pub use server::{create_router, run, AppContext};
