//! Autoplay policy gate
//!
//! Two states: closed until the first user-caused control invocation, open
//! for the rest of the session. While closed, automatic playback (e.g. on
//! item selection) is suppressed instead of attempted.

use std::sync::atomic::{AtomicBool, Ordering};
use tracing::info;

#[derive(Debug, Default)]
pub struct AutoplayGate {
    has_user_interacted: AtomicBool,
}

impl AutoplayGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a user-caused control invocation
    ///
    /// Returns `true` only for the call that opened the gate.
    pub fn record_user_interaction(&self) -> bool {
        let opened = self
            .has_user_interacted
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if opened {
            info!("First user interaction recorded, automatic playback enabled");
        }
        opened
    }

    pub fn has_user_interacted(&self) -> bool {
        self.has_user_interacted.load(Ordering::Acquire)
    }

    /// Whether an automatic start may be attempted at all
    pub fn allows_automatic_start(&self) -> bool {
        self.has_user_interacted()
    }
}
