//! User controls
//!
//! Every method here counts as a user interaction for the autoplay gate.
//! None of them return errors: failures surface as `false`, `None` or the
//! `hasError` flag on the snapshot.

use super::core::PlaybackEngine;
use crate::backend::{BackendError, SourceToken, StartCause};
use lectern_common::events::{LecternEvent, PlaybackStatus};
use lectern_common::time::clamp_position;
use lectern_common::Item;
use tracing::{debug, info};

pub const MIN_PLAYBACK_RATE: f64 = 0.5;
pub const MAX_PLAYBACK_RATE: f64 = 2.0;

/// What a start attempt captured before awaiting the backend
struct StartPlan {
    item: Item,
    token: SourceToken,
    epoch: u64,
    restart: bool,
}

enum StartPrep {
    /// No item, setup failed, or superseded before the backend was asked
    Skip,
    AlreadyPlaying,
    Begin(StartPlan),
}

impl PlaybackEngine {
    /// Start playback
    ///
    /// Resolves `true` once playback is confirmed, `false` when the platform
    /// blocked it, a racing `load`/`pause` superseded it, or the source
    /// failed. Calling it while already playing returns `true` and changes
    /// nothing; calling it in `Ended` restarts from 0; calling it in `Error`
    /// re-attaches the source.
    pub async fn play(&self) -> bool {
        self.gate.record_user_interaction();
        self.start_playback(StartCause::UserGesture).await
    }

    /// Pause playback (no-op unless playing or a start is in flight)
    pub async fn pause(&self) {
        self.gate.record_user_interaction();
        {
            let mut inner = self.inner.lock().await;
            if inner.status != PlaybackStatus::Playing && inner.pending_starts == 0 {
                debug!("pause() ignored in {} state", inner.status);
                return;
            }
            inner.epoch += 1;
            if inner.status == PlaybackStatus::Playing {
                self.set_status(&mut inner, PlaybackStatus::Paused);
                self.publish(&inner);
            }
        }
        self.backend.pause().await;
    }

    /// Pause when playing, play otherwise; returns whether playback is on
    pub async fn toggle_play(&self) -> bool {
        let active = {
            let inner = self.inner.lock().await;
            inner.status == PlaybackStatus::Playing || inner.pending_starts > 0
        };
        if active {
            self.pause().await;
            false
        } else {
            self.play().await
        }
    }

    /// Seek to `position`, clamped to `[0, duration]`
    ///
    /// Only legal in `Ready`, `Playing` and `Paused`; returns the applied
    /// position, or `None` when the seek was ignored.
    pub async fn seek(&self, position: f64) -> Option<f64> {
        self.seek_with(|_| position).await
    }

    /// Skip forward by `seconds` (default from config, 30 s)
    pub async fn skip_forward(&self, seconds: Option<f64>) -> Option<f64> {
        let delta = seconds.unwrap_or(self.settings.skip_forward_secs);
        self.seek_with(|current| current + delta).await
    }

    /// Skip backward by `seconds` (default from config, 15 s)
    pub async fn skip_backward(&self, seconds: Option<f64>) -> Option<f64> {
        let delta = seconds.unwrap_or(self.settings.skip_backward_secs);
        self.seek_with(|current| current - delta).await
    }

    /// Set the playback rate, clamped to `[0.5, 2.0]`; returns the applied rate
    pub async fn change_playback_rate(&self, rate: f64) -> f64 {
        self.gate.record_user_interaction();
        let applied = {
            let mut inner = self.inner.lock().await;
            if !rate.is_finite() {
                return inner.playback_rate;
            }
            inner.playback_rate = rate.clamp(MIN_PLAYBACK_RATE, MAX_PLAYBACK_RATE);
            self.publish(&inner);
            inner.playback_rate
        };

        self.backend.set_playback_rate(applied).await;
        self.events.emit_lossy(LecternEvent::PlaybackRateChanged {
            playback_rate: applied,
            timestamp: chrono::Utc::now(),
        });
        applied
    }

    /// Set the volume, clamped to `[0, 1]`; returns the applied volume
    pub async fn change_volume(&self, volume: f64) -> f64 {
        self.gate.record_user_interaction();
        let (applied, muted) = {
            let mut inner = self.inner.lock().await;
            if !volume.is_finite() {
                return inner.volume;
            }
            inner.volume = volume.clamp(0.0, 1.0);
            self.publish(&inner);
            (inner.volume, inner.muted)
        };

        self.backend.set_volume(applied).await;
        self.events.emit_lossy(LecternEvent::VolumeChanged {
            volume: applied,
            is_muted: muted,
            timestamp: chrono::Utc::now(),
        });
        applied
    }

    /// Flip mute; returns the new mute state
    pub async fn toggle_mute(&self) -> bool {
        self.gate.record_user_interaction();
        let (volume, muted) = {
            let mut inner = self.inner.lock().await;
            inner.muted = !inner.muted;
            self.publish(&inner);
            (inner.volume, inner.muted)
        };

        self.backend.set_muted(muted).await;
        self.events.emit_lossy(LecternEvent::VolumeChanged {
            volume,
            is_muted: muted,
            timestamp: chrono::Utc::now(),
        });
        muted
    }

    /// Seek to a target computed from the current position under the state lock
    async fn seek_with(&self, target: impl FnOnce(f64) -> f64) -> Option<f64> {
        self.gate.record_user_interaction();
        let (position, item_id, attached) = {
            let mut inner = self.inner.lock().await;
            if !inner.status.is_seekable() {
                debug!("Seek ignored in {} state", inner.status);
                return None;
            }
            let requested = target(inner.current_time);
            if !requested.is_finite() {
                debug!("Seek to non-finite position ignored");
                return None;
            }
            inner.current_time = clamp_position(requested, inner.duration);
            self.publish(&inner);
            (
                inner.current_time,
                inner.item_id()?,
                inner.resource_created && inner.source_attached,
            )
        };

        if attached {
            self.backend.set_current_time(position).await;
        }
        self.events.emit_lossy(LecternEvent::Seeked {
            item_id,
            position,
            timestamp: chrono::Utc::now(),
        });
        Some(position)
    }

    /// Shared start path for user and automatic starts
    pub(super) async fn start_playback(&self, cause: StartCause) -> bool {
        match self.prepare_start(cause).await {
            StartPrep::Skip => false,
            StartPrep::AlreadyPlaying => true,
            StartPrep::Begin(plan) => {
                let result = self.backend.start(cause).await;
                self.finish_start(plan, result).await
            }
        }
    }

    /// Lock phase before a start: resource creation, source attachment,
    /// restart/recovery bookkeeping
    ///
    /// The start counts as in flight from the first lock on, so a `pause()`
    /// during resource creation or source attachment supersedes it.
    async fn prepare_start(&self, cause: StartCause) -> StartPrep {
        let _serial = self.source_lock.lock().await;

        let (plan, create, attach, position) = {
            let mut inner = self.inner.lock().await;
            let item = match inner.item.clone() {
                Some(item) => item,
                None => {
                    debug!("play() ignored: no item loaded");
                    return StartPrep::Skip;
                }
            };

            if inner.status == PlaybackStatus::Playing {
                return StartPrep::AlreadyPlaying;
            }

            // The resource only ever comes from a user-gesture play()
            if cause == StartCause::Automatic && !inner.resource_created {
                debug!("Automatic start of {} suppressed: no playback resource yet", item.id);
                self.events.emit_lossy(LecternEvent::AutoplaySuppressed {
                    item_id: item.id,
                    timestamp: chrono::Utc::now(),
                });
                return StartPrep::Skip;
            }
            inner.pending_starts += 1;

            let restart = inner.status == PlaybackStatus::Ended;
            if restart {
                inner.current_time = 0.0;
                self.publish(&inner);
            }

            if inner.status == PlaybackStatus::Error {
                info!("Retrying item {} after error", item.id);
                inner.token = inner.token.next();
                inner.source_attached = false;
                inner.last_error = None;
                let next = if inner.resource_created {
                    PlaybackStatus::Loading
                } else {
                    PlaybackStatus::Ready
                };
                self.set_status(&mut inner, next);
                self.publish(&inner);
            }

            let plan = StartPlan {
                item,
                token: inner.token,
                epoch: inner.epoch,
                restart,
            };
            (plan, !inner.resource_created, !inner.source_attached, inner.current_time)
        };

        if create {
            if let Err(e) = self.backend.create_resource().await {
                self.abandon_start().await;
                self.fail(plan.token, e.to_string()).await;
                return StartPrep::Skip;
            }
            self.inner.lock().await.resource_created = true;
        }

        if attach {
            if let Err(e) = self
                .backend
                .set_source(plan.token, &plan.item.audio_url, plan.item.duration_seconds, position)
                .await
            {
                self.abandon_start().await;
                self.fail(plan.token, e.to_string()).await;
                return StartPrep::Skip;
            }
            self.mark_attached(plan.token).await;
        } else if plan.restart {
            self.backend.set_current_time(0.0).await;
        }

        let mut inner = self.inner.lock().await;
        if inner.epoch != plan.epoch {
            debug!("Start for {} superseded before it began", plan.item.id);
            inner.pending_starts = inner.pending_starts.saturating_sub(1);
            return StartPrep::Skip;
        }
        StartPrep::Begin(plan)
    }

    async fn abandon_start(&self) {
        let mut inner = self.inner.lock().await;
        inner.pending_starts = inner.pending_starts.saturating_sub(1);
    }

    /// Apply the backend's answer, discarding it if a load/pause raced it
    async fn finish_start(&self, plan: StartPlan, result: Result<(), BackendError>) -> bool {
        let mut inner = self.inner.lock().await;
        inner.pending_starts = inner.pending_starts.saturating_sub(1);
        let current = inner.epoch == plan.epoch
            && inner.item.as_ref().is_some_and(|item| item.id == plan.item.id);

        match result {
            Ok(()) if current => {
                if plan.restart {
                    inner.current_time = 0.0;
                }
                self.set_status(&mut inner, PlaybackStatus::Playing);
                self.publish(&inner);
                true
            }
            Ok(()) => {
                debug!("Discarding stale start for item {}", plan.item.id);
                let stop = inner.status != PlaybackStatus::Playing;
                drop(inner);
                if stop {
                    self.backend.pause().await;
                }
                false
            }
            Err(BackendError::AutoplayBlocked) => {
                info!("Playback of {} blocked by platform autoplay policy", plan.item.id);
                drop(inner);
                self.events.emit_lossy(LecternEvent::AutoplayBlocked {
                    item_id: Some(plan.item.id),
                    timestamp: chrono::Utc::now(),
                });
                false
            }
            Err(BackendError::Aborted) => {
                debug!("Start for {} aborted by a newer request", plan.item.id);
                false
            }
            Err(e) => {
                drop(inner);
                if current {
                    self.fail(plan.token, e.to_string()).await;
                }
                false
            }
        }
    }
}
