//! Background sampler task for an active video session
//!
//! One cooperative task per session: a 1 Hz interval reads the playback
//! position, feeds the state machine, and grants the reward exactly once
//! when the watch threshold is crossed. Pausing (app backgrounded) stops
//! sampling; resuming re-baselines so background playback never counts.

use super::{SampleOutcome, WatchSession};
use rally_core::{ActivityKind, Error, GrantOutcome, RewardRuleset};
use rally_persistence::{sqlite, Database};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// How often the playback position is sampled (1 Hz)
const SAMPLE_INTERVAL_SECS: u64 = 1;

/// Emitted once when a session crosses the watch threshold
#[derive(Debug)]
pub struct WatchCompleted {
    pub user_id: String,
    pub video_id: String,
    /// `Ok(AlreadyGranted)` when the video was completed in an earlier
    /// session. `Err` when the grant failed: no claim was recorded, and a
    /// failure that `Error::is_retryable` reports can be retried.
    pub outcome: Result<GrantOutcome, Error>,
    pub watched_percent: f64,
}

/// Everything the sampler needs to run one session
pub struct WatchSamplerConfig {
    pub db: Arc<Database>,
    pub rules: RewardRuleset,
    pub user_id: String,
    pub video_id: String,
    pub duration_secs: f64,
}

/// Handle to control a running sampler
#[derive(Clone)]
pub struct WatchHandle {
    cancel: CancellationToken,
    paused_tx: Arc<watch::Sender<bool>>,
}

impl WatchHandle {
    pub fn is_paused(&self) -> bool {
        *self.paused_tx.borrow()
    }

    /// Stop sampling (app went to background)
    pub fn pause(&self) {
        let _ = self.paused_tx.send(true);
    }

    /// Resume sampling; the next tick re-baselines at the live position
    pub fn resume(&self) {
        let _ = self.paused_tx.send(false);
    }

    /// Tear the session down (player closed)
    pub fn stop(&self) {
        self.cancel.cancel();
    }
}

/// Spawn the sampler for one video session.
/// `position_rx` carries the live playback position in seconds.
pub fn spawn_watch_sampler(
    config: WatchSamplerConfig,
    position_rx: watch::Receiver<f64>,
    completed_tx: mpsc::Sender<WatchCompleted>,
) -> WatchHandle {
    let cancel = CancellationToken::new();
    let (paused_tx, paused_rx) = watch::channel(false);

    let handle = WatchHandle {
        cancel: cancel.clone(),
        paused_tx: Arc::new(paused_tx),
    };

    tokio::spawn(sampler_loop(config, position_rx, paused_rx, cancel, completed_tx));

    handle
}

async fn sampler_loop(
    config: WatchSamplerConfig,
    position_rx: watch::Receiver<f64>,
    paused_rx: watch::Receiver<bool>,
    cancel: CancellationToken,
    completed_tx: mpsc::Sender<WatchCompleted>,
) {
    let WatchSamplerConfig {
        db,
        rules,
        user_id,
        video_id,
        duration_secs,
    } = config;

    let mut session = WatchSession::new(duration_secs, rules.videos.watch_percentage);
    session.start(*position_rx.borrow());

    let mut interval = tokio::time::interval(Duration::from_secs(SAMPLE_INTERVAL_SECS));
    let mut was_paused = false;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!(user_id, video_id, "watch sampler cancelled");
                return;
            }
            _ = interval.tick() => {
                let position = *position_rx.borrow();

                if *paused_rx.borrow() {
                    if !was_paused {
                        session.pause();
                        was_paused = true;
                        debug!(user_id, video_id, "watch sampler paused");
                    }
                    continue;
                }
                if was_paused {
                    // First tick after foregrounding only re-baselines
                    session.resume(position);
                    was_paused = false;
                    debug!(user_id, video_id, position, "watch sampler resumed");
                    continue;
                }

                if session.record_sample(position) == SampleOutcome::Completed {
                    info!(
                        user_id,
                        video_id,
                        percent = session.watched_percent(),
                        "video watch threshold reached"
                    );

                    let activity_id = ActivityKind::Video.activity_id(&video_id);
                    let outcome = sqlite::grant_with_claim(
                        db.pool(),
                        &user_id,
                        &activity_id,
                        rules.videos.xp,
                        rules.videos.coins,
                        &rules,
                    )
                    .await;
                    if let Err(e) = &outcome {
                        warn!(user_id, video_id, "video reward grant failed: {}", e);
                    }

                    let event = WatchCompleted {
                        user_id: user_id.clone(),
                        video_id: video_id.clone(),
                        outcome,
                        watched_percent: session.watched_percent(),
                    };
                    if completed_tx.send(event).await.is_err() {
                        warn!(user_id, video_id, "watch completion receiver dropped");
                    }

                    // Completed sessions ignore every further sample, so the
                    // task has nothing left to do.
                    return;
                }
            }
        }
    }
}
