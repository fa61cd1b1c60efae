//! Reward granting service
//!
//! The single entry point UI events call into: poll votes, video
//! completions, bonus chest taps, and recovery requests. Every grant goes
//! through the claim-gated transactional path in the persistence layer.

use chrono::Utc;
use rally_core::{
    ActivityClaim, ActivityKind, GrantOutcome, RecoveryResult, Result, RewardRuleset, UserProgress,
};
use rally_persistence::{sqlite, Database};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::info;

use crate::recovery;
use crate::watch::{spawn_watch_sampler, WatchCompleted, WatchHandle, WatchSamplerConfig};

/// Facade over the reward paths for one configured economy
pub struct RewardService {
    db: Arc<Database>,
    rules: RewardRuleset,
}

impl RewardService {
    pub fn new(db: Arc<Database>, rules: RewardRuleset) -> Self {
        Self { db, rules }
    }

    pub fn rules(&self) -> &RewardRuleset {
        &self.rules
    }

    /// Current progress record (created zero-valued on first use)
    pub async fn progress(&self, user_id: &str) -> Result<UserProgress> {
        sqlite::get_or_create_progress(self.db.pool(), user_id).await
    }

    /// Whether a reward for this content item was already granted
    pub async fn has_claimed(
        &self,
        user_id: &str,
        kind: ActivityKind,
        content_id: &str,
    ) -> Result<bool> {
        sqlite::has_claim(self.db.pool(), user_id, &kind.activity_id(content_id)).await
    }

    /// Everything the user has been rewarded for since the last monthly
    /// purge, newest first (profile history view)
    pub async fn claim_history(&self, user_id: &str) -> Result<Vec<ActivityClaim>> {
        sqlite::list_claims(self.db.pool(), user_id).await
    }

    /// Reward a poll vote, once per poll
    pub async fn grant_poll_vote(&self, user_id: &str, poll_id: &str) -> Result<GrantOutcome> {
        let outcome = sqlite::grant_with_claim(
            self.db.pool(),
            user_id,
            &ActivityKind::Poll.activity_id(poll_id),
            self.rules.polls.xp,
            self.rules.polls.coins,
            &self.rules,
        )
        .await?;

        if let GrantOutcome::Granted(r) = &outcome {
            info!(user_id, poll_id, xp = r.xp_applied, coins = r.coins_applied, "poll vote rewarded");
        }
        Ok(outcome)
    }

    /// Reward a completed video watch, once per video.
    /// Normally invoked by the watch sampler; exposed for callers that do
    /// their own completion detection.
    pub async fn grant_video_watched(&self, user_id: &str, video_id: &str) -> Result<GrantOutcome> {
        let outcome = sqlite::grant_with_claim(
            self.db.pool(),
            user_id,
            &ActivityKind::Video.activity_id(video_id),
            self.rules.videos.xp,
            self.rules.videos.coins,
            &self.rules,
        )
        .await?;

        if let GrantOutcome::Granted(r) = &outcome {
            info!(user_id, video_id, xp = r.xp_applied, coins = r.coins_applied, "video watch rewarded");
        }
        Ok(outcome)
    }

    /// Open today's bonus chest (requires the daily XP threshold)
    pub async fn claim_bonus_chest(&self, user_id: &str) -> Result<GrantOutcome> {
        let outcome = sqlite::claim_bonus(self.db.pool(), user_id, &self.rules).await?;

        if let GrantOutcome::Granted(r) = &outcome {
            info!(user_id, xp = r.xp_applied, coins = r.coins_applied, "bonus chest opened");
        }
        Ok(outcome)
    }

    /// Restore the user's streak (free VIP entitlement or paid)
    pub async fn recover_streak(&self, user_id: &str) -> Result<RecoveryResult> {
        recovery::recover(&self.db, &self.rules, user_id, Utc::now()).await
    }

    /// Start the 1 Hz watch sampler for a video session
    pub fn start_watch_session(
        &self,
        user_id: &str,
        video_id: &str,
        duration_secs: f64,
        position_rx: watch::Receiver<f64>,
        completed_tx: mpsc::Sender<WatchCompleted>,
    ) -> WatchHandle {
        spawn_watch_sampler(
            WatchSamplerConfig {
                db: self.db.clone(),
                rules: self.rules.clone(),
                user_id: user_id.to_string(),
                video_id: video_id.to_string(),
                duration_secs,
            },
            position_rx,
            completed_tx,
        )
    }
}
