//! Session bootstrap
//!
//! Runs opportunistically on every load: settle yesterday's streak, clear
//! the daily counters, and purge stale claim history. The streak decision
//! reads the daily XP that the very same write then zeroes, so the streak
//! can never see a transiently reset value.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use rally_core::{Result, RewardRuleset, UserProgress};
use rally_persistence::{sqlite, Database};
use tracing::{debug, info, warn};

use crate::streak::{self, StreakDecision};

/// Claim history is purged once the marker is older than this
const CLAIM_PURGE_AFTER_DAYS: i64 = 30;

/// Progress and configuration for a freshly opened session
pub struct SessionState {
    pub progress: UserProgress,
    pub rules: RewardRuleset,
}

/// Open a session for a user: load configuration, roll the day over if the
/// calendar moved, and run the monthly claim purge when due.
///
/// `today` is the client's local calendar day; `now` a wall-clock instant.
pub async fn open_session(
    db: &Database,
    user_id: &str,
    today: NaiveDate,
    now: DateTime<Utc>,
) -> Result<SessionState> {
    // Streak settlement is gated on configuration: the ruleset loads first,
    // and a missing document falls back to defaults, which still counts as
    // loaded.
    let rules = match sqlite::load_ruleset(db.pool()).await? {
        Some(r) => r,
        None => {
            warn!("no reward ruleset configured, using defaults");
            RewardRuleset::default()
        }
    };

    let progress = sqlite::get_or_create_progress(db.pool(), user_id).await?;

    match streak::next_streak(
        progress.daily_xp,
        progress.streak_today,
        progress.last_active_day,
        today,
        rules.streak.threshold,
    ) {
        // Same calendar day: no write at all
        StreakDecision::Skip => {}
        StreakDecision::Update { streak } => {
            let won = sqlite::apply_day_rollover(
                db.pool(),
                user_id,
                progress.last_active_day,
                today,
                streak,
            )
            .await?;
            if won {
                info!(user_id, streak, "day rolled over");
            } else {
                debug!(user_id, "day rollover already applied by a concurrent load");
            }
        }
    }

    match progress.last_reset_at {
        None => sqlite::stamp_monthly_marker(db.pool(), user_id, now).await?,
        Some(last) if now - last > Duration::days(CLAIM_PURGE_AFTER_DAYS) => {
            let purged = sqlite::apply_monthly_reset(db.pool(), user_id, now).await?;
            info!(user_id, purged, "monthly claim purge");
        }
        Some(_) => {}
    }

    let progress = sqlite::get_or_create_progress(db.pool(), user_id).await?;
    Ok(SessionState { progress, rules })
}
