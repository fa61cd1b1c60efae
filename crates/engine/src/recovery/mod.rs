//! Streak recovery
//!
//! VIPs get a limited number of free restorations per rolling cooldown
//! window; everyone else (or a VIP who used them up) pays coins. Planning is
//! pure; the persistence layer applies the plan under guard conditions so a
//! racing double-tap cannot double-deduct.

use chrono::{DateTime, Duration, Utc};
use rally_core::{Error, RecoveryResult, Result, RewardRuleset, UserProgress, MAX_STREAK};
use rally_persistence::{sqlite, Database};
use tracing::info;

/// A planned recovery, ready to be applied transactionally
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryPlan {
    VipFree {
        /// Usage counter as observed (the apply guard re-checks it)
        observed_used: u32,
        new_used: u32,
        /// End of the fresh cooldown window stamped by this use
        new_reset_at: DateTime<Utc>,
        free_uses_remaining: u32,
    },
    Paid {
        cost: i64,
    },
}

/// Free uses still available in the current window (0 for non-VIPs)
fn free_uses_available(progress: &UserProgress, rules: &RewardRuleset, now: DateTime<Utc>) -> u32 {
    if !progress.vip {
        return 0;
    }
    let window_elapsed = progress.vip_recovery_reset_at.map_or(true, |t| now >= t);
    let used = if window_elapsed {
        0
    } else {
        progress.vip_recovery_used
    };
    rules.recovery.vip_max_free_uses.saturating_sub(used)
}

/// Decide how (and whether) this user can recover their streak right now
pub fn plan_recovery(
    progress: &UserProgress,
    rules: &RewardRuleset,
    now: DateTime<Utc>,
) -> Result<RecoveryPlan> {
    if progress.streak_today >= MAX_STREAK {
        return Err(Error::NotEligible(
            "streak is already at its maximum".to_string(),
        ));
    }

    if progress.vip {
        let window_elapsed = progress.vip_recovery_reset_at.map_or(true, |t| now >= t);
        let used = if window_elapsed {
            // Elapsed window: the counter restarts with this use
            0
        } else {
            progress.vip_recovery_used
        };

        if used < rules.recovery.vip_max_free_uses {
            let new_used = used + 1;
            return Ok(RecoveryPlan::VipFree {
                observed_used: progress.vip_recovery_used,
                new_used,
                new_reset_at: now + Duration::days(rules.recovery.vip_cooldown_days),
                free_uses_remaining: rules.recovery.vip_max_free_uses - new_used,
            });
        }
    }

    let cost = rules.recovery.coin_cost;
    if progress.coins >= cost {
        return Ok(RecoveryPlan::Paid { cost });
    }

    if progress.vip {
        // Free entitlement exhausted for this window and cannot pay
        Err(Error::NotEligible(
            "free recoveries used up for this period".to_string(),
        ))
    } else {
        Err(Error::InsufficientFunds {
            required: cost,
            available: progress.coins,
        })
    }
}

/// Restore a user's streak, free (VIP) or paid
pub async fn recover(
    db: &Database,
    rules: &RewardRuleset,
    user_id: &str,
    now: DateTime<Utc>,
) -> Result<RecoveryResult> {
    let progress = sqlite::get_or_create_progress(db.pool(), user_id).await?;

    let result = match plan_recovery(&progress, rules, now)? {
        RecoveryPlan::VipFree {
            observed_used,
            new_used,
            new_reset_at,
            free_uses_remaining,
        } => sqlite::apply_free_recovery(
            db.pool(),
            user_id,
            observed_used,
            new_used,
            new_reset_at,
            free_uses_remaining,
            now,
        )
        .await?
        .ok_or_else(|| {
            // Another recovery landed between plan and apply
            Error::NotEligible("recovery already in progress".to_string())
        })?,
        RecoveryPlan::Paid { cost } => sqlite::apply_paid_recovery(
            db.pool(),
            user_id,
            cost,
            free_uses_available(&progress, rules, now),
            now,
        )
        .await?
        .ok_or_else(|| {
            // Another recovery or spend landed between plan and apply
            Error::NotEligible("recovery already in progress".to_string())
        })?,
    };

    info!(
        user_id,
        mode = ?result.mode,
        coins = result.coins,
        "streak recovered"
    );
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rally_core::RecoveryMode;

    fn vip_progress(coins: i64, used: u32, reset_at: Option<DateTime<Utc>>) -> UserProgress {
        let mut p = UserProgress::new("u1");
        p.vip = true;
        p.coins = coins;
        p.vip_recovery_used = used;
        p.vip_recovery_reset_at = reset_at;
        p.streak_today = 2;
        p
    }

    #[test]
    fn test_vip_first_use_is_free() {
        let rules = RewardRuleset::default();
        let now = Utc::now();
        let plan = plan_recovery(&vip_progress(0, 0, None), &rules, now).unwrap();
        assert!(matches!(
            plan,
            RecoveryPlan::VipFree {
                new_used: 1,
                free_uses_remaining: 1,
                ..
            }
        ));
    }

    #[test]
    fn test_vip_third_use_in_window_falls_to_paid() {
        let rules = RewardRuleset::default();
        let now = Utc::now();
        let in_window = Some(now + Duration::days(3));

        let funded = plan_recovery(&vip_progress(6000, 2, in_window), &rules, now).unwrap();
        assert_eq!(funded, RecoveryPlan::Paid { cost: 5000 });

        let broke = plan_recovery(&vip_progress(100, 2, in_window), &rules, now).unwrap_err();
        assert!(matches!(broke, Error::NotEligible(_)));
    }

    #[test]
    fn test_vip_window_elapse_resets_counter() {
        let rules = RewardRuleset::default();
        let now = Utc::now();
        let elapsed = Some(now - Duration::hours(1));

        let plan = plan_recovery(&vip_progress(0, 2, elapsed), &rules, now).unwrap();
        assert!(matches!(
            plan,
            RecoveryPlan::VipFree {
                observed_used: 2,
                new_used: 1,
                ..
            }
        ));
    }

    #[test]
    fn test_non_vip_pays_or_fails() {
        let rules = RewardRuleset::default();
        let now = Utc::now();
        let mut p = UserProgress::new("u1");
        p.streak_today = 2;

        p.coins = 5000;
        assert_eq!(
            plan_recovery(&p, &rules, now).unwrap(),
            RecoveryPlan::Paid { cost: 5000 }
        );

        p.coins = 4999;
        let err = plan_recovery(&p, &rules, now).unwrap_err();
        assert!(matches!(
            err,
            Error::InsufficientFunds {
                required: 5000,
                available: 4999
            }
        ));
    }

    #[test]
    fn test_full_streak_not_eligible() {
        let rules = RewardRuleset::default();
        let mut p = vip_progress(10_000, 0, None);
        p.streak_today = MAX_STREAK;
        let err = plan_recovery(&p, &rules, Utc::now()).unwrap_err();
        assert!(matches!(err, Error::NotEligible(_)));
    }

    #[tokio::test]
    async fn test_recover_vip_then_paid() {
        let db = Database::connect_in_memory().await.unwrap();
        let rules = RewardRuleset::default();
        let now = Utc::now();

        sqlite::get_or_create_progress(db.pool(), "u1").await.unwrap();
        sqlite::set_vip(db.pool(), "u1", true).await.unwrap();
        sqlite::grant_with_claim(db.pool(), "u1", "poll:seed", 0, 12_000, &rules)
            .await
            .unwrap();

        let first = recover(&db, &rules, "u1", now).await.unwrap();
        assert_eq!(first.mode, RecoveryMode::VipFree);
        assert_eq!(first.free_uses_remaining, 1);

        // Recovery is pointless while the streak sits at 7; drop it again
        sqlite::set_streak(db.pool(), "u1", 1).await.unwrap();
        let second = recover(&db, &rules, "u1", now).await.unwrap();
        assert_eq!(second.mode, RecoveryMode::VipFree);
        assert_eq!(second.free_uses_remaining, 0);

        sqlite::set_streak(db.pool(), "u1", 1).await.unwrap();
        let third = recover(&db, &rules, "u1", now).await.unwrap();
        assert_eq!(third.mode, RecoveryMode::Paid);
        assert_eq!(third.coins, 7000);

        let progress = sqlite::get_progress(db.pool(), "u1").await.unwrap().unwrap();
        assert_eq!(progress.streak_today, MAX_STREAK);
        assert_eq!(progress.last_highest_streak, MAX_STREAK);
        assert!(progress.last_recovery_used.is_some());
    }
}
