//! Transactional reward mutations
//!
//! Every mutation of `user_progress` runs as a single SQLite transaction (or
//! a single guarded UPDATE); there is no other concurrency control. Racing
//! writers are resolved by the claim row's primary key or by a guard clause
//! in the WHERE condition; the loser observes a no-op, never a partial
//! write.

use chrono::{DateTime, NaiveDate, Utc};
use rally_core::{
    Error, GrantOutcome, GrantResult, RecoveryMode, RecoveryResult, Result, RewardRuleset,
    MAX_STREAK,
};
use sqlx::SqlitePool;

/// Grant XP/coins for one activity, gated by the claim record.
///
/// Claim creation and the progress update commit together: there is no
/// window where a claim exists without its reward or vice versa. A repeated
/// call (or the loser of a race) gets `AlreadyGranted`.
pub async fn grant_with_claim(
    pool: &SqlitePool,
    user_id: &str,
    activity_id: &str,
    xp: i64,
    coins: i64,
    rules: &RewardRuleset,
) -> Result<GrantOutcome> {
    let mut tx = pool
        .begin()
        .await
        .map_err(|e| Error::DatabaseError(e.to_string()))?;

    // The primary key on (user_id, activity_id) is the idempotency guard:
    // exactly one of two racing inserts takes effect.
    let inserted = sqlx::query(
        r#"
        INSERT OR IGNORE INTO activity_claims (user_id, activity_id, granted_at)
        VALUES (?, ?, ?)
        "#,
    )
    .bind(user_id)
    .bind(activity_id)
    .bind(Utc::now())
    .execute(&mut *tx)
    .await
    .map_err(|e| Error::DatabaseError(e.to_string()))?;

    if inserted.rows_affected() == 0 {
        // Dropping the transaction rolls back; nothing was written.
        return Ok(GrantOutcome::AlreadyGranted);
    }

    sqlx::query("INSERT OR IGNORE INTO user_progress (user_id) VALUES (?)")
        .bind(user_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| Error::DatabaseError(e.to_string()))?;

    let (daily_xp, daily_coins, lifetime_xp, lifetime_coins): (i64, i64, i64, i64) =
        sqlx::query_as("SELECT daily_xp, daily_coins, xp, coins FROM user_progress WHERE user_id = ?")
            .bind(user_id)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| Error::DatabaseError(e.to_string()))?;

    let xp_applied = rules.clamp_xp(daily_xp, xp);
    let coins_applied = rules.clamp_coins(daily_coins, coins);

    sqlx::query(
        r#"
        UPDATE user_progress
        SET daily_xp = daily_xp + ?,
            daily_coins = daily_coins + ?,
            xp = xp + ?,
            coins = coins + ?
        WHERE user_id = ?
        "#,
    )
    .bind(xp_applied)
    .bind(coins_applied)
    .bind(xp_applied)
    .bind(coins_applied)
    .bind(user_id)
    .execute(&mut *tx)
    .await
    .map_err(|e| Error::DatabaseError(e.to_string()))?;

    tx.commit()
        .await
        .map_err(|e| Error::DatabaseError(e.to_string()))?;

    Ok(GrantOutcome::Granted(GrantResult {
        xp_applied,
        coins_applied,
        daily_xp: daily_xp + xp_applied,
        xp: lifetime_xp + xp_applied,
        coins: lifetime_coins + coins_applied,
    }))
}

/// Open the daily bonus chest.
///
/// Requires today's XP to have reached `rules.bonus.xp_required`; the
/// `bonus_claimed` flag (cleared by the daily reset) makes this once per
/// day. The guarded UPDATE turns a double-tap race into `AlreadyGranted`.
pub async fn claim_bonus(
    pool: &SqlitePool,
    user_id: &str,
    rules: &RewardRuleset,
) -> Result<GrantOutcome> {
    let mut tx = pool
        .begin()
        .await
        .map_err(|e| Error::DatabaseError(e.to_string()))?;

    let row: Option<(i64, i64, i64, i64, i64)> = sqlx::query_as(
        "SELECT daily_xp, daily_coins, xp, coins, bonus_claimed FROM user_progress WHERE user_id = ?",
    )
    .bind(user_id)
    .fetch_optional(&mut *tx)
    .await
    .map_err(|e| Error::DatabaseError(e.to_string()))?;

    let (daily_xp, daily_coins, lifetime_xp, lifetime_coins, bonus_claimed) = row.ok_or_else(|| {
        Error::NotEligible("no progress recorded today".to_string())
    })?;

    if bonus_claimed != 0 {
        return Ok(GrantOutcome::AlreadyGranted);
    }
    if daily_xp < rules.bonus.xp_required {
        return Err(Error::NotEligible(format!(
            "bonus chest unlocks at {} daily XP, currently {}",
            rules.bonus.xp_required, daily_xp
        )));
    }

    let xp_applied = rules.clamp_xp(daily_xp, rules.bonus.xp);
    let coins_applied = rules.clamp_coins(daily_coins, rules.bonus.coins);

    let updated = sqlx::query(
        r#"
        UPDATE user_progress
        SET bonus_claimed = 1,
            daily_xp = daily_xp + ?,
            daily_coins = daily_coins + ?,
            xp = xp + ?,
            coins = coins + ?
        WHERE user_id = ? AND bonus_claimed = 0
        "#,
    )
    .bind(xp_applied)
    .bind(coins_applied)
    .bind(xp_applied)
    .bind(coins_applied)
    .bind(user_id)
    .execute(&mut *tx)
    .await
    .map_err(|e| Error::DatabaseError(e.to_string()))?;

    if updated.rows_affected() == 0 {
        return Ok(GrantOutcome::AlreadyGranted);
    }

    tx.commit()
        .await
        .map_err(|e| Error::DatabaseError(e.to_string()))?;

    Ok(GrantOutcome::Granted(GrantResult {
        xp_applied,
        coins_applied,
        daily_xp: daily_xp + xp_applied,
        xp: lifetime_xp + xp_applied,
        coins: lifetime_coins + coins_applied,
    }))
}

/// Apply a free VIP streak recovery planned by the engine.
///
/// Guarded on the usage counter the plan observed; returns `None` when the
/// record changed underneath the plan (racing recovery), in which case
/// nothing was written.
pub async fn apply_free_recovery(
    pool: &SqlitePool,
    user_id: &str,
    observed_used: u32,
    new_used: u32,
    new_reset_at: DateTime<Utc>,
    free_uses_remaining: u32,
    now: DateTime<Utc>,
) -> Result<Option<RecoveryResult>> {
    let mut tx = pool
        .begin()
        .await
        .map_err(|e| Error::DatabaseError(e.to_string()))?;

    let updated = sqlx::query(
        r#"
        UPDATE user_progress
        SET streak_today = ?,
            last_highest_streak = MAX(last_highest_streak, ?),
            vip_recovery_used = ?,
            vip_recovery_reset_at = ?,
            last_recovery_used = ?
        WHERE user_id = ? AND vip = 1 AND vip_recovery_used = ?
        "#,
    )
    .bind(MAX_STREAK as i64)
    .bind(MAX_STREAK as i64)
    .bind(new_used as i64)
    .bind(new_reset_at)
    .bind(now)
    .bind(user_id)
    .bind(observed_used as i64)
    .execute(&mut *tx)
    .await
    .map_err(|e| Error::DatabaseError(e.to_string()))?;

    if updated.rows_affected() == 0 {
        return Ok(None);
    }

    let (coins,): (i64,) = sqlx::query_as("SELECT coins FROM user_progress WHERE user_id = ?")
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| Error::DatabaseError(e.to_string()))?;

    tx.commit()
        .await
        .map_err(|e| Error::DatabaseError(e.to_string()))?;

    Ok(Some(RecoveryResult {
        mode: RecoveryMode::VipFree,
        streak_today: MAX_STREAK,
        coins,
        free_uses_remaining,
    }))
}

/// Apply a paid streak recovery.
///
/// Guarded on the balance and on the streak still being broken, so a racing
/// double-tap restores once and deducts once. `None` means the record
/// changed underneath the plan (a concurrent recovery landed, or the balance
/// no longer covers the cost) and nothing was written.
pub async fn apply_paid_recovery(
    pool: &SqlitePool,
    user_id: &str,
    cost: i64,
    free_uses_remaining: u32,
    now: DateTime<Utc>,
) -> Result<Option<RecoveryResult>> {
    let mut tx = pool
        .begin()
        .await
        .map_err(|e| Error::DatabaseError(e.to_string()))?;

    let updated = sqlx::query(
        r#"
        UPDATE user_progress
        SET coins = coins - ?,
            streak_today = ?,
            last_highest_streak = MAX(last_highest_streak, ?),
            last_recovery_used = ?
        WHERE user_id = ? AND coins >= ? AND streak_today < ?
        "#,
    )
    .bind(cost)
    .bind(MAX_STREAK as i64)
    .bind(MAX_STREAK as i64)
    .bind(now)
    .bind(user_id)
    .bind(cost)
    .bind(MAX_STREAK as i64)
    .execute(&mut *tx)
    .await
    .map_err(|e| Error::DatabaseError(e.to_string()))?;

    if updated.rows_affected() == 0 {
        return Ok(None);
    }

    let (coins,): (i64,) = sqlx::query_as("SELECT coins FROM user_progress WHERE user_id = ?")
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| Error::DatabaseError(e.to_string()))?;

    tx.commit()
        .await
        .map_err(|e| Error::DatabaseError(e.to_string()))?;

    Ok(Some(RecoveryResult {
        mode: RecoveryMode::Paid,
        streak_today: MAX_STREAK,
        coins,
        free_uses_remaining,
    }))
}

/// Roll the day over: write the settled streak and zero the daily counters
/// in one statement, so the streak always sees the pre-reset daily XP.
///
/// Guarded on the `last_active_day` the caller observed; two racing session
/// loads roll the day over exactly once. Returns whether this caller won.
pub async fn apply_day_rollover(
    pool: &SqlitePool,
    user_id: &str,
    observed_last_active: Option<NaiveDate>,
    today: NaiveDate,
    new_streak: u32,
) -> Result<bool> {
    let updated = sqlx::query(
        r#"
        UPDATE user_progress
        SET streak_today = ?,
            last_highest_streak = MAX(last_highest_streak, ?),
            daily_xp = 0,
            daily_coins = 0,
            bonus_claimed = 0,
            last_active_day = ?
        WHERE user_id = ? AND last_active_day IS ?
        "#,
    )
    .bind(new_streak as i64)
    .bind(new_streak as i64)
    .bind(today)
    .bind(user_id)
    .bind(observed_last_active)
    .execute(pool)
    .await
    .map_err(|e| Error::DatabaseError(e.to_string()))?;

    Ok(updated.rows_affected() > 0)
}

/// Monthly reset: purge all of the user's claim records (re-opening
/// previously completed activities) and stamp the marker. Returns the
/// number of claims removed.
pub async fn apply_monthly_reset(
    pool: &SqlitePool,
    user_id: &str,
    now: DateTime<Utc>,
) -> Result<u64> {
    let mut tx = pool
        .begin()
        .await
        .map_err(|e| Error::DatabaseError(e.to_string()))?;

    let deleted = sqlx::query("DELETE FROM activity_claims WHERE user_id = ?")
        .bind(user_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| Error::DatabaseError(e.to_string()))?;

    sqlx::query("UPDATE user_progress SET last_reset_at = ? WHERE user_id = ?")
        .bind(now)
        .bind(user_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| Error::DatabaseError(e.to_string()))?;

    tx.commit()
        .await
        .map_err(|e| Error::DatabaseError(e.to_string()))?;

    Ok(deleted.rows_affected())
}

/// Stamp the monthly marker on a first-ever session (no purge needed yet)
pub async fn stamp_monthly_marker(
    pool: &SqlitePool,
    user_id: &str,
    at: DateTime<Utc>,
) -> Result<()> {
    sqlx::query("UPDATE user_progress SET last_reset_at = ? WHERE user_id = ? AND last_reset_at IS NULL")
        .bind(at)
        .bind(user_id)
        .execute(pool)
        .await
        .map_err(|e| Error::DatabaseError(e.to_string()))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlite::{count_claims, get_or_create_progress, get_progress};
    use crate::Database;
    use chrono::Duration;

    async fn setup() -> Database {
        Database::connect_in_memory().await.unwrap()
    }

    #[tokio::test]
    async fn test_grant_clamps_at_daily_cap() {
        let db = setup().await;
        let rules = RewardRuleset::default(); // xp_daily = 500

        for (i, expected) in [(0, 200), (1, 200), (2, 100), (3, 0)] {
            let outcome = grant_with_claim(
                db.pool(),
                "u1",
                &format!("poll:{}", i),
                200,
                10,
                &rules,
            )
            .await
            .unwrap();
            let result = outcome.result().expect("fresh activity must grant");
            assert_eq!(result.xp_applied, expected);
        }

        let progress = get_progress(db.pool(), "u1").await.unwrap().unwrap();
        assert_eq!(progress.daily_xp, 500);
        assert_eq!(progress.xp, 500);
        // Coins are uncapped by default
        assert_eq!(progress.coins, 40);
    }

    #[tokio::test]
    async fn test_repeat_grant_is_noop() {
        let db = setup().await;
        let rules = RewardRuleset::default();

        let first = grant_with_claim(db.pool(), "u1", "poll:7", 50, 10, &rules)
            .await
            .unwrap();
        assert!(first.is_granted());

        let second = grant_with_claim(db.pool(), "u1", "poll:7", 50, 10, &rules)
            .await
            .unwrap();
        assert!(!second.is_granted());

        let progress = get_progress(db.pool(), "u1").await.unwrap().unwrap();
        assert_eq!(progress.xp, 50);
        assert_eq!(progress.coins, 10);
    }

    #[tokio::test]
    async fn test_concurrent_grants_apply_once() {
        let db = setup().await;
        let rules = RewardRuleset::default();

        let (a, b) = tokio::join!(
            grant_with_claim(db.pool(), "u1", "video:9", 100, 20, &rules),
            grant_with_claim(db.pool(), "u1", "video:9", 100, 20, &rules),
        );

        let granted = [a.unwrap(), b.unwrap()]
            .iter()
            .filter(|o| o.is_granted())
            .count();
        assert_eq!(granted, 1);

        let progress = get_progress(db.pool(), "u1").await.unwrap().unwrap();
        assert_eq!(progress.xp, 100);
        assert_eq!(progress.coins, 20);
    }

    #[tokio::test]
    async fn test_bonus_requires_daily_xp() {
        let db = setup().await;
        let rules = RewardRuleset::default(); // xp_required = 300
        get_or_create_progress(db.pool(), "u1").await.unwrap();

        let err = claim_bonus(db.pool(), "u1", &rules).await.unwrap_err();
        assert!(matches!(err, Error::NotEligible(_)));

        // Failure left the record untouched
        let progress = get_progress(db.pool(), "u1").await.unwrap().unwrap();
        assert_eq!(progress.xp, 0);
        assert!(!progress.bonus_claimed);
    }

    #[tokio::test]
    async fn test_bonus_once_per_day() {
        let db = setup().await;
        let rules = RewardRuleset::default();

        grant_with_claim(db.pool(), "u1", "poll:1", 300, 0, &rules)
            .await
            .unwrap();

        let first = claim_bonus(db.pool(), "u1", &rules).await.unwrap();
        let result = first.result().expect("unlocked chest must grant");
        assert_eq!(result.coins_applied, rules.bonus.coins);

        let second = claim_bonus(db.pool(), "u1", &rules).await.unwrap();
        assert!(!second.is_granted());
    }

    #[tokio::test]
    async fn test_paid_recovery_guards_balance() {
        let db = setup().await;
        let rules = RewardRuleset::default();
        get_or_create_progress(db.pool(), "u1").await.unwrap();

        // Balance 0 < 5000: guard refuses, nothing written
        let refused = apply_paid_recovery(db.pool(), "u1", rules.recovery.coin_cost, 0, Utc::now())
            .await
            .unwrap();
        assert!(refused.is_none());

        grant_with_claim(db.pool(), "u1", "poll:1", 0, 6000, &rules)
            .await
            .unwrap();

        let result = apply_paid_recovery(db.pool(), "u1", rules.recovery.coin_cost, 0, Utc::now())
            .await
            .unwrap()
            .expect("funded recovery applies");
        assert_eq!(result.streak_today, MAX_STREAK);
        assert_eq!(result.coins, 1000);
    }

    #[tokio::test]
    async fn test_paid_recovery_applies_once() {
        let db = setup().await;
        let rules = RewardRuleset::default(); // coin_cost = 5000
        let now = Utc::now();

        grant_with_claim(db.pool(), "u1", "poll:1", 0, 10_000, &rules)
            .await
            .unwrap();

        // Both callers planned from the same observed state (broken streak,
        // 10 000 coins); only one apply may deduct
        let (a, b) = tokio::join!(
            apply_paid_recovery(db.pool(), "u1", rules.recovery.coin_cost, 0, now),
            apply_paid_recovery(db.pool(), "u1", rules.recovery.coin_cost, 0, now),
        );
        let applied = [a.unwrap(), b.unwrap()]
            .iter()
            .filter(|r| r.is_some())
            .count();
        assert_eq!(applied, 1);

        let progress = get_progress(db.pool(), "u1").await.unwrap().unwrap();
        assert_eq!(progress.coins, 5000);
        assert_eq!(progress.streak_today, MAX_STREAK);
    }

    #[tokio::test]
    async fn test_day_rollover_applies_once() {
        let db = setup().await;
        let rules = RewardRuleset::default();
        let today = NaiveDate::from_ymd_opt(2026, 8, 23).unwrap();

        grant_with_claim(db.pool(), "u1", "poll:1", 200, 10, &rules)
            .await
            .unwrap();

        let won = apply_day_rollover(db.pool(), "u1", None, today, 1).await.unwrap();
        assert!(won);
        // Second caller observed the same stale state and loses
        let lost = apply_day_rollover(db.pool(), "u1", None, today, 1).await.unwrap();
        assert!(!lost);

        let progress = get_progress(db.pool(), "u1").await.unwrap().unwrap();
        assert_eq!(progress.daily_xp, 0);
        assert_eq!(progress.daily_coins, 0);
        assert!(!progress.bonus_claimed);
        assert_eq!(progress.streak_today, 1);
        assert_eq!(progress.last_active_day, Some(today));
        // Lifetime totals survive the reset
        assert_eq!(progress.xp, 200);
        assert_eq!(progress.coins, 10);
    }

    #[tokio::test]
    async fn test_monthly_reset_reopens_activities() {
        let db = setup().await;
        let rules = RewardRuleset::default();

        grant_with_claim(db.pool(), "u1", "poll:1", 50, 10, &rules)
            .await
            .unwrap();
        let repeat = grant_with_claim(db.pool(), "u1", "poll:1", 50, 10, &rules)
            .await
            .unwrap();
        assert!(!repeat.is_granted());

        let deleted = apply_monthly_reset(db.pool(), "u1", Utc::now()).await.unwrap();
        assert_eq!(deleted, 1);
        assert_eq!(count_claims(db.pool(), "u1").await.unwrap(), 0);

        // The activity can be earned again after the purge
        let reopened = grant_with_claim(db.pool(), "u1", "poll:1", 50, 10, &rules)
            .await
            .unwrap();
        assert!(reopened.is_granted());
    }

    #[tokio::test]
    async fn test_monthly_marker_stamped_once() {
        let db = setup().await;
        get_or_create_progress(db.pool(), "u1").await.unwrap();

        let first = Utc::now() - Duration::days(3);
        stamp_monthly_marker(db.pool(), "u1", first).await.unwrap();
        stamp_monthly_marker(db.pool(), "u1", Utc::now()).await.unwrap();

        let progress = get_progress(db.pool(), "u1").await.unwrap().unwrap();
        assert_eq!(
            progress.last_reset_at.map(|t| t.timestamp()),
            Some(first.timestamp())
        );
    }
}
