//! User progress CRUD operations

use chrono::{DateTime, NaiveDate, Utc};
use rally_core::{Error, Result, UserProgress};
use sqlx::SqlitePool;

/// Database row for user progress
#[derive(Debug, sqlx::FromRow)]
struct ProgressRow {
    user_id: String,
    daily_xp: i64,
    daily_coins: i64,
    xp: i64,
    coins: i64,
    streak_today: i64,
    last_highest_streak: i64,
    last_active_day: Option<NaiveDate>,
    bonus_claimed: i64,
    vip: i64,
    vip_recovery_used: i64,
    vip_recovery_reset_at: Option<DateTime<Utc>>,
    last_recovery_used: Option<DateTime<Utc>>,
    last_reset_at: Option<DateTime<Utc>>,
}

impl From<ProgressRow> for UserProgress {
    fn from(row: ProgressRow) -> Self {
        UserProgress {
            user_id: row.user_id,
            daily_xp: row.daily_xp,
            daily_coins: row.daily_coins,
            xp: row.xp,
            coins: row.coins,
            streak_today: row.streak_today as u32,
            last_highest_streak: row.last_highest_streak as u32,
            last_active_day: row.last_active_day,
            bonus_claimed: row.bonus_claimed != 0,
            vip: row.vip != 0,
            vip_recovery_used: row.vip_recovery_used as u32,
            vip_recovery_reset_at: row.vip_recovery_reset_at,
            last_recovery_used: row.last_recovery_used,
            last_reset_at: row.last_reset_at,
        }
    }
}

const SELECT_PROGRESS: &str = r#"
    SELECT user_id, daily_xp, daily_coins, xp, coins, streak_today,
           last_highest_streak, last_active_day, bonus_claimed, vip,
           vip_recovery_used, vip_recovery_reset_at, last_recovery_used,
           last_reset_at
    FROM user_progress
    WHERE user_id = ?
"#;

/// Get a user's progress record, if one exists
pub async fn get_progress(pool: &SqlitePool, user_id: &str) -> Result<Option<UserProgress>> {
    let row: Option<ProgressRow> = sqlx::query_as(SELECT_PROGRESS)
        .bind(user_id)
        .fetch_optional(pool)
        .await
        .map_err(|e| Error::DatabaseError(e.to_string()))?;

    Ok(row.map(UserProgress::from))
}

/// Get a user's progress record, creating a zero-valued one on first use
pub async fn get_or_create_progress(pool: &SqlitePool, user_id: &str) -> Result<UserProgress> {
    sqlx::query("INSERT OR IGNORE INTO user_progress (user_id) VALUES (?)")
        .bind(user_id)
        .execute(pool)
        .await
        .map_err(|e| Error::DatabaseError(e.to_string()))?;

    get_progress(pool, user_id)
        .await?
        .ok_or_else(|| Error::DatabaseError("progress row missing after insert".to_string()))
}

/// Set a user's VIP flag
pub async fn set_vip(pool: &SqlitePool, user_id: &str, vip: bool) -> Result<()> {
    sqlx::query("UPDATE user_progress SET vip = ? WHERE user_id = ?")
        .bind(vip as i64)
        .bind(user_id)
        .execute(pool)
        .await
        .map_err(|e| Error::DatabaseError(e.to_string()))?;

    Ok(())
}

/// Overwrite the last active day (admin / test setup)
pub async fn set_last_active_day(
    pool: &SqlitePool,
    user_id: &str,
    day: Option<NaiveDate>,
) -> Result<()> {
    sqlx::query("UPDATE user_progress SET last_active_day = ? WHERE user_id = ?")
        .bind(day)
        .bind(user_id)
        .execute(pool)
        .await
        .map_err(|e| Error::DatabaseError(e.to_string()))?;

    Ok(())
}

/// Overwrite the current streak (admin / test setup)
pub async fn set_streak(pool: &SqlitePool, user_id: &str, streak: u32) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE user_progress
        SET streak_today = ?,
            last_highest_streak = MAX(last_highest_streak, ?)
        WHERE user_id = ?
        "#,
    )
    .bind(streak as i64)
    .bind(streak as i64)
    .bind(user_id)
    .execute(pool)
    .await
    .map_err(|e| Error::DatabaseError(e.to_string()))?;

    Ok(())
}
