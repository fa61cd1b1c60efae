//! Per-user progress record

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Highest reachable day streak.
pub const MAX_STREAK: u32 = 7;

/// Per-user gamification state. One record per user, created zero-valued on
/// first session, mutated by every grant/recovery/reset, never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProgress {
    pub user_id: String,
    /// XP earned today (reset at the day boundary, capped by the ruleset)
    pub daily_xp: i64,
    /// Coins earned today (reset at the day boundary)
    pub daily_coins: i64,
    /// Lifetime XP
    pub xp: i64,
    /// Lifetime coin balance (spendable, e.g. on streak recovery)
    pub coins: i64,
    /// Current day streak, 0..=7
    pub streak_today: u32,
    /// Historical maximum streak; never decreased
    pub last_highest_streak: u32,
    /// Calendar day of the last settled activity (local to the client)
    pub last_active_day: Option<NaiveDate>,
    /// Whether today's bonus chest was already opened
    pub bonus_claimed: bool,
    pub vip: bool,
    /// Free VIP recoveries consumed in the current cooldown window
    pub vip_recovery_used: u32,
    /// End of the current VIP recovery cooldown window
    pub vip_recovery_reset_at: Option<DateTime<Utc>>,
    /// Last time any streak recovery (free or paid) was used
    pub last_recovery_used: Option<DateTime<Utc>>,
    /// Marker for the monthly claim purge
    pub last_reset_at: Option<DateTime<Utc>>,
}

impl UserProgress {
    /// Fresh zero-valued record for a first session
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            daily_xp: 0,
            daily_coins: 0,
            xp: 0,
            coins: 0,
            streak_today: 0,
            last_highest_streak: 0,
            last_active_day: None,
            bonus_claimed: false,
            vip: false,
            vip_recovery_used: 0,
            vip_recovery_reset_at: None,
            last_recovery_used: None,
            last_reset_at: None,
        }
    }
}
