//! Streak computation
//!
//! Pure calendar arithmetic: the next streak value from elapsed days and
//! whether today's XP threshold was met. Callers must only invoke this once
//! the day's XP has settled (the session bootstrap runs it against the
//! still-uncleared `daily_xp` before the daily reset zeroes it).

use chrono::NaiveDate;
use rally_core::MAX_STREAK;

/// What the caller should do with the streak for today
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreakDecision {
    /// Same calendar day: perform no write at all
    Skip,
    /// Day boundary crossed: write this streak and stamp today
    Update { streak: u32 },
}

/// Compute the next streak value.
///
/// `xp_earned_today` is the daily XP settled for the day being closed out,
/// compared against the qualifying `threshold`.
pub fn next_streak(
    xp_earned_today: i64,
    current_streak: u32,
    last_active_day: Option<NaiveDate>,
    today: NaiveDate,
    threshold: i64,
) -> StreakDecision {
    let qualified = xp_earned_today >= threshold;

    let last = match last_active_day {
        // First ever activity
        None => {
            return StreakDecision::Update {
                streak: if qualified { 1 } else { 0 },
            }
        }
        Some(d) => d,
    };

    match (today - last).num_days() {
        // Same-day call: the caller must skip the write entirely
        d if d <= 0 => StreakDecision::Skip,
        1 => StreakDecision::Update {
            streak: if qualified {
                (current_streak + 1).min(MAX_STREAK)
            } else {
                current_streak.saturating_sub(1)
            },
        },
        // Two or more days idle: the chain is broken either way
        _ => StreakDecision::Update {
            streak: if qualified { 1 } else { 0 },
        },
    }
}
