//! Grant and recovery result models

use serde::{Deserialize, Serialize};

/// Amounts actually applied by a grant, after cap clamping
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrantResult {
    /// XP applied (may be less than requested when the daily cap cut in)
    pub xp_applied: i64,
    /// Coins applied
    pub coins_applied: i64,
    /// Daily XP after the grant
    pub daily_xp: i64,
    /// Lifetime XP after the grant
    pub xp: i64,
    /// Lifetime coin balance after the grant
    pub coins: i64,
}

impl GrantResult {
    /// Whether the daily cap reduced the applied amounts
    pub fn was_capped(&self, requested_xp: i64, requested_coins: i64) -> bool {
        self.xp_applied < requested_xp || self.coins_applied < requested_coins
    }
}

/// Outcome of an idempotent grant attempt.
///
/// A repeated claim is a success no-op from the user's perspective, so it is
/// a variant here rather than an error.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "outcome")]
pub enum GrantOutcome {
    Granted(GrantResult),
    AlreadyGranted,
}

impl GrantOutcome {
    pub fn is_granted(&self) -> bool {
        matches!(self, GrantOutcome::Granted(_))
    }

    pub fn result(&self) -> Option<&GrantResult> {
        match self {
            GrantOutcome::Granted(r) => Some(r),
            GrantOutcome::AlreadyGranted => None,
        }
    }
}

/// How a streak recovery was funded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RecoveryMode {
    /// Free VIP entitlement
    VipFree,
    /// Paid with coins
    Paid,
}

/// Result of a successful streak recovery
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecoveryResult {
    pub mode: RecoveryMode,
    /// Restored streak value (always the maximum)
    pub streak_today: u32,
    /// Coin balance after any deduction
    pub coins: i64,
    /// Free VIP uses left in the current window
    pub free_uses_remaining: u32,
}
