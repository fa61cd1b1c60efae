//! Reward ruleset configuration
//!
//! Read-only economy configuration. The document is stored as JSON in the
//! settings table; every section and field is `#[serde(default)]` so a
//! partial document still parses and anything missing falls back to the
//! hardcoded defaults below. A missing document entirely is not an error;
//! the engine substitutes `RewardRuleset::default()` so the economy keeps
//! functioning.

use serde::{Deserialize, Serialize};

/// XP/coin rates for a single activity kind
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ActivityRates {
    pub xp: i64,
    pub coins: i64,
}

impl Default for ActivityRates {
    fn default() -> Self {
        Self { xp: 50, coins: 10 }
    }
}

/// Video-specific rules
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VideoRules {
    pub xp: i64,
    pub coins: i64,
    /// Percentage of the duration that must be watched for completion
    pub watch_percentage: f64,
}

impl Default for VideoRules {
    fn default() -> Self {
        Self {
            xp: 100,
            coins: 20,
            watch_percentage: 80.0,
        }
    }
}

/// Bonus chest rules
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BonusRules {
    /// Daily XP needed before the chest unlocks
    pub xp_required: i64,
    pub xp: i64,
    pub coins: i64,
}

impl Default for BonusRules {
    fn default() -> Self {
        Self {
            xp_required: 300,
            xp: 50,
            coins: 100,
        }
    }
}

/// Streak rules
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StreakRules {
    /// Daily XP a day must reach to count as a qualifying day
    pub threshold: i64,
}

impl Default for StreakRules {
    fn default() -> Self {
        Self { threshold: 150 }
    }
}

/// Streak recovery rules
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RecoveryRules {
    /// Coin price of a paid recovery
    pub coin_cost: i64,
    /// Free recoveries a VIP gets per cooldown window
    pub vip_max_free_uses: u32,
    /// Length of the VIP cooldown window in days
    pub vip_cooldown_days: i64,
}

impl Default for RecoveryRules {
    fn default() -> Self {
        Self {
            coin_cost: 5000,
            vip_max_free_uses: 2,
            vip_cooldown_days: 7,
        }
    }
}

/// Complete reward ruleset
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct RewardRuleset {
    pub polls: ActivityRates,
    pub videos: VideoRules,
    pub bonus: BonusRules,
    pub streak: StreakRules,
    pub recovery: RecoveryRules,
    pub caps: CapRules,
}

/// Daily accumulation caps
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CapRules {
    pub xp_daily: i64,
    /// Coins are uncapped unless configured
    pub coins_daily: Option<i64>,
}

impl Default for CapRules {
    fn default() -> Self {
        Self {
            xp_daily: 500,
            coins_daily: None,
        }
    }
}

impl RewardRuleset {
    /// XP that can actually be applied given today's accumulation.
    /// `min(daily_xp + amount, cap) - daily_xp`, never negative.
    pub fn clamp_xp(&self, daily_xp: i64, amount: i64) -> i64 {
        let new_daily = (daily_xp + amount).min(self.caps.xp_daily);
        (new_daily - daily_xp).max(0)
    }

    /// Coins that can actually be applied; uncapped when no daily coin cap
    /// is configured.
    pub fn clamp_coins(&self, daily_coins: i64, amount: i64) -> i64 {
        match self.caps.coins_daily {
            Some(cap) => {
                let new_daily = (daily_coins + amount).min(cap);
                (new_daily - daily_coins).max(0)
            }
            None => amount.max(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let rules = RewardRuleset::default();
        assert_eq!(rules.caps.xp_daily, 500);
        assert_eq!(rules.caps.coins_daily, None);
        assert_eq!(rules.streak.threshold, 150);
        assert_eq!(rules.videos.watch_percentage, 80.0);
        assert_eq!(rules.recovery.coin_cost, 5000);
        assert_eq!(rules.recovery.vip_max_free_uses, 2);
        assert_eq!(rules.recovery.vip_cooldown_days, 7);
    }

    #[test]
    fn test_partial_document_parses() {
        // Only overrides the poll rates; everything else keeps defaults
        let rules: RewardRuleset =
            serde_json::from_str(r#"{"polls": {"xp": 75}}"#).unwrap();
        assert_eq!(rules.polls.xp, 75);
        assert_eq!(rules.polls.coins, 10);
        assert_eq!(rules.caps.xp_daily, 500);
    }

    #[test]
    fn test_clamp_xp_at_cap() {
        let rules = RewardRuleset::default();
        assert_eq!(rules.clamp_xp(0, 100), 100);
        assert_eq!(rules.clamp_xp(450, 100), 50);
        assert_eq!(rules.clamp_xp(500, 100), 0);
        // Over-cap state never goes negative
        assert_eq!(rules.clamp_xp(600, 100), 0);
    }

    #[test]
    fn test_clamp_coins_uncapped_by_default() {
        let rules = RewardRuleset::default();
        assert_eq!(rules.clamp_coins(10_000, 500), 500);
    }

    #[test]
    fn test_clamp_coins_with_cap() {
        let mut rules = RewardRuleset::default();
        rules.caps.coins_daily = Some(200);
        assert_eq!(rules.clamp_coins(150, 100), 50);
        assert_eq!(rules.clamp_coins(200, 100), 0);
    }
}
