//! Reward ruleset storage
//!
//! The ruleset lives as a JSON document in the settings table. A missing or
//! malformed document reads as `None`; the engine substitutes the hardcoded
//! defaults so the economy keeps functioning without configuration.

use rally_core::{Error, Result, RewardRuleset};
use sqlx::SqlitePool;

const RULESET_KEY: &str = "reward_ruleset";

/// Load the configured ruleset, if a parseable one is stored
pub async fn load_ruleset(pool: &SqlitePool) -> Result<Option<RewardRuleset>> {
    let value = sqlx::query_scalar::<_, String>("SELECT value FROM settings WHERE key = ?")
        .bind(RULESET_KEY)
        .fetch_optional(pool)
        .await
        .map_err(|e| Error::DatabaseError(e.to_string()))?;

    match value {
        Some(json) => Ok(serde_json::from_str(&json).ok()),
        None => Ok(None),
    }
}

/// Store (or replace) the ruleset document
pub async fn store_ruleset(pool: &SqlitePool, rules: &RewardRuleset) -> Result<()> {
    let json = serde_json::to_string(rules)?;

    sqlx::query(
        "INSERT INTO settings (key, value) VALUES (?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value = ?2",
    )
    .bind(RULESET_KEY)
    .bind(json)
    .execute(pool)
    .await
    .map_err(|e| Error::DatabaseError(e.to_string()))?;

    Ok(())
}
