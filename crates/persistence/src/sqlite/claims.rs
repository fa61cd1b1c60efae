//! Activity claim persistence
//!
//! A claim row's existence means "reward already granted for this item".
//! Rows are only ever created inside the grant transaction (see `grants.rs`)
//! and only ever removed by the monthly reset.

use chrono::{DateTime, Utc};
use rally_core::{ActivityClaim, Error, Result};
use sqlx::SqlitePool;

/// Check whether a claim exists (read-only gate for the UI)
pub async fn has_claim(pool: &SqlitePool, user_id: &str, activity_id: &str) -> Result<bool> {
    let count: (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM activity_claims WHERE user_id = ? AND activity_id = ?",
    )
    .bind(user_id)
    .bind(activity_id)
    .fetch_one(pool)
    .await
    .map_err(|e| Error::DatabaseError(e.to_string()))?;

    Ok(count.0 > 0)
}

/// List a user's claims, newest first
pub async fn list_claims(pool: &SqlitePool, user_id: &str) -> Result<Vec<ActivityClaim>> {
    let rows: Vec<(String, String, DateTime<Utc>)> = sqlx::query_as(
        r#"
        SELECT user_id, activity_id, granted_at
        FROM activity_claims
        WHERE user_id = ?
        ORDER BY granted_at DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
    .map_err(|e| Error::DatabaseError(e.to_string()))?;

    Ok(rows
        .into_iter()
        .map(|(user_id, activity_id, granted_at)| ActivityClaim {
            user_id,
            activity_id,
            granted_at,
        })
        .collect())
}

/// Count a user's claims
pub async fn count_claims(pool: &SqlitePool, user_id: &str) -> Result<u32> {
    let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM activity_claims WHERE user_id = ?")
        .bind(user_id)
        .fetch_one(pool)
        .await
        .map_err(|e| Error::DatabaseError(e.to_string()))?;

    Ok(count.0 as u32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;

    #[tokio::test]
    async fn test_has_claim_empty() {
        let db = Database::connect_in_memory().await.unwrap();
        assert!(!has_claim(db.pool(), "u1", "poll:1").await.unwrap());
        assert_eq!(count_claims(db.pool(), "u1").await.unwrap(), 0);
    }
}
