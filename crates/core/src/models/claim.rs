//! Activity claim records (idempotency markers)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of reward-granting activity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityKind {
    Poll,
    Video,
}

impl ActivityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityKind::Poll => "poll",
            ActivityKind::Video => "video",
        }
    }

    /// Namespaced claim id for one content item, e.g. `poll:42`
    pub fn activity_id(&self, content_id: &str) -> String {
        format!("{}:{}", self.as_str(), content_id)
    }
}

/// Idempotency marker: its existence alone means "reward already granted for
/// this item". Created exactly once per (user, activity), never mutated,
/// bulk-deleted only by the monthly reset.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityClaim {
    pub user_id: String,
    pub activity_id: String,
    pub granted_at: DateTime<Utc>,
}
