//! Data models for the reward engine

pub mod claim;
pub mod grant;
pub mod progress;
pub mod ruleset;

pub use claim::*;
pub use grant::*;
pub use progress::*;
pub use ruleset::*;
