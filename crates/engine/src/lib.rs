//! Rally Engine - Reward decision logic and orchestration
//!
//! Pure decision functions (streaks, recovery planning, watch tracking) plus
//! the services that apply their decisions through the persistence layer.

pub mod recovery;
pub mod rewards;
pub mod session;
pub mod streak;
pub mod watch;

pub use rewards::RewardService;
pub use session::{open_session, SessionState};
pub use watch::{WatchHandle, WatchSession};
