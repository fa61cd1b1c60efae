//! SQLite database management

mod claims;
mod connection;
mod grants;
mod progress;
mod rulesets;

pub use claims::*;
pub use connection::Database;
pub use grants::*;
pub use progress::*;
pub use rulesets::*;
