//! Rally Core - Shared data models, configuration, and errors

pub mod errors;
pub mod models;

pub use errors::{Error, Result};
pub use models::*;
