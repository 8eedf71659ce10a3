pub mod config;
pub mod error;
pub mod paths;

pub use config::{Config, DEFAULT_MATCH_THRESHOLD};
pub use error::{FaceAuthError, Result};
pub use paths::{Paths, RunMode};
