//! Resign Core Library
//!
//! Fetches the latest published build artifact from a release host, re-signs it
//! with an external signing tool and reports the resulting install link. The
//! staging workspace used along the way never outlives a run.

pub mod error;
pub mod logscan;
pub mod models;
pub mod providers;
pub mod signing;
pub mod workflow;
pub mod workspace;

pub use error::{ErrorKind, ResignError, Result};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
