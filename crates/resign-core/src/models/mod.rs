//! Domain models for a resign run.

pub mod artifact;
pub mod credentials;
pub mod release;
pub mod run;

pub use artifact::*;
pub use credentials::*;
pub use release::*;
pub use run::*;
