//! CLI command implementations.

pub mod factors;
pub mod run;
pub mod validate;
