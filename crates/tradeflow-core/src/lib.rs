//! Core types and traits for the trading pipeline.
//!
//! This crate provides the foundational building blocks shared by every stage:
//! - Market data events (Bar, Quote, Trade) and the observed market state
//! - Universe, signal, target and order vector types
//! - Collaborator traits (universe provider, factor computation, risk
//!   optimizer, order dispatcher, alerter) and stage announcement traits
//! - The pipeline error taxonomy

pub mod error;
pub mod traits;
pub mod types;

pub use error::{PipelineError, PipelineResult};
pub use traits::*;
pub use types::*;
