//! Order execution.
//!
//! Slices order vectors into child orders, queues them and dispatches at
//! most one per pipeline pass.

mod paper;
mod slicing;
mod stage;

pub use paper::{PaperDispatcher, PaperLedger};
pub use slicing::SlicingPolicy;
pub use stage::{DispatchFailure, ExecutionConfig, ExecutionStage};
