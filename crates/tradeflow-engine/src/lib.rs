//! Pipeline orchestration.
//!
//! The [`Orchestrator`] wires the data, signal, portfolio and execution
//! stages together behind an explicit lifecycle state machine.

mod orchestrator;
mod provider;
mod state;

pub use orchestrator::{EngineConfig, EventOutcome, Orchestrator};
pub use provider::{InstrumentSpec, StaticUniverseConfig, StaticUniverseProvider};
pub use state::{PipelineState, PipelineStats};
