//! Logging and alerting.

mod alerter;
mod logging;

pub use alerter::TracingAlerter;
pub use logging::setup_logging;
