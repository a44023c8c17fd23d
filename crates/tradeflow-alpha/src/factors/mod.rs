//! Built-in factor implementations.

mod clock;
mod pair_spread;
mod serial_momentum;

pub use pair_spread::{PairSpreadConfig, PairSpreadFactor};
pub use serial_momentum::{SerialMomentumConfig, SerialMomentumFactor};
