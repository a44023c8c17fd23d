//! Order dispatcher trait definition.

use crate::error::DispatchError;
use crate::types::ChildOrder;

/// External send function for child orders.
///
/// Called at most once per order per pipeline pass. Implementations must not
/// block on I/O; a broker adapter should hand the order to its own
/// connection task and return.
pub trait OrderDispatcher: Send {
    /// Send one order.
    fn send(&mut self, order: &ChildOrder) -> Result<(), DispatchError>;

    /// Get the dispatcher name.
    fn name(&self) -> &str;
}
