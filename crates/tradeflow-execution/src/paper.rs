//! Paper dispatcher for replays and simulation.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::info;
use tradeflow_core::error::DispatchError;
use tradeflow_core::traits::OrderDispatcher;
use tradeflow_core::types::ChildOrder;

/// What the paper dispatcher has seen.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PaperLedger {
    /// Net position per instrument
    pub positions: BTreeMap<String, i64>,
    /// Dispatched orders in dispatch order
    pub sent: Vec<ChildOrder>,
}

/// Dispatcher that fills every order in full at no cost.
///
/// Clones share one ledger, so a handle kept by the caller sees the orders
/// sent through the clone owned by the execution stage.
#[derive(Debug, Clone, Default)]
pub struct PaperDispatcher {
    ledger: Arc<Mutex<PaperLedger>>,
    reject_next: Arc<Mutex<Option<DispatchError>>>,
}

impl PaperDispatcher {
    /// Create a new paper dispatcher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `send` with the given error.
    pub fn fail_next(&self, error: DispatchError) {
        *lock(&self.reject_next) = Some(error);
    }

    /// Snapshot of the ledger.
    pub fn ledger(&self) -> PaperLedger {
        lock(&self.ledger).clone()
    }

    /// Net position of an instrument.
    pub fn position(&self, symbol: &str) -> i64 {
        lock(&self.ledger).positions.get(symbol).copied().unwrap_or(0)
    }

    /// Number of orders dispatched.
    pub fn sent_count(&self) -> usize {
        lock(&self.ledger).sent.len()
    }
}

// Poisoned ledgers stay readable
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl OrderDispatcher for PaperDispatcher {
    fn send(&mut self, order: &ChildOrder) -> Result<(), DispatchError> {
        if let Some(error) = lock(&self.reject_next).take() {
            return Err(error);
        }

        let mut ledger = lock(&self.ledger);
        for (symbol, side, quantity) in order.legs() {
            info!(
                order_id = %order.id,
                symbol,
                side = %side,
                quantity,
                "Paper fill"
            );
        }
        for (symbol, qty) in &order.quantities {
            let position = ledger.positions.entry(symbol.clone()).or_insert(0);
            *position += qty;
        }
        ledger.sent.push(order.clone());
        Ok(())
    }

    fn name(&self) -> &str {
        "paper"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order(entries: &[(&str, i64)]) -> ChildOrder {
        ChildOrder::new(
            entries.iter().map(|(s, q)| (s.to_string(), *q)).collect(),
            None,
            0,
        )
    }

    #[test]
    fn test_positions_accumulate_across_clones() {
        let handle = PaperDispatcher::new();
        let mut dispatcher = handle.clone();

        dispatcher.send(&order(&[("A", 100), ("B", -50)])).unwrap();
        dispatcher.send(&order(&[("A", -30), ("B", 0)])).unwrap();

        assert_eq!(handle.position("A"), 70);
        assert_eq!(handle.position("B"), -50);
        assert_eq!(handle.sent_count(), 2);
    }

    #[test]
    fn test_fail_next_only_once() {
        let mut dispatcher = PaperDispatcher::new();
        dispatcher.fail_next(DispatchError::Connection("down".into()));

        assert!(dispatcher.send(&order(&[("A", 1)])).is_err());
        assert!(dispatcher.send(&order(&[("A", 1)])).is_ok());
        assert_eq!(dispatcher.position("A"), 1);
    }
}
