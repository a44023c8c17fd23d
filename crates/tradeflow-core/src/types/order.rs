//! Child orders handed to the order dispatcher.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::OrderVector;

/// Order side (buy or sell).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// Side for a signed quantity. Zero has no side.
    pub fn from_quantity(quantity: i64) -> Option<Self> {
        match quantity.signum() {
            1 => Some(Side::Buy),
            -1 => Some(Side::Sell),
            _ => None,
        }
    }

    /// Get the opposite side.
    pub fn opposite(&self) -> Self {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

/// One order awaiting dispatch.
///
/// A parent order vector may be sliced into several child orders; `sequence`
/// is the slice index within its parent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChildOrder {
    /// Unique order ID
    pub id: Uuid,
    /// Event time of the pipeline pass that produced the order
    pub created_at: Option<DateTime<Utc>>,
    /// Slice index within the parent order vector
    pub sequence: usize,
    /// Quantities to trade
    pub quantities: OrderVector,
}

impl ChildOrder {
    /// Create a new child order.
    pub fn new(quantities: OrderVector, created_at: Option<DateTime<Utc>>, sequence: usize) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at,
            sequence,
            quantities,
        }
    }

    /// Whether every quantity is zero.
    pub fn is_empty(&self) -> bool {
        self.quantities.values().all(|q| *q == 0)
    }

    /// Non-zero legs with their side and absolute quantity.
    pub fn legs(&self) -> impl Iterator<Item = (&str, Side, u64)> {
        self.quantities.iter().filter_map(|(symbol, qty)| {
            Side::from_quantity(*qty).map(|side| (symbol.as_str(), side, qty.unsigned_abs()))
        })
    }

    /// Sum of absolute quantities.
    pub fn gross_quantity(&self) -> u64 {
        self.quantities.values().map(|q| q.unsigned_abs()).sum()
    }
}
