//! Child-order slicing policies.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tradeflow_core::types::{ChildOrder, OrderVector};

/// How a parent order vector is split into child orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum SlicingPolicy {
    /// The whole vector as one order
    #[default]
    Whole,
    /// Successive slices where no leg exceeds `max_quantity` in absolute value
    MaxClip { max_quantity: u64 },
}

impl SlicingPolicy {
    /// Split a parent vector into child orders in dispatch order.
    ///
    /// Always yields at least one child, so an all-zero vector still becomes
    /// a single (empty) order.
    pub fn slice(&self, parent: &OrderVector, created_at: Option<DateTime<Utc>>) -> Vec<ChildOrder> {
        match *self {
            SlicingPolicy::Whole => vec![ChildOrder::new(parent.clone(), created_at, 0)],
            SlicingPolicy::MaxClip { max_quantity } if max_quantity > 0 => {
                let clip = i64::try_from(max_quantity).unwrap_or(i64::MAX);
                let mut remaining = parent.clone();
                let mut children = Vec::new();

                while children.is_empty() || remaining.values().any(|q| *q != 0) {
                    let slice: OrderVector = remaining
                        .iter_mut()
                        .map(|(symbol, qty)| {
                            let take = (*qty).clamp(-clip, clip);
                            *qty -= take;
                            (symbol.clone(), take)
                        })
                        .collect();
                    children.push(ChildOrder::new(slice, created_at, children.len()));
                }
                children
            }
            SlicingPolicy::MaxClip { .. } => vec![ChildOrder::new(parent.clone(), created_at, 0)],
        }
    }
}
