//! The execution stage.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info};
use tradeflow_core::error::{DispatchError, ExecutionError, PipelineResult};
use tradeflow_core::traits::{OrderDispatcher, SnapshotConsumer, UniverseConsumer};
use tradeflow_core::types::{ChildOrder, MarketSnapshot, OrderVector, TradingUniverse};
use uuid::Uuid;

use crate::slicing::SlicingPolicy;

/// Execution stage configuration.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    pub slicing: SlicingPolicy,
}

/// A dispatch attempt that failed. The order is handed back to the caller.
#[derive(Error, Debug)]
#[error("Dispatch of order {} failed: {source}", .order.id)]
pub struct DispatchFailure {
    pub order: ChildOrder,
    #[source]
    pub source: DispatchError,
}

impl DispatchFailure {
    /// Convert to the pipeline error, keeping the order id.
    pub fn to_error(&self) -> ExecutionError {
        ExecutionError::DispatchFailed {
            order_id: self.order.id,
            source: self.source.clone(),
        }
    }
}

/// Owns the pending order queue.
pub struct ExecutionStage {
    config: ExecutionConfig,
    dispatcher: Box<dyn OrderDispatcher>,
    pending: VecDeque<ChildOrder>,
    orders_to_execute: OrderVector,
    snapshot: Option<MarketSnapshot>,
    dispatched: usize,
}

impl ExecutionStage {
    /// Create a new execution stage.
    pub fn new(config: ExecutionConfig, dispatcher: Box<dyn OrderDispatcher>) -> Self {
        Self {
            config,
            dispatcher,
            pending: VecDeque::new(),
            orders_to_execute: OrderVector::new(),
            snapshot: None,
            dispatched: 0,
        }
    }

    /// Number of orders waiting for dispatch.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Orders waiting for dispatch, head first.
    pub fn pending(&self) -> impl Iterator<Item = &ChildOrder> {
        self.pending.iter()
    }

    /// Number of successful dispatches.
    pub fn dispatched_count(&self) -> usize {
        self.dispatched
    }

    /// Most recent parent order vector.
    pub fn orders_to_execute(&self) -> &OrderVector {
        &self.orders_to_execute
    }

    /// Store an order vector and queue its child orders.
    pub fn execute(&mut self, orders: OrderVector) {
        self.orders_to_execute = orders;
        self.create_order();
    }

    /// Slice the stored vector and append the children to the queue tail.
    pub fn create_order(&mut self) {
        let created_at = self.snapshot.as_ref().and_then(|s| s.current_time());
        let children = self.config.slicing.slice(&self.orders_to_execute, created_at);
        debug!(
            children = children.len(),
            pending = self.pending.len() + children.len(),
            "Queued child orders"
        );
        self.pending.extend(children);
    }

    /// Dispatch the head of the queue.
    ///
    /// Returns the dispatched order id, or `None` when nothing is pending.
    /// A failed order is not re-queued; it comes back in the error.
    pub fn send_pending(&mut self) -> Result<Option<Uuid>, DispatchFailure> {
        let Some(order) = self.pending.pop_front() else {
            return Ok(None);
        };

        match self.dispatcher.send(&order) {
            Ok(()) => {
                self.dispatched += 1;
                debug!(
                    order_id = %order.id,
                    gross = order.gross_quantity(),
                    pending = self.pending.len(),
                    "Dispatched order"
                );
                Ok(Some(order.id))
            }
            Err(source) => {
                error!(order_id = %order.id, error = %source, "Order dispatch failed");
                Err(DispatchFailure { order, source })
            }
        }
    }

    /// Put an order back at the head of the queue.
    pub fn requeue_front(&mut self, order: ChildOrder) {
        self.pending.push_front(order);
    }
}

impl UniverseConsumer for ExecutionStage {
    fn receive_universe(&mut self, _universe: Arc<TradingUniverse>) {}

    fn initialise(&mut self) -> PipelineResult<()> {
        // Queued orders are already committed and survive a refresh
        info!(
            dispatcher = self.dispatcher.name(),
            pending = self.pending.len(),
            "Execution stage initialised"
        );
        Ok(())
    }
}

impl SnapshotConsumer for ExecutionStage {
    fn receive_snapshot(&mut self, snapshot: MarketSnapshot) {
        self.snapshot = Some(snapshot);
    }
}
