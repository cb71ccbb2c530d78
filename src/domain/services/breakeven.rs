//! Breakeven elevation
//!
//! Once a position's floating profit clears a fixed monetary threshold, the
//! stop-loss is moved just past the entry price so the trade can no longer
//! close at a loss. The move happens once per ticket; the registry flag makes
//! repeated calls no-ops.

use crate::audit::{AuditEvent, AuditHandle};
use crate::domain::entities::instrument::InstrumentMeta;
use crate::domain::entities::position::{Direction, Position};
use crate::domain::repositories::execution_gateway::{ExecutionGateway, GatewayResult};
use crate::domain::services::position_registry::PositionRegistry;
use crate::domain::value_objects::price::Price;
use crate::retry::{self, RetryPolicy};
use std::sync::Arc;
use tracing::info;

/// Stop level that protects the entry: entry plus a small buffer in the
/// profit direction.
pub fn breakeven_target(position: &Position, meta: &InstrumentMeta) -> Option<Price> {
    let delta = match position.direction {
        Direction::Buy => meta.breakeven_buffer(),
        Direction::Sell => -meta.breakeven_buffer(),
    };
    position.entry_price.offset(delta).ok()
}

pub struct BreakevenElevator {
    gateway: Arc<dyn ExecutionGateway>,
    registry: Arc<PositionRegistry>,
    audit: AuditHandle,
    retry: RetryPolicy,
    /// Profit threshold in account currency
    threshold: f64,
}

impl BreakevenElevator {
    pub fn new(
        gateway: Arc<dyn ExecutionGateway>,
        registry: Arc<PositionRegistry>,
        audit: AuditHandle,
        threshold: f64,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            gateway,
            registry,
            audit,
            retry,
            threshold,
        }
    }

    /// Elevate the stop to breakeven if the position qualifies.
    ///
    /// # Returns
    /// The applied stop-loss, or None when no move was needed
    pub async fn try_elevate(&self, position: &Position) -> GatewayResult<Option<Price>> {
        if position.profit.value() < self.threshold {
            return Ok(None);
        }

        let already_reached = self
            .registry
            .with_state(position.ticket, |state| state.breakeven_reached);
        if already_reached {
            return Ok(None);
        }

        if position.entry_protected() {
            // a ladder step or the broker already put the stop past entry
            self.registry
                .with_state(position.ticket, |state| state.breakeven_reached = true);
            return Ok(None);
        }

        let meta = InstrumentMeta::for_symbol(&position.symbol);
        let Some(target) = breakeven_target(position, &meta) else {
            return Ok(None);
        };

        retry::with_retry(&self.retry, "modify_stop", || {
            self.gateway
                .modify_stop(position.ticket, target, position.current_tp)
        })
        .await?;

        self.registry
            .with_state(position.ticket, |state| state.breakeven_reached = true);

        info!(
            "breakeven reached on {} ticket {} at {}: stop moved to {:.5}",
            position.symbol,
            position.ticket,
            position.profit,
            target.value()
        );
        self.audit.record(AuditEvent::BreakevenSet {
            ticket: position.ticket,
            symbol: position.symbol.clone(),
            new_sl: target.value(),
            profit: position.profit.value(),
        });

        Ok(Some(target))
    }
}
