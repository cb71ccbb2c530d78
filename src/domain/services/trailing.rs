//! Trailing stop engine
//!
//! Arms once a position's profit clears the activation threshold, then
//! follows favorable price movement at a fixed distance. Updates are only
//! sent when the stop improves by at least one step (hysteresis), and the
//! ratchet never moves backward. This is the only component allowed to move
//! an already-trailing position's stop.

use crate::audit::{AuditEvent, AuditHandle};
use crate::domain::entities::instrument::InstrumentMeta;
use crate::domain::entities::position::{Direction, Position};
use crate::domain::repositories::execution_gateway::{ExecutionGateway, GatewayResult, Tick};
use crate::domain::services::position_registry::PositionRegistry;
use crate::domain::value_objects::price::Price;
use crate::retry::{self, RetryPolicy};
use std::sync::Arc;
use tracing::{debug, info};

/// Stop candidate at the trailing distance behind the closing side of the
/// market.
pub fn trail_candidate(position: &Position, tick: &Tick, meta: &InstrumentMeta) -> Option<Price> {
    let market = tick.close_side(position.direction);
    let raw = match position.direction {
        Direction::Buy => market - meta.trail_distance(),
        Direction::Sell => market + meta.trail_distance(),
    };
    Price::new(raw).ok()
}

pub struct TrailingStopEngine {
    gateway: Arc<dyn ExecutionGateway>,
    registry: Arc<PositionRegistry>,
    audit: AuditHandle,
    retry: RetryPolicy,
    /// Profit that arms the trail, in account currency
    activation_threshold: f64,
}

impl TrailingStopEngine {
    pub fn new(
        gateway: Arc<dyn ExecutionGateway>,
        registry: Arc<PositionRegistry>,
        audit: AuditHandle,
        activation_threshold: f64,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            gateway,
            registry,
            audit,
            retry,
            activation_threshold,
        }
    }

    /// Arm and ratchet the trailing stop for one position.
    ///
    /// # Returns
    /// The applied stop-loss, or None when no update was due
    pub async fn try_trail(&self, position: &Position, tick: &Tick) -> GatewayResult<Option<Price>> {
        let armed = self.registry.with_state(position.ticket, |state| {
            if !state.trailing_armed && position.profit.value() >= self.activation_threshold {
                state.trailing_armed = true;
                debug!(
                    "trailing armed for ticket {} at {}",
                    position.ticket, position.profit
                );
            }
            state.trailing_armed
        });
        if !armed {
            return Ok(None);
        }

        let meta = InstrumentMeta::for_symbol(&position.symbol);
        let Some(candidate) = trail_candidate(position, tick, &meta) else {
            return Ok(None);
        };

        if !position.sl_improves_by(candidate, meta.trail_step()) {
            // inside the hysteresis band, or a regression: discard silently
            return Ok(None);
        }

        retry::with_retry(&self.retry, "modify_stop", || {
            self.gateway
                .modify_stop(position.ticket, candidate, position.current_tp)
        })
        .await?;

        info!(
            "trailing stop on {} ticket {} ratcheted to {:.5}",
            position.symbol,
            position.ticket,
            candidate.value()
        );
        self.audit.record(AuditEvent::TrailingUpdate {
            ticket: position.ticket,
            symbol: position.symbol.clone(),
            new_sl: candidate.value(),
        });

        Ok(Some(candidate))
    }
}
