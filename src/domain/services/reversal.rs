//! Reversal monitor
//!
//! Force-closes a position when a confident signal contradicts its direction.
//! This component never touches stop or take-profit levels; protective stops
//! belong exclusively to the breakeven/ladder/trailing components so two
//! writers can never fight over the same field.

use crate::audit::{AuditEvent, AuditHandle};
use crate::domain::entities::position::{Position, Ticket};
use crate::domain::entities::signal::Signal;
use crate::domain::repositories::execution_gateway::{ExecutionGateway, GatewayResult};
use crate::domain::services::position_registry::PositionRegistry;
use crate::retry::{self, RetryPolicy};
use std::sync::Arc;
use tracing::{debug, warn};

pub struct ReversalMonitor {
    gateway: Arc<dyn ExecutionGateway>,
    registry: Arc<PositionRegistry>,
    audit: AuditHandle,
    retry: RetryPolicy,
    /// Minimum confidence (0-100) required to act on a reversal
    min_confidence: f64,
}

impl ReversalMonitor {
    pub fn new(
        gateway: Arc<dyn ExecutionGateway>,
        registry: Arc<PositionRegistry>,
        audit: AuditHandle,
        min_confidence: f64,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            gateway,
            registry,
            audit,
            retry,
            min_confidence,
        }
    }

    /// Close the position if the signal reverses it with enough confidence.
    ///
    /// # Returns
    /// The closed ticket, or None when the position was left untouched
    pub async fn check_reversal(
        &self,
        position: &Position,
        signal: &Signal,
    ) -> GatewayResult<Option<Ticket>> {
        let Some(signal_direction) = signal.action.direction() else {
            debug!(
                "no directional signal for {}, holding position {}",
                position.symbol, position.ticket
            );
            return Ok(None);
        };

        if signal.confidence < self.min_confidence {
            debug!(
                "low confidence ({:.1} < {:.1}) on {}, holding position {}",
                signal.confidence, self.min_confidence, position.symbol, position.ticket
            );
            return Ok(None);
        }

        if !position.direction.opposes(signal_direction) {
            debug!(
                "signal agrees with {} {} position, no action",
                position.symbol, position.direction
            );
            return Ok(None);
        }

        warn!(
            "signal reversal on {}: {} -> {} (confidence {:.1}), closing ticket {}",
            position.symbol, position.direction, signal.action, signal.confidence, position.ticket
        );

        retry::with_retry(&self.retry, "close_position", || {
            self.gateway.close_position(position.ticket)
        })
        .await?;

        self.registry.remove(position.ticket);
        self.audit.record(AuditEvent::ReversalClose {
            ticket: position.ticket,
            symbol: position.symbol.clone(),
            confidence: signal.confidence,
        });

        Ok(Some(position.ticket))
    }
}
