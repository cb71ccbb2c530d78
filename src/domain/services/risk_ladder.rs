//! Progressive stop-loss ladder
//!
//! Profit is bucketed into fixed milestones. The first milestone moves the
//! stop to breakeven; every later milestone locks in half of the profit above
//! the first one, converted to a price distance through the currently
//! observed profit-per-price-displacement ratio. The computation itself is
//! pure; [`LadderEngine`] applies it edge-triggered, at most once per newly
//! crossed milestone.

use crate::audit::{AuditEvent, AuditHandle};
use crate::domain::entities::position::{Direction, Position};
use crate::domain::repositories::execution_gateway::{ExecutionGateway, GatewayResult, Tick};
use crate::domain::services::position_registry::PositionRegistry;
use crate::domain::value_objects::price::Price;
use crate::retry::{self, RetryPolicy};
use std::sync::Arc;
use tracing::{debug, info};

/// Highest fully crossed profit milestone, or None when the first milestone
/// has not been reached yet.
pub fn milestone(profit: f64, threshold: f64) -> Option<f64> {
    if threshold <= 0.0 || profit < threshold {
        return None;
    }
    Some((profit / threshold).floor() * threshold)
}

/// Candidate stop-loss for the milestone currently crossed by `profit`.
///
/// Returns None below the first milestone, and None when the price has not
/// displaced from entry (the profit/displacement ratio is undefined there).
pub fn ladder_target(
    position: &Position,
    current_price: f64,
    profit: f64,
    threshold: f64,
) -> Option<Price> {
    let level = milestone(profit, threshold)?;
    let entry = position.entry_price.value();

    if level <= threshold {
        // first milestone: stop to breakeven
        return Price::new(entry).ok();
    }

    let locked_profit = (level - threshold) / 2.0;
    let displacement = (current_price - entry).abs();
    if displacement <= 0.0 {
        return None;
    }
    let profit_per_point = profit / displacement;
    if profit_per_point <= 0.0 {
        return None;
    }
    let points_to_lock = locked_profit / profit_per_point;

    let raw = match position.direction {
        Direction::Buy => entry + points_to_lock,
        Direction::Sell => entry - points_to_lock,
    };
    Price::new(raw).ok()
}

/// Applies the ladder to live positions, once per newly crossed milestone
pub struct LadderEngine {
    gateway: Arc<dyn ExecutionGateway>,
    registry: Arc<PositionRegistry>,
    audit: AuditHandle,
    retry: RetryPolicy,
    /// Profit milestone increment in account currency
    profit_threshold: f64,
}

impl LadderEngine {
    pub fn new(
        gateway: Arc<dyn ExecutionGateway>,
        registry: Arc<PositionRegistry>,
        audit: AuditHandle,
        profit_threshold: f64,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            gateway,
            registry,
            audit,
            retry,
            profit_threshold,
        }
    }

    /// Advance the ladder for one position if a new milestone was crossed.
    ///
    /// # Returns
    /// The applied stop-loss, or None when nothing changed
    pub async fn advance(&self, position: &Position, tick: &Tick) -> GatewayResult<Option<Price>> {
        let profit = position.profit.value();
        let Some(level) = milestone(profit, self.profit_threshold) else {
            return Ok(None);
        };

        let crossed = self
            .registry
            .with_state(position.ticket, |state| level > state.last_protected_level);
        if !crossed {
            return Ok(None);
        }

        let market = tick.close_side(position.direction);
        let Some(target) = ladder_target(position, market, profit, self.profit_threshold) else {
            return Ok(None);
        };

        if !position.sl_improves(target) {
            debug!(
                "ladder candidate {:.5} for ticket {} does not improve current stop, discarded",
                target.value(),
                position.ticket
            );
            return Ok(None);
        }

        retry::with_retry(&self.retry, "modify_stop", || {
            self.gateway
                .modify_stop(position.ticket, target, position.current_tp)
        })
        .await?;

        self.registry.with_state(position.ticket, |state| {
            state.raise_protected_level(level);
            // a ladder stop always sits at or past entry
            state.breakeven_reached = true;
        });

        info!(
            "profit milestone {:.0} reached on {} ticket {}: stop moved to {:.5}",
            level,
            position.symbol,
            position.ticket,
            target.value()
        );
        self.audit.record(AuditEvent::LadderAdvance {
            ticket: position.ticket,
            symbol: position.symbol.clone(),
            level,
            new_sl: target.value(),
        });

        Ok(Some(target))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::position::Ticket;
    use crate::domain::repositories::execution_gateway::{GatewayError, OrderRequest};
    use crate::domain::value_objects::{profit::Profit, volume::Volume};
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::Mutex;
    use std::time::Duration;

    struct StubGateway {
        modify_calls: Mutex<Vec<(Ticket, f64)>>,
    }

    impl StubGateway {
        fn new() -> Self {
            Self {
                modify_calls: Mutex::new(Vec::new()),
            }
        }

        fn modify_count(&self) -> usize {
            self.modify_calls.lock().unwrap().len()
        }

        fn last_sl(&self) -> Option<f64> {
            self.modify_calls.lock().unwrap().last().map(|(_, sl)| *sl)
        }
    }

    #[async_trait]
    impl ExecutionGateway for StubGateway {
        fn name(&self) -> &str {
            "stub"
        }

        async fn list_open_positions(&self) -> GatewayResult<Vec<Position>> {
            Ok(Vec::new())
        }

        async fn place_order(&self, _request: &OrderRequest) -> GatewayResult<Ticket> {
            Err(GatewayError::OrderRejected("stub".to_string()))
        }

        async fn modify_stop(
            &self,
            ticket: Ticket,
            new_sl: Price,
            _new_tp: Option<Price>,
        ) -> GatewayResult<()> {
            self.modify_calls.lock().unwrap().push((ticket, new_sl.value()));
            Ok(())
        }

        async fn close_position(&self, _ticket: Ticket) -> GatewayResult<()> {
            Ok(())
        }

        async fn get_tick(&self, symbol: &str) -> GatewayResult<Tick> {
            Err(GatewayError::QuoteUnavailable(symbol.to_string()))
        }

        async fn account_equity(&self) -> GatewayResult<f64> {
            Ok(10_000.0)
        }
    }

    fn buy_position(profit: f64) -> Position {
        Position {
            ticket: 1001,
            symbol: "XAUUSD".to_string(),
            direction: Direction::Buy,
            entry_price: Price::new(2000.0).unwrap(),
            volume: Volume::new(1.0).unwrap(),
            current_sl: None,
            current_tp: None,
            profit: Profit::new(profit).unwrap(),
            opened_at: Utc::now(),
        }
    }

    fn engine(gateway: Arc<StubGateway>, registry: Arc<PositionRegistry>) -> LadderEngine {
        LadderEngine::new(
            gateway,
            registry,
            AuditHandle::disabled(),
            20.0,
            RetryPolicy {
                attempts: 1,
                pause: Duration::from_millis(1),
            },
        )
    }

    #[test]
    fn test_milestone_buckets() {
        assert_eq!(milestone(19.99, 20.0), None);
        assert_eq!(milestone(20.0, 20.0), Some(20.0));
        assert_eq!(milestone(39.0, 20.0), Some(20.0));
        assert_eq!(milestone(45.0, 20.0), Some(40.0));
        assert_eq!(milestone(-5.0, 20.0), None);
        assert_eq!(milestone(100.0, 0.0), None);
    }

    #[test]
    fn test_first_milestone_targets_breakeven() {
        let position = buy_position(25.0);
        let target = ladder_target(&position, 2000.5, 25.0, 20.0).unwrap();
        assert_eq!(target.value(), 2000.0);
    }

    #[test]
    fn test_later_milestones_lock_half_the_excess() {
        // level 40: lock (40 - 20) / 2 = 10. With profit 45 over a 0.9
        // displacement the ratio is 50 per price unit, so 0.2 is locked.
        let position = buy_position(45.0);
        let target = ladder_target(&position, 2000.9, 45.0, 20.0).unwrap();
        assert!((target.value() - 2000.2).abs() < 1e-9);
    }

    #[test]
    fn test_sell_targets_mirror() {
        let mut position = buy_position(45.0);
        position.direction = Direction::Sell;
        let target = ladder_target(&position, 1999.1, 45.0, 20.0).unwrap();
        assert!((target.value() - 1999.8).abs() < 1e-9);
    }

    #[test]
    fn test_zero_displacement_yields_no_target() {
        let position = buy_position(45.0);
        assert!(ladder_target(&position, 2000.0, 45.0, 20.0).is_none());
    }

    #[test]
    fn test_below_first_milestone_yields_no_target() {
        let position = buy_position(10.0);
        assert!(ladder_target(&position, 2000.3, 10.0, 20.0).is_none());
    }

    #[tokio::test]
    async fn test_advance_is_edge_triggered() {
        let gateway = Arc::new(StubGateway::new());
        let registry = Arc::new(PositionRegistry::new());
        let engine = engine(gateway.clone(), registry.clone());
        let position = buy_position(25.0);
        let tick = Tick {
            bid: 2000.5,
            ask: 2000.8,
        };

        let applied = engine.advance(&position, &tick).await.unwrap();
        assert_eq!(applied.unwrap().value(), 2000.0);
        assert_eq!(gateway.modify_count(), 1);

        // same profit, milestone unchanged: no further gateway call
        let applied = engine.advance(&position, &tick).await.unwrap();
        assert!(applied.is_none());
        assert_eq!(gateway.modify_count(), 1);

        let state = registry.snapshot(1001).unwrap();
        assert_eq!(state.last_protected_level, 20.0);
        assert!(state.breakeven_reached);
    }

    #[tokio::test]
    async fn test_advance_acts_again_on_next_milestone() {
        let gateway = Arc::new(StubGateway::new());
        let registry = Arc::new(PositionRegistry::new());
        let engine = engine(gateway.clone(), registry.clone());
        let tick = Tick {
            bid: 2000.9,
            ask: 2001.2,
        };

        let first = buy_position(25.0);
        engine.advance(&first, &tick).await.unwrap();

        let mut second = buy_position(45.0);
        second.current_sl = Some(Price::new(2000.0).unwrap());
        let applied = engine.advance(&second, &tick).await.unwrap();
        assert!((applied.unwrap().value() - 2000.2).abs() < 1e-9);
        assert_eq!(gateway.modify_count(), 2);
        assert_eq!(registry.snapshot(1001).unwrap().last_protected_level, 40.0);
    }

    #[tokio::test]
    async fn test_unfavorable_candidate_is_discarded() {
        let gateway = Arc::new(StubGateway::new());
        let registry = Arc::new(PositionRegistry::new());
        let engine = engine(gateway.clone(), registry.clone());
        let tick = Tick {
            bid: 2000.9,
            ask: 2001.2,
        };

        // stop already above the level-40 candidate of 2000.2
        let mut position = buy_position(45.0);
        position.current_sl = Some(Price::new(2000.5).unwrap());
        let applied = engine.advance(&position, &tick).await.unwrap();
        assert!(applied.is_none());
        assert_eq!(gateway.modify_count(), 0);
        // the discarded milestone stays unrecorded so a better candidate may
        // still be applied for it later
        assert_eq!(registry.snapshot(1001).unwrap().last_protected_level, 0.0);
    }
}
