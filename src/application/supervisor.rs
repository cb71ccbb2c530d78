//! Supervisor
//!
//! Owns the monitoring loops. Each actively-monitored symbol gets an
//! independent pair of tokio tasks: a fast profit/protection loop running the
//! ladder, breakeven elevator, and trailing engine, and a slower reversal
//! loop consulting the signal oracle. Loops stop cooperatively through a
//! watch channel; `stop_all` joins with a bounded timeout and proceeds past
//! stragglers. A failing gateway or oracle call costs one tick, never the
//! loop.

use crate::audit::{AuditEvent, AuditHandle};
use crate::domain::entities::position::{Position, Ticket};
use crate::domain::repositories::execution_gateway::{ExecutionGateway, GatewayResult, Tick};
use crate::domain::repositories::signal_oracle::{MarketSnapshot, SignalOracle};
use crate::domain::services::breakeven::BreakevenElevator;
use crate::domain::services::position_registry::PositionRegistry;
use crate::domain::services::reversal::ReversalMonitor;
use crate::domain::services::risk_ladder::LadderEngine;
use crate::domain::services::trailing::TrailingStopEngine;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    pub profit_interval: Duration,
    pub reversal_interval: Duration,
    /// Upper bound on waiting for a loop to finish during shutdown
    pub join_timeout: Duration,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            profit_interval: Duration::from_secs(1),
            reversal_interval: Duration::from_secs(30),
            join_timeout: Duration::from_secs(5),
        }
    }
}

struct SymbolWorker {
    stop: watch::Sender<bool>,
    handles: Vec<JoinHandle<()>>,
}

#[derive(Clone)]
pub struct Supervisor {
    inner: Arc<Inner>,
}

struct Inner {
    gateway: Arc<dyn ExecutionGateway>,
    oracle: Arc<dyn SignalOracle>,
    registry: Arc<PositionRegistry>,
    breakeven: Arc<BreakevenElevator>,
    ladder: Arc<LadderEngine>,
    trailing: Arc<TrailingStopEngine>,
    reversal: Arc<ReversalMonitor>,
    audit: AuditHandle,
    config: SupervisorConfig,
    workers: Mutex<HashMap<String, SymbolWorker>>,
}

impl Supervisor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        gateway: Arc<dyn ExecutionGateway>,
        oracle: Arc<dyn SignalOracle>,
        registry: Arc<PositionRegistry>,
        breakeven: Arc<BreakevenElevator>,
        ladder: Arc<LadderEngine>,
        trailing: Arc<TrailingStopEngine>,
        reversal: Arc<ReversalMonitor>,
        audit: AuditHandle,
        config: SupervisorConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                gateway,
                oracle,
                registry,
                breakeven,
                ladder,
                trailing,
                reversal,
                audit,
                config,
                workers: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Start the monitoring loop pair for a symbol. Idempotent: a symbol
    /// already being monitored keeps its existing loops.
    ///
    /// # Returns
    /// true when new loops were spawned
    pub fn start(&self, symbol: &str) -> bool {
        let mut workers = self
            .inner
            .workers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if workers.contains_key(symbol) {
            return false;
        }

        let (stop_tx, stop_rx) = watch::channel(false);
        let profit = tokio::spawn(Inner::profit_loop(
            self.inner.clone(),
            symbol.to_string(),
            stop_rx.clone(),
        ));
        let reversal = tokio::spawn(Inner::reversal_loop(
            self.inner.clone(),
            symbol.to_string(),
            stop_rx,
        ));

        workers.insert(
            symbol.to_string(),
            SymbolWorker {
                stop: stop_tx,
                handles: vec![profit, reversal],
            },
        );
        info!("monitoring started for {}", symbol);
        true
    }

    /// Stop the monitoring loops for one symbol.
    ///
    /// # Returns
    /// true when the symbol was being monitored
    pub async fn stop(&self, symbol: &str) -> bool {
        let worker = {
            let mut workers = self
                .inner
                .workers
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            workers.remove(symbol)
        };
        match worker {
            Some(worker) => {
                self.inner.join_worker(symbol, worker).await;
                info!("monitoring stopped for {}", symbol);
                true
            }
            None => false,
        }
    }

    /// Signal every loop to stop and wait up to the join timeout for each,
    /// proceeding with shutdown regardless of stragglers.
    pub async fn stop_all(&self) {
        let workers: Vec<(String, SymbolWorker)> = {
            let mut workers = self
                .inner
                .workers
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            workers.drain().collect()
        };

        for (_, worker) in &workers {
            let _ = worker.stop.send(true);
        }
        for (symbol, worker) in workers {
            self.inner.join_worker(&symbol, worker).await;
        }
        info!("all monitoring loops stopped");
    }

    pub fn is_monitoring(&self, symbol: &str) -> bool {
        self.inner
            .workers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(symbol)
    }

    pub fn monitored_symbols(&self) -> Vec<String> {
        self.inner
            .workers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }
}

impl Inner {
    async fn join_worker(&self, symbol: &str, worker: SymbolWorker) {
        let _ = worker.stop.send(true);
        for handle in worker.handles {
            match tokio::time::timeout(self.config.join_timeout, handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!("monitoring loop for {} panicked: {}", symbol, e),
                Err(_) => warn!(
                    "monitoring loop for {} did not stop within {:?}",
                    symbol, self.config.join_timeout
                ),
            }
        }
    }

    async fn profit_loop(self: Arc<Self>, symbol: String, mut stop: watch::Receiver<bool>) {
        info!(
            "profit monitoring started for {} ({:?} interval)",
            symbol, self.config.profit_interval
        );
        let mut interval = tokio::time::interval(self.config.profit_interval);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.profit_tick(&symbol).await {
                        warn!("profit tick failed for {}: {}", symbol, e);
                        self.audit.record(AuditEvent::TickError {
                            symbol: symbol.clone(),
                            detail: e.to_string(),
                        });
                    }
                }
                changed = stop.changed() => {
                    if changed.is_err() || *stop.borrow() {
                        break;
                    }
                }
            }
        }
        info!("profit monitoring stopped for {}", symbol);
    }

    async fn reversal_loop(self: Arc<Self>, symbol: String, mut stop: watch::Receiver<bool>) {
        info!(
            "reversal monitoring started for {} ({:?} interval)",
            symbol, self.config.reversal_interval
        );
        let mut interval = tokio::time::interval(self.config.reversal_interval);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.reversal_tick(&symbol).await {
                        warn!("reversal tick failed for {}: {}", symbol, e);
                        self.audit.record(AuditEvent::TickError {
                            symbol: symbol.clone(),
                            detail: e.to_string(),
                        });
                    }
                }
                changed = stop.changed() => {
                    if changed.is_err() || *stop.borrow() {
                        break;
                    }
                }
            }
        }
        info!("reversal monitoring stopped for {}", symbol);
    }

    /// One pass of the fast loop: prune closed tickets, then run the ladder,
    /// breakeven elevator, and trailing engine over this symbol's positions.
    async fn profit_tick(&self, symbol: &str) -> GatewayResult<()> {
        let positions = self.gateway.list_open_positions().await?;
        let open_tickets: Vec<Ticket> = positions.iter().map(|p| p.ticket).collect();
        self.registry.retain_open(&open_tickets);

        let mine: Vec<&Position> = positions.iter().filter(|p| p.symbol == symbol).collect();
        if mine.is_empty() {
            return Ok(());
        }

        let tick = self.gateway.get_tick(symbol).await?;
        for position in mine {
            if let Err(e) = self.protect_position(position, &tick).await {
                // local to this ticket: the others still get their turn
                warn!(
                    "protection skipped this tick for ticket {} on {}: {}",
                    position.ticket, symbol, e
                );
                self.audit.record(AuditEvent::TickError {
                    symbol: symbol.to_string(),
                    detail: e.to_string(),
                });
            }
        }
        Ok(())
    }

    async fn protect_position(&self, position: &Position, tick: &Tick) -> GatewayResult<()> {
        // ladder first: an applied ladder stop already sits at or past entry
        // and marks breakeven reached, so the elevator skips a second modify
        self.ladder.advance(position, tick).await?;
        self.breakeven.try_elevate(position).await?;
        self.trailing.try_trail(position, tick).await?;
        Ok(())
    }

    /// One pass of the slow loop: ask the oracle about every open position
    /// on this symbol and close on confident reversals.
    async fn reversal_tick(&self, symbol: &str) -> GatewayResult<()> {
        let positions = self.gateway.list_open_positions().await?;
        let mine: Vec<&Position> = positions.iter().filter(|p| p.symbol == symbol).collect();
        if mine.is_empty() {
            return Ok(());
        }

        let tick = self.gateway.get_tick(symbol).await?;
        let snapshot = MarketSnapshot::from_tick(symbol, &tick);
        let signal = self.oracle.get_signal(symbol, &snapshot).await;

        for position in mine {
            if let Err(e) = self.reversal.check_reversal(position, &signal).await {
                warn!(
                    "reversal check skipped this tick for ticket {} on {}: {}",
                    position.ticket, symbol, e
                );
                self.audit.record(AuditEvent::TickError {
                    symbol: symbol.to_string(),
                    detail: e.to_string(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::signal::Signal;
    use crate::domain::repositories::execution_gateway::{GatewayError, OrderRequest};
    use crate::domain::value_objects::price::Price;
    use crate::retry::RetryPolicy;
    use async_trait::async_trait;

    struct IdleGateway;

    #[async_trait]
    impl ExecutionGateway for IdleGateway {
        fn name(&self) -> &str {
            "idle"
        }

        async fn list_open_positions(&self) -> GatewayResult<Vec<Position>> {
            Ok(Vec::new())
        }

        async fn place_order(&self, _request: &OrderRequest) -> GatewayResult<Ticket> {
            Err(GatewayError::OrderRejected("idle".to_string()))
        }

        async fn modify_stop(
            &self,
            _ticket: Ticket,
            _new_sl: Price,
            _new_tp: Option<Price>,
        ) -> GatewayResult<()> {
            Ok(())
        }

        async fn close_position(&self, _ticket: Ticket) -> GatewayResult<()> {
            Ok(())
        }

        async fn get_tick(&self, _symbol: &str) -> GatewayResult<Tick> {
            Ok(Tick {
                bid: 2000.0,
                ask: 2000.3,
            })
        }

        async fn account_equity(&self) -> GatewayResult<f64> {
            Ok(10_000.0)
        }
    }

    struct SilentOracle;

    #[async_trait]
    impl SignalOracle for SilentOracle {
        async fn get_signal(&self, symbol: &str, _snapshot: &MarketSnapshot) -> Signal {
            Signal::no_trade(symbol)
        }
    }

    fn supervisor() -> Supervisor {
        let gateway: Arc<dyn ExecutionGateway> = Arc::new(IdleGateway);
        let oracle: Arc<dyn SignalOracle> = Arc::new(SilentOracle);
        let registry = Arc::new(PositionRegistry::new());
        let audit = AuditHandle::disabled();
        let retry = RetryPolicy {
            attempts: 1,
            pause: Duration::from_millis(1),
        };
        let breakeven = Arc::new(BreakevenElevator::new(
            gateway.clone(),
            registry.clone(),
            audit.clone(),
            50.0,
            retry.clone(),
        ));
        let ladder = Arc::new(LadderEngine::new(
            gateway.clone(),
            registry.clone(),
            audit.clone(),
            20.0,
            retry.clone(),
        ));
        let trailing = Arc::new(TrailingStopEngine::new(
            gateway.clone(),
            registry.clone(),
            audit.clone(),
            60.0,
            retry.clone(),
        ));
        let reversal = Arc::new(ReversalMonitor::new(
            gateway.clone(),
            registry.clone(),
            audit.clone(),
            78.0,
            retry,
        ));
        Supervisor::new(
            gateway,
            oracle,
            registry,
            breakeven,
            ladder,
            trailing,
            reversal,
            audit,
            SupervisorConfig {
                profit_interval: Duration::from_millis(10),
                reversal_interval: Duration::from_millis(20),
                join_timeout: Duration::from_secs(1),
            },
        )
    }

    #[tokio::test]
    async fn test_start_is_idempotent() {
        let supervisor = supervisor();
        assert!(supervisor.start("XAUUSD"));
        assert!(!supervisor.start("XAUUSD"));
        assert!(supervisor.is_monitoring("XAUUSD"));
        assert_eq!(supervisor.monitored_symbols(), vec!["XAUUSD".to_string()]);
        supervisor.stop_all().await;
    }

    #[tokio::test]
    async fn test_symbols_stop_independently() {
        let supervisor = supervisor();
        supervisor.start("XAUUSD");
        supervisor.start("BTCUSD");

        assert!(supervisor.stop("XAUUSD").await);
        assert!(!supervisor.is_monitoring("XAUUSD"));
        assert!(supervisor.is_monitoring("BTCUSD"));

        supervisor.stop_all().await;
        assert!(supervisor.monitored_symbols().is_empty());
    }

    #[tokio::test]
    async fn test_stop_unknown_symbol_is_a_no_op() {
        let supervisor = supervisor();
        assert!(!supervisor.stop("EURUSD").await);
    }

    #[tokio::test]
    async fn test_stop_all_joins_within_the_bound() {
        let supervisor = supervisor();
        supervisor.start("XAUUSD");
        supervisor.start("BTCUSD");
        // a few ticks of actual loop work
        tokio::time::sleep(Duration::from_millis(50)).await;

        let started = std::time::Instant::now();
        supervisor.stop_all().await;
        assert!(started.elapsed() < Duration::from_secs(4));
    }
}
