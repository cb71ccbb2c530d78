//! Entry service
//!
//! Periodic opportunity scan: for each configured symbol without an open
//! position, consult the news gate and the signal oracle, size the volume
//! from account equity, and place the order. At most one new position per
//! scan cycle; the scan interval is randomized between a configured min and
//! max so requests do not land on a fixed cadence.

use crate::application::supervisor::Supervisor;
use crate::audit::{AuditEvent, AuditHandle};
use crate::domain::entities::position::Ticket;
use crate::domain::repositories::execution_gateway::{
    ExecutionGateway, GatewayResult, OrderRequest,
};
use crate::domain::repositories::news_gate::NewsGate;
use crate::domain::repositories::signal_oracle::{MarketSnapshot, SignalOracle};
use crate::domain::services::position_sizer::PositionSizer;
use crate::retry::{self, RetryPolicy};
use rand::Rng;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct EntryConfig {
    pub symbols: Vec<String>,
    pub min_confidence: f64,
    pub recheck_min: Duration,
    pub recheck_max: Duration,
}

pub struct EntryService {
    gateway: Arc<dyn ExecutionGateway>,
    oracle: Arc<dyn SignalOracle>,
    news: Arc<dyn NewsGate>,
    sizer: PositionSizer,
    supervisor: Supervisor,
    audit: AuditHandle,
    retry: RetryPolicy,
    config: EntryConfig,
}

impl EntryService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        gateway: Arc<dyn ExecutionGateway>,
        oracle: Arc<dyn SignalOracle>,
        news: Arc<dyn NewsGate>,
        sizer: PositionSizer,
        supervisor: Supervisor,
        audit: AuditHandle,
        retry: RetryPolicy,
        config: EntryConfig,
    ) -> Self {
        Self {
            gateway,
            oracle,
            news,
            sizer,
            supervisor,
            audit,
            retry,
            config,
        }
    }

    /// One opportunity scan over every configured symbol.
    ///
    /// # Returns
    /// The ticket of the newly opened position, if any
    pub async fn scan_once(&self) -> Option<Ticket> {
        let positions = match self.gateway.list_open_positions().await {
            Ok(positions) => positions,
            Err(e) => {
                warn!("opportunity scan skipped, position query failed: {}", e);
                return None;
            }
        };

        // positions that predate this process (restart) still get monitored
        for position in &positions {
            self.supervisor.start(&position.symbol);
        }

        let open_symbols: HashSet<&str> = positions.iter().map(|p| p.symbol.as_str()).collect();
        for symbol in &self.config.symbols {
            if open_symbols.contains(symbol.as_str()) {
                continue;
            }
            match self.try_open(symbol).await {
                // one new position per scan cycle
                Ok(Some(ticket)) => return Some(ticket),
                Ok(None) => {}
                Err(e) => warn!("entry attempt failed for {}: {}", symbol, e),
            }
        }
        None
    }

    async fn try_open(&self, symbol: &str) -> GatewayResult<Option<Ticket>> {
        let (blocked, reason) = self.news.is_blocked(symbol).await;
        if blocked {
            info!("entries blocked for {}: {}", symbol, reason);
            return Ok(None);
        }

        let tick = self.gateway.get_tick(symbol).await?;
        let snapshot = MarketSnapshot::from_tick(symbol, &tick);
        let signal = self.oracle.get_signal(symbol, &snapshot).await;

        if !signal.is_actionable(self.config.min_confidence) {
            debug!(
                "no entry for {}: {} at confidence {:.1}",
                symbol, signal.action, signal.confidence
            );
            return Ok(None);
        }
        let Some(direction) = signal.action.direction() else {
            return Ok(None);
        };
        let (Some(stop), Some(target)) = (signal.stop, signal.target) else {
            warn!("signal for {} is missing protective prices, skipped", symbol);
            return Ok(None);
        };

        let equity = self.gateway.account_equity().await?;
        let volume = match self.sizer.size(equity) {
            Ok(volume) => volume,
            Err(e) => {
                warn!("lot sizing failed for {}: {}", symbol, e);
                return Ok(None);
            }
        };

        let request = OrderRequest {
            symbol: symbol.to_string(),
            direction,
            volume,
            sl: Some(stop),
            tp: Some(target),
        };
        let ticket =
            retry::with_retry(&self.retry, "place_order", || self.gateway.place_order(&request))
                .await?;

        info!(
            "opened {} {} ticket {} ({} lots, confidence {:.1})",
            direction,
            symbol,
            ticket,
            volume.value(),
            signal.confidence
        );
        self.audit.record(AuditEvent::PositionOpened {
            ticket,
            symbol: symbol.to_string(),
            direction: direction.to_string(),
            volume: volume.value(),
            sl: Some(stop.value()),
            tp: Some(target.value()),
            confidence: signal.confidence,
        });
        self.supervisor.start(symbol);

        Ok(Some(ticket))
    }

    /// Scan loop with randomized pacing, stopped cooperatively
    pub async fn run(self: Arc<Self>, mut stop: watch::Receiver<bool>) {
        info!(
            "entry scanning started ({:?}-{:?} between scans)",
            self.config.recheck_min, self.config.recheck_max
        );
        loop {
            self.scan_once().await;

            let min = self.config.recheck_min.as_secs();
            let max = self.config.recheck_max.as_secs().max(min);
            let wait_secs = {
                let mut rng = rand::thread_rng();
                rng.gen_range(min..=max)
            };
            debug!("next opportunity scan in {}s", wait_secs);

            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs(wait_secs)) => {}
                changed = stop.changed() => {
                    if changed.is_err() || *stop.borrow() {
                        break;
                    }
                }
            }
        }
        info!("entry scanning stopped");
    }
}
