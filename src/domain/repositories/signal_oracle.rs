//! Signal Oracle Trait
//!
//! The oracle produces trading signals from a market snapshot. Any internal
//! failure (transport, parsing) must degrade to a `NoTrade, confidence 0`
//! signal; position protection never depends on the oracle being healthy.

use crate::domain::entities::signal::Signal;
use crate::domain::repositories::execution_gateway::Tick;
use async_trait::async_trait;

/// Market context handed to the oracle for one evaluation
#[derive(Debug, Clone)]
pub struct MarketSnapshot {
    pub symbol: String,
    pub bid: f64,
    pub ask: f64,
}

impl MarketSnapshot {
    pub fn from_tick(symbol: &str, tick: &Tick) -> MarketSnapshot {
        MarketSnapshot {
            symbol: symbol.to_string(),
            bid: tick.bid,
            ask: tick.ask,
        }
    }

    pub fn mid(&self) -> f64 {
        (self.bid + self.ask) / 2.0
    }
}

#[async_trait]
pub trait SignalOracle: Send + Sync {
    /// Evaluate the market for `symbol`. Never fails; degraded results carry
    /// `NoTrade` with zero confidence.
    async fn get_signal(&self, symbol: &str, snapshot: &MarketSnapshot) -> Signal;
}
