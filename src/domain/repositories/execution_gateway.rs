//! Execution Gateway Trait
//!
//! Common interface to the broker that owns the positions. The core only ever
//! reads position snapshots and requests mutations through this trait, which
//! keeps the protection logic independent of the concrete broker transport
//! and makes it easy to mock in tests.

use crate::domain::entities::position::{Direction, Position, Ticket};
use crate::domain::value_objects::{price::Price, volume::Volume};
use async_trait::async_trait;
use thiserror::Error;

pub type GatewayResult<T> = Result<T, GatewayError>;

/// Errors that can occur during gateway operations
#[derive(Debug, Clone, Error, PartialEq)]
pub enum GatewayError {
    #[error("order placement failed: {0}")]
    OrderRejected(String),
    #[error("stop modification failed for ticket {ticket}: {reason}")]
    ModifyRejected { ticket: Ticket, reason: String },
    #[error("close failed for ticket {ticket}: {reason}")]
    CloseRejected { ticket: Ticket, reason: String },
    #[error("position query failed: {0}")]
    PositionQueryFailed(String),
    #[error("no quote available for {0}")]
    QuoteUnavailable(String),
    #[error("account query failed: {0}")]
    AccountQueryFailed(String),
    #[error("gateway request timed out: {0}")]
    Timeout(String),
    #[error("gateway transport error: {0}")]
    Transport(String),
}

impl GatewayError {
    /// Whether retrying the same request might help
    pub fn is_recoverable(&self) -> bool {
        match self {
            GatewayError::Timeout(_)
            | GatewayError::Transport(_)
            | GatewayError::QuoteUnavailable(_)
            | GatewayError::PositionQueryFailed(_)
            | GatewayError::AccountQueryFailed(_) => true,
            GatewayError::OrderRejected(_)
            | GatewayError::ModifyRejected { .. }
            | GatewayError::CloseRejected { .. } => false,
        }
    }
}

/// Best bid/ask for one symbol
#[derive(Debug, Clone, Copy)]
pub struct Tick {
    pub bid: f64,
    pub ask: f64,
}

impl Tick {
    /// Price at which a new position in `direction` would be opened
    pub fn open_side(&self, direction: Direction) -> f64 {
        match direction {
            Direction::Buy => self.ask,
            Direction::Sell => self.bid,
        }
    }

    /// Price at which an open position in `direction` would be closed; this
    /// is the side protective stops are measured against.
    pub fn close_side(&self, direction: Direction) -> f64 {
        match direction {
            Direction::Buy => self.bid,
            Direction::Sell => self.ask,
        }
    }
}

/// A new market order request
#[derive(Debug, Clone)]
pub struct OrderRequest {
    pub symbol: String,
    pub direction: Direction,
    pub volume: Volume,
    pub sl: Option<Price>,
    pub tp: Option<Price>,
}

/// Gateway trait providing the broker operations the core consumes
#[async_trait]
pub trait ExecutionGateway: Send + Sync {
    /// Name of this gateway, for logging and status reporting
    fn name(&self) -> &str;

    /// Snapshot of every open position on the account
    async fn list_open_positions(&self) -> GatewayResult<Vec<Position>>;

    /// Place a market order
    ///
    /// # Returns
    /// The broker-assigned ticket of the opened position
    async fn place_order(&self, request: &OrderRequest) -> GatewayResult<Ticket>;

    /// Move the stop-loss (and optionally the take-profit) of one position
    async fn modify_stop(
        &self,
        ticket: Ticket,
        new_sl: Price,
        new_tp: Option<Price>,
    ) -> GatewayResult<()>;

    /// Close the full volume of one position
    async fn close_position(&self, ticket: Ticket) -> GatewayResult<()>;

    /// Current best bid/ask for a symbol
    async fn get_tick(&self, symbol: &str) -> GatewayResult<Tick>;

    /// Current account equity in account currency
    async fn account_equity(&self) -> GatewayResult<f64>;
}
