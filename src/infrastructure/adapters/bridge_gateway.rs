//! HTTP bridge gateway
//!
//! ExecutionGateway implementation against the broker-terminal HTTP bridge.
//! The bridge exposes positions, quotes, and order endpoints; this adapter
//! maps its wire types onto the domain model and its transport failures onto
//! GatewayError. A stop or take-profit reported as 0 means unset.

use crate::domain::entities::position::{Direction, Position, Ticket};
use crate::domain::repositories::execution_gateway::{
    ExecutionGateway, GatewayError, GatewayResult, OrderRequest, Tick,
};
use crate::domain::value_objects::{price::Price, profit::Profit, volume::Volume};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;

pub struct BridgeGateway {
    client: reqwest::Client,
    base_url: String,
}

impl BridgeGateway {
    pub fn new(base_url: String, timeout: Duration) -> GatewayResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Transport(format!("client setup failed: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

fn request_error(context: &str, error: reqwest::Error) -> GatewayError {
    if error.is_timeout() {
        GatewayError::Timeout(format!("{}: {}", context, error))
    } else {
        GatewayError::Transport(format!("{}: {}", context, error))
    }
}

async fn rejection_body(response: reqwest::Response) -> String {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    format!("{} {}", status, body.trim())
}

#[derive(Debug, Deserialize)]
struct PositionDto {
    ticket: u64,
    symbol: String,
    direction: String,
    entry_price: f64,
    volume: f64,
    #[serde(default)]
    sl: f64,
    #[serde(default)]
    tp: f64,
    profit: f64,
    #[serde(default)]
    opened_at: Option<DateTime<Utc>>,
}

impl PositionDto {
    fn into_position(self) -> Option<Position> {
        let direction = match self.direction.to_uppercase().as_str() {
            "BUY" => Direction::Buy,
            "SELL" => Direction::Sell,
            _ => return None,
        };
        Some(Position {
            ticket: self.ticket,
            symbol: self.symbol,
            direction,
            entry_price: Price::new(self.entry_price).ok()?,
            volume: Volume::new(self.volume).ok()?,
            current_sl: (self.sl > 0.0).then(|| Price::new(self.sl).ok()).flatten(),
            current_tp: (self.tp > 0.0).then(|| Price::new(self.tp).ok()).flatten(),
            profit: Profit::new(self.profit).ok()?,
            opened_at: self.opened_at.unwrap_or_else(Utc::now),
        })
    }
}

#[derive(Debug, Serialize)]
struct OrderDto<'a> {
    symbol: &'a str,
    direction: String,
    volume: f64,
    sl: Option<f64>,
    tp: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct OrderAck {
    ticket: u64,
}

#[derive(Debug, Serialize)]
struct StopsDto {
    sl: f64,
    tp: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct TickDto {
    bid: f64,
    ask: f64,
}

#[derive(Debug, Deserialize)]
struct AccountDto {
    equity: f64,
}

#[async_trait]
impl ExecutionGateway for BridgeGateway {
    fn name(&self) -> &str {
        "bridge"
    }

    async fn list_open_positions(&self) -> GatewayResult<Vec<Position>> {
        let response = self
            .client
            .get(self.url("/positions"))
            .send()
            .await
            .map_err(|e| request_error("list positions", e))?;
        if !response.status().is_success() {
            return Err(GatewayError::PositionQueryFailed(
                rejection_body(response).await,
            ));
        }
        let rows: Vec<PositionDto> = response
            .json()
            .await
            .map_err(|e| GatewayError::PositionQueryFailed(e.to_string()))?;

        let mut positions = Vec::with_capacity(rows.len());
        for row in rows {
            let ticket = row.ticket;
            match row.into_position() {
                Some(position) => positions.push(position),
                None => warn!("bridge returned unusable position row, ticket {}", ticket),
            }
        }
        Ok(positions)
    }

    async fn place_order(&self, request: &OrderRequest) -> GatewayResult<Ticket> {
        let body = OrderDto {
            symbol: &request.symbol,
            direction: request.direction.to_string(),
            volume: request.volume.value(),
            sl: request.sl.map(|p| p.value()),
            tp: request.tp.map(|p| p.value()),
        };
        let response = self
            .client
            .post(self.url("/orders"))
            .json(&body)
            .send()
            .await
            .map_err(|e| request_error("place order", e))?;
        if !response.status().is_success() {
            return Err(GatewayError::OrderRejected(rejection_body(response).await));
        }
        let ack: OrderAck = response
            .json()
            .await
            .map_err(|e| GatewayError::OrderRejected(e.to_string()))?;
        Ok(ack.ticket)
    }

    async fn modify_stop(
        &self,
        ticket: Ticket,
        new_sl: Price,
        new_tp: Option<Price>,
    ) -> GatewayResult<()> {
        let body = StopsDto {
            sl: new_sl.value(),
            tp: new_tp.map(|p| p.value()),
        };
        let response = self
            .client
            .post(self.url(&format!("/positions/{}/stops", ticket)))
            .json(&body)
            .send()
            .await
            .map_err(|e| request_error("modify stop", e))?;
        if !response.status().is_success() {
            return Err(GatewayError::ModifyRejected {
                ticket,
                reason: rejection_body(response).await,
            });
        }
        Ok(())
    }

    async fn close_position(&self, ticket: Ticket) -> GatewayResult<()> {
        let response = self
            .client
            .post(self.url(&format!("/positions/{}/close", ticket)))
            .send()
            .await
            .map_err(|e| request_error("close position", e))?;
        if !response.status().is_success() {
            return Err(GatewayError::CloseRejected {
                ticket,
                reason: rejection_body(response).await,
            });
        }
        Ok(())
    }

    async fn get_tick(&self, symbol: &str) -> GatewayResult<Tick> {
        let response = self
            .client
            .get(self.url(&format!("/ticks/{}", symbol)))
            .send()
            .await
            .map_err(|e| request_error("get tick", e))?;
        if !response.status().is_success() {
            return Err(GatewayError::QuoteUnavailable(
                rejection_body(response).await,
            ));
        }
        let tick: TickDto = response
            .json()
            .await
            .map_err(|e| GatewayError::QuoteUnavailable(e.to_string()))?;
        Ok(Tick {
            bid: tick.bid,
            ask: tick.ask,
        })
    }

    async fn account_equity(&self) -> GatewayResult<f64> {
        let response = self
            .client
            .get(self.url("/account"))
            .send()
            .await
            .map_err(|e| request_error("account equity", e))?;
        if !response.status().is_success() {
            return Err(GatewayError::AccountQueryFailed(
                rejection_body(response).await,
            ));
        }
        let account: AccountDto = response
            .json()
            .await
            .map_err(|e| GatewayError::AccountQueryFailed(e.to_string()))?;
        Ok(account.equity)
    }
}
