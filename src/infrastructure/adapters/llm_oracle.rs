//! LLM-backed signal oracle
//!
//! Calls a chat-completion endpoint with a compact market prompt and parses
//! the JSON reply into a Signal. Every failure path (transport, empty reply,
//! malformed payload) degrades to a `NoTrade` signal with zero confidence;
//! a raw error never reaches the core.

use crate::domain::entities::signal::{Signal, SignalAction};
use crate::domain::repositories::signal_oracle::{MarketSnapshot, SignalOracle};
use crate::domain::value_objects::price::Price;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum OracleError {
    #[error("oracle request failed: {0}")]
    Transport(String),
    #[error("oracle returned empty content")]
    EmptyResponse,
    #[error("oracle response is malformed: {0}")]
    MalformedResponse(String),
}

pub struct LlmOracle {
    client: reqwest::Client,
    url: String,
    model: String,
    api_key: String,
}

impl LlmOracle {
    pub fn new(
        url: String,
        model: String,
        api_key: String,
        timeout: Duration,
    ) -> Result<Self, OracleError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| OracleError::Transport(format!("client setup failed: {}", e)))?;
        Ok(Self {
            client,
            url,
            model,
            api_key,
        })
    }

    async fn request_signal(
        &self,
        symbol: &str,
        snapshot: &MarketSnapshot,
    ) -> Result<Signal, OracleError> {
        let body = ChatRequest {
            model: &self.model,
            temperature: 0.1,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: "You are a trading AI. Respond with a single JSON object only."
                        .to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: build_prompt(symbol, snapshot),
                },
            ],
        };

        debug!("requesting signal for {}", symbol);
        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| OracleError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(OracleError::Transport(format!("{} {}", status, text.trim())));
        }

        let reply: ChatResponse = response
            .json()
            .await
            .map_err(|e| OracleError::MalformedResponse(e.to_string()))?;
        let content = reply
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or(OracleError::EmptyResponse)?;

        parse_signal(symbol, &content)
    }
}

#[async_trait]
impl SignalOracle for LlmOracle {
    async fn get_signal(&self, symbol: &str, snapshot: &MarketSnapshot) -> Signal {
        match self.request_signal(symbol, snapshot).await {
            Ok(signal) => signal,
            Err(e) => {
                warn!("signal degraded to NO_TRADE for {}: {}", symbol, e);
                Signal::no_trade(symbol)
            }
        }
    }
}

fn build_prompt(symbol: &str, snapshot: &MarketSnapshot) -> String {
    format!(
        "SYMBOL: {}\nBID: {:.5}\nASK: {:.5}\nMID: {:.5}\n\n\
         Analyze and provide a trading signal.\n\n\
         Respond with JSON only:\n\
         {{\"action\": \"BUY\"|\"SELL\"|\"NO_TRADE\", \"confidence\": <0-100>, \
         \"entry\": <price>, \"sl\": <price>, \"tp\": <price>}}",
        symbol,
        snapshot.bid,
        snapshot.ask,
        snapshot.mid()
    )
}

/// Drop a surrounding markdown code fence, if the model added one
fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

fn parse_signal(symbol: &str, content: &str) -> Result<Signal, OracleError> {
    let payload: SignalDto = serde_json::from_str(strip_code_fence(content))
        .map_err(|e| OracleError::MalformedResponse(e.to_string()))?;

    Ok(Signal {
        symbol: symbol.to_string(),
        action: SignalAction::parse(&payload.action),
        confidence: payload.confidence.clamp(0.0, 100.0),
        entry: payload.entry.and_then(|v| Price::new(v).ok()),
        stop: payload.sl.and_then(|v| Price::new(v).ok()),
        target: payload.tp.and_then(|v| Price::new(v).ok()),
    })
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f64,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct SignalDto {
    action: String,
    #[serde(default)]
    confidence: f64,
    #[serde(default)]
    entry: Option<f64>,
    #[serde(default)]
    sl: Option<f64>,
    #[serde(default)]
    tp: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_code_fence() {
        assert_eq!(strip_code_fence("{\"a\":1}"), "{\"a\":1}");
        assert_eq!(strip_code_fence("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fence("```\n{\"a\":1}\n```"), "{\"a\":1}");
    }

    #[test]
    fn test_parse_signal_full_payload() {
        let content = r#"{"action": "BUY", "confidence": 82.5, "entry": 2000.3, "sl": 1999.3, "tp": 2002.3}"#;
        let signal = parse_signal("XAUUSD", content).unwrap();
        assert_eq!(signal.action, SignalAction::Buy);
        assert_eq!(signal.confidence, 82.5);
        assert_eq!(signal.stop.unwrap().value(), 1999.3);
        assert_eq!(signal.target.unwrap().value(), 2002.3);
    }

    #[test]
    fn test_parse_signal_unknown_action_degrades() {
        let content = r#"{"action": "HOLD", "confidence": 90}"#;
        let signal = parse_signal("XAUUSD", content).unwrap();
        assert_eq!(signal.action, SignalAction::NoTrade);
    }

    #[test]
    fn test_parse_signal_clamps_confidence() {
        let content = r#"{"action": "SELL", "confidence": 140}"#;
        let signal = parse_signal("BTCUSD", content).unwrap();
        assert_eq!(signal.confidence, 100.0);
    }

    #[test]
    fn test_parse_signal_rejects_non_json() {
        assert!(parse_signal("XAUUSD", "buy now, trust me").is_err());
    }

    #[test]
    fn test_prompt_mentions_symbol_and_quotes() {
        let snapshot = MarketSnapshot {
            symbol: "XAUUSD".to_string(),
            bid: 2000.0,
            ask: 2000.4,
        };
        let prompt = build_prompt("XAUUSD", &snapshot);
        assert!(prompt.contains("XAUUSD"));
        assert!(prompt.contains("2000.40000"));
    }
}
