//! Economic-calendar news gate
//!
//! Blocks new entries inside a window around high-impact events for the
//! currencies a symbol is sensitive to. Events come from a JSON calendar
//! feed, cached for a few minutes; when a refresh fails the previous events
//! are reused, so the gate is best-effort and never takes the entry loop
//! down.

use crate::domain::repositories::news_gate::NewsGate;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::warn;

const REFRESH_INTERVAL: Duration = Duration::from_secs(600);

#[derive(Debug, Clone, Deserialize)]
pub struct CalendarEvent {
    pub currency: String,
    pub impact: String,
    pub title: String,
    pub time: DateTime<Utc>,
}

static SYMBOL_CURRENCIES: Lazy<HashMap<&'static str, &'static [&'static str]>> = Lazy::new(|| {
    let mut map: HashMap<&'static str, &'static [&'static str]> = HashMap::new();
    map.insert("XAUUSD", &["USD"]);
    map.insert("BTCUSD", &["USD"]);
    map.insert("EURUSD", &["EUR", "USD"]);
    map.insert("GBPUSD", &["GBP", "USD"]);
    map
});

/// Currencies whose news affect a symbol; unknown symbols watch USD
pub fn relevant_currencies(symbol: &str) -> &'static [&'static str] {
    SYMBOL_CURRENCIES
        .get(symbol.trim().to_uppercase().as_str())
        .copied()
        .unwrap_or(&["USD"])
}

/// First high-impact event for one of `currencies` whose blocking window
/// contains `now`
pub fn blocking_event<'a>(
    events: &'a [CalendarEvent],
    currencies: &[&str],
    now: DateTime<Utc>,
    window: chrono::Duration,
) -> Option<&'a CalendarEvent> {
    events.iter().find(|event| {
        event.impact.eq_ignore_ascii_case("high")
            && currencies
                .iter()
                .any(|ccy| ccy.eq_ignore_ascii_case(&event.currency))
            && now >= event.time - window
            && now <= event.time + window
    })
}

struct EventCache {
    fetched_at: Option<Instant>,
    events: Vec<CalendarEvent>,
}

pub struct CalendarGate {
    client: reqwest::Client,
    url: String,
    window: chrono::Duration,
    cache: Mutex<EventCache>,
}

impl CalendarGate {
    pub fn new(url: String, window_minutes: i64, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self {
            client,
            url,
            window: chrono::Duration::minutes(window_minutes),
            cache: Mutex::new(EventCache {
                fetched_at: None,
                events: Vec::new(),
            }),
        }
    }

    async fn fetch(&self) -> Result<Vec<CalendarEvent>, reqwest::Error> {
        self.client
            .get(&self.url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
    }

    async fn events(&self) -> Vec<CalendarEvent> {
        let mut cache = self.cache.lock().await;
        let stale = cache
            .fetched_at
            .map(|t| t.elapsed() >= REFRESH_INTERVAL)
            .unwrap_or(true);
        if stale {
            match self.fetch().await {
                Ok(events) => {
                    cache.fetched_at = Some(Instant::now());
                    cache.events = events;
                }
                Err(e) => warn!("calendar refresh failed, reusing cached events: {}", e),
            }
        }
        cache.events.clone()
    }
}

#[async_trait]
impl NewsGate for CalendarGate {
    async fn is_blocked(&self, symbol: &str) -> (bool, String) {
        let events = self.events().await;
        let currencies = relevant_currencies(symbol);
        match blocking_event(&events, currencies, Utc::now(), self.window) {
            Some(event) => (
                true,
                format!("{} ({}) window", event.title, event.currency),
            ),
            None => (false, "OK".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn nfp(minutes_from_now: i64) -> CalendarEvent {
        CalendarEvent {
            currency: "USD".to_string(),
            impact: "High".to_string(),
            title: "Non-Farm Payrolls".to_string(),
            time: base_now() + chrono::Duration::minutes(minutes_from_now),
        }
    }

    fn base_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 6, 12, 30, 0).unwrap()
    }

    #[test]
    fn test_event_inside_window_blocks() {
        let events = vec![nfp(30)];
        let hit = blocking_event(&events, &["USD"], base_now(), chrono::Duration::minutes(45));
        assert!(hit.is_some());
    }

    #[test]
    fn test_event_outside_window_does_not_block() {
        let events = vec![nfp(90)];
        let hit = blocking_event(&events, &["USD"], base_now(), chrono::Duration::minutes(45));
        assert!(hit.is_none());
    }

    #[test]
    fn test_window_is_symmetric() {
        let events = vec![nfp(-30)];
        let hit = blocking_event(&events, &["USD"], base_now(), chrono::Duration::minutes(45));
        assert!(hit.is_some());
    }

    #[test]
    fn test_other_currency_does_not_block() {
        let mut event = nfp(10);
        event.currency = "JPY".to_string();
        let events = [event];
        let hit = blocking_event(
            &events,
            &["USD"],
            base_now(),
            chrono::Duration::minutes(45),
        );
        assert!(hit.is_none());
    }

    #[test]
    fn test_low_impact_does_not_block() {
        let mut event = nfp(10);
        event.impact = "Medium".to_string();
        let events = [event];
        let hit = blocking_event(
            &events,
            &["USD"],
            base_now(),
            chrono::Duration::minutes(45),
        );
        assert!(hit.is_none());
    }

    #[test]
    fn test_relevant_currencies() {
        assert_eq!(relevant_currencies("XAUUSD"), &["USD"]);
        assert_eq!(relevant_currencies("EURUSD"), &["EUR", "USD"]);
        // unknown symbols watch the dollar
        assert_eq!(relevant_currencies("SOLUSD"), &["USD"]);
    }
}
