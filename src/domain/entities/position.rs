use crate::domain::value_objects::{price::Price, profit::Profit, volume::Volume};
use chrono::{DateTime, Utc};

/// Broker-assigned unique identifier for one open position
pub type Ticket = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Buy,
    Sell,
}

impl Direction {
    pub fn opposes(&self, other: Direction) -> bool {
        *self != other
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Buy => write!(f, "BUY"),
            Direction::Sell => write!(f, "SELL"),
        }
    }
}

/// Read-only snapshot of one open position as reported by the gateway.
///
/// The gateway owns the position; the core only reads snapshots and requests
/// mutations (stop modification, close) through it.
#[derive(Debug, Clone)]
pub struct Position {
    pub ticket: Ticket,
    pub symbol: String,
    pub direction: Direction,
    pub entry_price: Price,
    pub volume: Volume,
    pub current_sl: Option<Price>,
    pub current_tp: Option<Price>,
    pub profit: Profit,
    pub opened_at: DateTime<Utc>,
}

impl Position {
    /// True when the stop-loss already sits at or past the entry price, i.e.
    /// the position can no longer close at a loss.
    pub fn entry_protected(&self) -> bool {
        match self.current_sl {
            None => false,
            Some(sl) => match self.direction {
                Direction::Buy => sl.value() >= self.entry_price.value(),
                Direction::Sell => sl.value() <= self.entry_price.value(),
            },
        }
    }

    /// True when `candidate` is strictly more favorable than the current
    /// stop-loss. An unset stop is improved by any candidate.
    pub fn sl_improves(&self, candidate: Price) -> bool {
        match self.current_sl {
            None => true,
            Some(sl) => match self.direction {
                Direction::Buy => candidate.value() > sl.value(),
                Direction::Sell => candidate.value() < sl.value(),
            },
        }
    }

    /// Like [`sl_improves`](Self::sl_improves), but requires the improvement
    /// to be at least `step` to suppress modification chatter on every tick.
    pub fn sl_improves_by(&self, candidate: Price, step: f64) -> bool {
        match self.current_sl {
            None => true,
            Some(sl) => match self.direction {
                Direction::Buy => candidate.value() >= sl.value() + step,
                Direction::Sell => candidate.value() <= sl.value() - step,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buy_position(sl: Option<f64>) -> Position {
        Position {
            ticket: 1001,
            symbol: "XAUUSD".to_string(),
            direction: Direction::Buy,
            entry_price: Price::new(2000.0).unwrap(),
            volume: Volume::new(1.0).unwrap(),
            current_sl: sl.map(|v| Price::new(v).unwrap()),
            current_tp: None,
            profit: Profit::zero(),
            opened_at: Utc::now(),
        }
    }

    fn sell_position(sl: Option<f64>) -> Position {
        Position {
            direction: Direction::Sell,
            ..buy_position(sl)
        }
    }

    #[test]
    fn test_direction_opposes() {
        assert!(Direction::Buy.opposes(Direction::Sell));
        assert!(!Direction::Sell.opposes(Direction::Sell));
    }

    #[test]
    fn test_entry_protected_buy() {
        assert!(!buy_position(None).entry_protected());
        assert!(!buy_position(Some(1990.0)).entry_protected());
        assert!(buy_position(Some(2000.0)).entry_protected());
        assert!(buy_position(Some(2000.02)).entry_protected());
    }

    #[test]
    fn test_entry_protected_sell() {
        assert!(!sell_position(Some(2010.0)).entry_protected());
        assert!(sell_position(Some(1999.98)).entry_protected());
    }

    #[test]
    fn test_sl_improves_unset_stop() {
        let position = buy_position(None);
        assert!(position.sl_improves(Price::new(1980.0).unwrap()));
    }

    #[test]
    fn test_sl_improves_strictness() {
        let position = buy_position(Some(2001.0));
        assert!(!position.sl_improves(Price::new(2001.0).unwrap()));
        assert!(position.sl_improves(Price::new(2001.01).unwrap()));

        let position = sell_position(Some(1999.0));
        assert!(!position.sl_improves(Price::new(1999.0).unwrap()));
        assert!(position.sl_improves(Price::new(1998.9).unwrap()));
    }

    #[test]
    fn test_sl_improves_by_step() {
        let position = buy_position(Some(2001.0));
        // below one step of improvement
        assert!(!position.sl_improves_by(Price::new(2001.005).unwrap(), 0.01));
        // exactly one step
        assert!(position.sl_improves_by(Price::new(2001.01).unwrap(), 0.01));
        assert!(position.sl_improves_by(Price::new(2001.02).unwrap(), 0.01));
    }
}
