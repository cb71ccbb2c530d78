use crate::domain::entities::position::Direction;
use crate::domain::value_objects::price::Price;

/// Direction requested by the signal oracle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalAction {
    Buy,
    Sell,
    NoTrade,
}

impl SignalAction {
    /// Map the action onto an order direction. NoTrade has none.
    pub fn direction(&self) -> Option<Direction> {
        match self {
            SignalAction::Buy => Some(Direction::Buy),
            SignalAction::Sell => Some(Direction::Sell),
            SignalAction::NoTrade => None,
        }
    }

    /// Parse the oracle's textual action. Anything unrecognized degrades to
    /// NoTrade rather than failing.
    pub fn parse(raw: &str) -> SignalAction {
        match raw.trim().to_uppercase().as_str() {
            "BUY" => SignalAction::Buy,
            "SELL" => SignalAction::Sell,
            _ => SignalAction::NoTrade,
        }
    }
}

impl std::fmt::Display for SignalAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SignalAction::Buy => write!(f, "BUY"),
            SignalAction::Sell => write!(f, "SELL"),
            SignalAction::NoTrade => write!(f, "NO_TRADE"),
        }
    }
}

/// One trading signal produced by the oracle. Ephemeral: consumed once per
/// evaluation and never persisted by the core.
#[derive(Debug, Clone)]
pub struct Signal {
    pub symbol: String,
    pub action: SignalAction,
    /// 0-100
    pub confidence: f64,
    pub entry: Option<Price>,
    pub stop: Option<Price>,
    pub target: Option<Price>,
}

impl Signal {
    /// Degraded signal used whenever the oracle fails
    pub fn no_trade(symbol: &str) -> Signal {
        Signal {
            symbol: symbol.to_string(),
            action: SignalAction::NoTrade,
            confidence: 0.0,
            entry: None,
            stop: None,
            target: None,
        }
    }

    /// Directional and confident enough to act on
    pub fn is_actionable(&self, min_confidence: f64) -> bool {
        self.action.direction().is_some() && self.confidence >= min_confidence
    }
}
