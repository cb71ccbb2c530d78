//! Position sizing service - derives order volume from account equity
//!
//! Volume grows in fixed lot increments as equity moves away from the
//! configured starting capital, and never drops below the minimum lot.
//! Pure and deterministic; called only at order-open time, never to resize
//! an existing position.

use crate::domain::value_objects::volume::Volume;
use thiserror::Error;

/// Configuration-class failure: sizing with malformed equity must never
/// silently produce a zero volume.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SizingError {
    #[error("account equity must be a finite, non-negative amount (got {0})")]
    InvalidEquity(f64),
}

/// Lot-sizing parameters, validated once at startup
#[derive(Debug, Clone)]
pub struct LotSizing {
    pub base_lot: f64,
    pub starting_capital: f64,
    pub capital_increment: f64,
    pub lot_increment: f64,
    pub min_lot: f64,
}

impl Default for LotSizing {
    fn default() -> Self {
        Self {
            base_lot: 1.0,
            starting_capital: 10_000.0,
            capital_increment: 5_000.0,
            lot_increment: 0.5,
            min_lot: 1.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PositionSizer {
    sizing: LotSizing,
}

impl PositionSizer {
    pub fn new(sizing: LotSizing) -> Self {
        Self { sizing }
    }

    /// Size a new order from current account equity.
    ///
    /// `volume = max(min_lot, base_lot + ((equity - starting_capital) / capital_increment) * lot_increment)`
    /// rounded to the broker's one-decimal lot step.
    pub fn size(&self, equity: f64) -> Result<Volume, SizingError> {
        if !equity.is_finite() || equity < 0.0 {
            return Err(SizingError::InvalidEquity(equity));
        }

        let capital_change = equity - self.sizing.starting_capital;
        let additional_lots = (capital_change / self.sizing.capital_increment) * self.sizing.lot_increment;
        let lots = (self.sizing.base_lot + additional_lots).max(self.sizing.min_lot);

        Volume::new(lots)
            .map(|volume| volume.rounded_to_tenth())
            .map_err(|_| SizingError::InvalidEquity(equity))
    }
}
