//! Static per-instrument constants for pip conversion and stop placement.

use once_cell::sync::Lazy;
use std::collections::HashMap;

/// Pip/point conversion and protective-stop distances for one symbol
#[derive(Debug, Clone, Copy)]
pub struct InstrumentMeta {
    /// Price units per pip
    pub pip_size: f64,
    pub breakeven_buffer_pips: f64,
    pub trail_distance_pips: f64,
    pub trail_step_pips: f64,
}

impl InstrumentMeta {
    /// Breakeven buffer as a price distance
    pub fn breakeven_buffer(&self) -> f64 {
        self.breakeven_buffer_pips * self.pip_size
    }

    /// Trailing distance as a price distance
    pub fn trail_distance(&self) -> f64 {
        self.trail_distance_pips * self.pip_size
    }

    /// Minimum stop improvement before a trailing update is sent
    pub fn trail_step(&self) -> f64 {
        self.trail_step_pips * self.pip_size
    }

    /// Look up the catalog entry for a symbol, falling back to conservative
    /// forex defaults for unknown instruments.
    pub fn for_symbol(symbol: &str) -> InstrumentMeta {
        CATALOG
            .get(symbol.trim().to_uppercase().as_str())
            .copied()
            .unwrap_or(DEFAULT_META)
    }
}

const DEFAULT_META: InstrumentMeta = InstrumentMeta {
    pip_size: 0.0001,
    breakeven_buffer_pips: 2.0,
    trail_distance_pips: 10.0,
    trail_step_pips: 1.0,
};

static CATALOG: Lazy<HashMap<&'static str, InstrumentMeta>> = Lazy::new(|| {
    let mut catalog = HashMap::new();
    catalog.insert(
        "XAUUSD",
        InstrumentMeta {
            pip_size: 0.01,
            breakeven_buffer_pips: 2.0,
            trail_distance_pips: 10.0,
            trail_step_pips: 1.0,
        },
    );
    catalog.insert(
        "BTCUSD",
        InstrumentMeta {
            pip_size: 1.0,
            breakeven_buffer_pips: 2.0,
            trail_distance_pips: 10.0,
            trail_step_pips: 1.0,
        },
    );
    catalog
});
