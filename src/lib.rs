//! VIGIL Position Risk & Lifecycle Manager
//!
//! This library provides the core components for protecting open leveraged
//! trading positions: breakeven elevation, progressive stop-loss laddering,
//! trailing stops, and signal-reversal closes, supervised by independent
//! per-symbol monitoring loops.

pub mod application;
pub mod audit;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod retry;
