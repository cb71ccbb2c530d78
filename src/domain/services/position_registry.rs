//! PositionRegistry service - concurrent-safe store of per-ticket risk state
//!
//! The registry is the only genuinely shared mutable state in the system.
//! Every read-then-write on one ticket goes through [`PositionRegistry::with_state`],
//! which holds that ticket's lock for the whole closure, so two loops
//! observing the same ticket can never both act on a stale flag. Distinct
//! tickets proceed fully in parallel.

use crate::domain::entities::position::Ticket;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;

/// Risk-management state tracked per open ticket
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RiskState {
    pub breakeven_reached: bool,
    pub trailing_armed: bool,
    /// Highest profit milestone already acted upon, in account currency
    pub last_protected_level: f64,
}

impl RiskState {
    /// Raise the protected level. The level is monotonically non-decreasing
    /// for the lifetime of the ticket; regressions are ignored.
    ///
    /// # Returns
    /// true when the level was raised
    pub fn raise_protected_level(&mut self, level: f64) -> bool {
        if level > self.last_protected_level {
            self.last_protected_level = level;
            true
        } else {
            false
        }
    }
}

/// Concurrent map of ticket -> risk state
pub struct PositionRegistry {
    states: Mutex<HashMap<Ticket, Arc<Mutex<RiskState>>>>,
}

impl PositionRegistry {
    pub fn new() -> Self {
        Self {
            states: Mutex::new(HashMap::new()),
        }
    }

    /// Fetch (creating on first observation) the shared state for a ticket.
    /// The outer map lock is held only for the lookup.
    fn entry(&self, ticket: Ticket) -> Arc<Mutex<RiskState>> {
        let mut states = self
            .states
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        states.entry(ticket).or_default().clone()
    }

    /// Run `f` with exclusive access to the ticket's state. Creates the state
    /// on first observation of the ticket.
    pub fn with_state<R>(&self, ticket: Ticket, f: impl FnOnce(&mut RiskState) -> R) -> R {
        let entry = self.entry(ticket);
        let mut state = entry.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut state)
    }

    /// Copy of one ticket's state, if it is tracked
    pub fn snapshot(&self, ticket: Ticket) -> Option<RiskState> {
        let states = self
            .states
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        states
            .get(&ticket)
            .map(|entry| entry.lock().unwrap_or_else(PoisonError::into_inner).clone())
    }

    /// Copy of every tracked state
    pub fn snapshot_all(&self) -> Vec<(Ticket, RiskState)> {
        let states = self
            .states
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        states
            .iter()
            .map(|(ticket, entry)| {
                (
                    *ticket,
                    entry.lock().unwrap_or_else(PoisonError::into_inner).clone(),
                )
            })
            .collect()
    }

    /// Drop state for every ticket not present in `open_tickets` (closed by
    /// any means: stop fill, take-profit fill, or explicit close).
    ///
    /// # Returns
    /// The tickets that were dropped
    pub fn retain_open(&self, open_tickets: &[Ticket]) -> Vec<Ticket> {
        let mut states = self
            .states
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let closed: Vec<Ticket> = states
            .keys()
            .filter(|ticket| !open_tickets.contains(ticket))
            .copied()
            .collect();
        for ticket in &closed {
            states.remove(ticket);
            debug!("risk state dropped for closed ticket {}", ticket);
        }
        closed
    }

    /// Remove one ticket's state explicitly (e.g. after a reversal close)
    pub fn remove(&self, ticket: Ticket) -> bool {
        let mut states = self
            .states
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        states.remove(&ticket).is_some()
    }

    pub fn len(&self) -> usize {
        self.states
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for PositionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
