//! News Gate Trait
//!
//! Entry gating around high-impact economic events. Only consulted before
//! opening new positions; never blocks protection of positions already open.

use async_trait::async_trait;

#[async_trait]
pub trait NewsGate: Send + Sync {
    /// Whether trading `symbol` is currently blocked, with a reason
    async fn is_blocked(&self, symbol: &str) -> (bool, String);
}

/// Permissive gate used when no calendar source is configured
pub struct OpenGate;

#[async_trait]
impl NewsGate for OpenGate {
    async fn is_blocked(&self, _symbol: &str) -> (bool, String) {
        (false, "OK".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_gate_never_blocks() {
        let (blocked, reason) = OpenGate.is_blocked("XAUUSD").await;
        assert!(!blocked);
        assert_eq!(reason, "OK");
    }
}
