use crate::domain::errors::ValidationError;

/// Floating profit of a position in account currency.
///
/// Unlike Price, Profit can be negative to represent losses. This type only
/// guarantees the value is finite.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Profit(f64);

impl Profit {
    pub fn new(value: f64) -> Result<Self, ValidationError> {
        if !value.is_finite() {
            return Err(ValidationError::MustBeFinite);
        }
        Ok(Profit(value))
    }

    pub fn value(&self) -> f64 {
        self.0
    }

    pub fn is_profit(&self) -> bool {
        self.0 > 0.0
    }

    pub fn is_loss(&self) -> bool {
        self.0 < 0.0
    }

    /// Zero profit (breakeven)
    pub fn zero() -> Self {
        Profit(0.0)
    }
}

impl std::fmt::Display for Profit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.0 >= 0.0 {
            write!(f, "+${:.2}", self.0)
        } else {
            write!(f, "-${:.2}", self.0.abs())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profit_new_valid() {
        assert_eq!(Profit::new(55.25).unwrap().value(), 55.25);
    }

    #[test]
    fn test_profit_allows_negative() {
        let profit = Profit::new(-12.0).unwrap();
        assert!(profit.is_loss());
        assert!(!profit.is_profit());
    }

    #[test]
    fn test_profit_rejects_nan() {
        assert_eq!(Profit::new(f64::NAN), Err(ValidationError::MustBeFinite));
    }

    #[test]
    fn test_profit_rejects_infinity() {
        assert_eq!(Profit::new(f64::INFINITY), Err(ValidationError::MustBeFinite));
    }

    #[test]
    fn test_profit_display() {
        assert_eq!(Profit::new(20.0).unwrap().to_string(), "+$20.00");
        assert_eq!(Profit::new(-7.5).unwrap().to_string(), "-$7.50");
    }

    #[test]
    fn test_profit_zero() {
        let zero = Profit::zero();
        assert!(!zero.is_profit());
        assert!(!zero.is_loss());
    }
}
