pub mod breakeven;
pub mod position_registry;
pub mod position_sizer;
pub mod reversal;
pub mod risk_ladder;
pub mod trailing;
