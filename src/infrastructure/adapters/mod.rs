pub mod bridge_gateway;
pub mod calendar_gate;
pub mod llm_oracle;
