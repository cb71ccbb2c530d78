//! Runtime configuration
//!
//! Everything is loaded from the environment once at startup into a typed
//! struct and validated before any loop spawns; invalid numeric
//! configuration is fatal there and never encountered mid-run. Unparseable
//! values fall back to the default with a warning, the same way unset ones
//! do.

use crate::domain::services::position_sizer::LotSizing;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConfigError {
    #[error("{name} must be a positive, finite number (got {value})")]
    NonPositive { name: &'static str, value: f64 },
    #[error("{name} must be a non-negative, finite number (got {value})")]
    Negative { name: &'static str, value: f64 },
    #[error("minimum confidence must be within 0-100 (got {0})")]
    ConfidenceOutOfRange(f64),
    #[error("at least one trading symbol must be configured")]
    NoSymbols,
    #[error("entry recheck interval is inverted ({min_secs}s..{max_secs}s)")]
    InvertedRecheckInterval { min_secs: u64, max_secs: u64 },
    #[error("retry attempts must be at least 1")]
    NoRetryAttempts,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub symbols: Vec<String>,
    /// Minimum signal confidence (0-100) for entries and reversals
    pub min_confidence: f64,
    /// Profit that elevates the stop to breakeven, in account currency
    pub breakeven_threshold: f64,
    /// Profit that arms the trailing stop, in account currency
    pub trail_activation_threshold: f64,
    /// Ladder milestone increment, in account currency
    pub profit_threshold: f64,
    pub lot_sizing: LotSizing,

    pub profit_interval: Duration,
    pub reversal_interval: Duration,
    pub entry_recheck_min: Duration,
    pub entry_recheck_max: Duration,
    pub join_timeout: Duration,
    pub retry_attempts: u32,
    pub retry_pause: Duration,

    pub gateway_url: String,
    pub gateway_timeout: Duration,
    pub oracle_url: String,
    pub oracle_model: String,
    pub oracle_api_key: String,
    pub oracle_timeout: Duration,
    pub calendar_url: String,
    pub news_window_minutes: i64,

    pub audit_log_path: PathBuf,
    pub listen_addr: SocketAddr,
}

impl Config {
    /// Default configuration for the two supported instruments
    pub fn default() -> Config {
        Config {
            symbols: vec!["XAUUSD".to_string(), "BTCUSD".to_string()],
            min_confidence: 78.0,
            breakeven_threshold: 50.0,
            trail_activation_threshold: 60.0,
            profit_threshold: 20.0,
            lot_sizing: LotSizing::default(),

            profit_interval: Duration::from_secs(1),
            reversal_interval: Duration::from_secs(30),
            entry_recheck_min: Duration::from_secs(60),
            entry_recheck_max: Duration::from_secs(120),
            join_timeout: Duration::from_secs(5),
            retry_attempts: 3,
            retry_pause: Duration::from_millis(250),

            gateway_url: "http://127.0.0.1:8228".to_string(),
            gateway_timeout: Duration::from_secs(10),
            oracle_url: "https://api.deepseek.com/v1/chat/completions".to_string(),
            oracle_model: "deepseek-chat".to_string(),
            oracle_api_key: String::new(),
            oracle_timeout: Duration::from_secs(30),
            calendar_url: String::new(),
            news_window_minutes: 45,

            audit_log_path: PathBuf::from("trade_journal.jsonl"),
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
        }
    }

    /// Load configuration from environment variables, falling back to the
    /// defaults for anything unset or unparseable.
    pub fn from_env() -> Config {
        let mut config = Config::default();

        if let Ok(raw) = std::env::var("PAIRS") {
            let symbols = parse_symbols(&raw);
            if symbols.is_empty() {
                warn!("PAIRS is set but empty, keeping defaults");
            } else {
                config.symbols = symbols;
            }
        }

        config.min_confidence = env_f64("MIN_CONFIDENCE", config.min_confidence);
        config.breakeven_threshold = env_f64("BREAKEVEN_THRESHOLD", config.breakeven_threshold);
        config.trail_activation_threshold = env_f64(
            "TRAIL_ACTIVATION_THRESHOLD",
            config.trail_activation_threshold,
        );
        config.profit_threshold = env_f64("PROFIT_THRESHOLD", config.profit_threshold);

        config.lot_sizing.base_lot = env_f64("BASE_LOT", config.lot_sizing.base_lot);
        config.lot_sizing.starting_capital =
            env_f64("STARTING_CAPITAL", config.lot_sizing.starting_capital);
        config.lot_sizing.capital_increment =
            env_f64("CAPITAL_INCREMENT", config.lot_sizing.capital_increment);
        config.lot_sizing.lot_increment =
            env_f64("LOT_INCREMENT", config.lot_sizing.lot_increment);
        config.lot_sizing.min_lot = env_f64("MIN_LOT", config.lot_sizing.min_lot);

        config.profit_interval =
            Duration::from_millis(env_u64("PROFIT_MONITOR_INTERVAL_MS", 1_000));
        config.reversal_interval = Duration::from_secs(env_u64("SIGNAL_CHECK_INTERVAL_SECS", 30));
        config.entry_recheck_min = Duration::from_secs(env_u64("MIN_RECHECK_MINUTES", 1) * 60);
        config.entry_recheck_max = Duration::from_secs(env_u64("MAX_RECHECK_MINUTES", 2) * 60);
        config.retry_attempts = env_u64("RETRY_ATTEMPTS", 3) as u32;

        config.gateway_url = env_string("GATEWAY_URL", &config.gateway_url);
        config.oracle_url = normalize_oracle_url(&env_string("LLM_URL", &config.oracle_url));
        config.oracle_model = env_string("LLM_MODEL", &config.oracle_model);
        config.oracle_api_key = env_string("LLM_API_KEY", "");
        config.calendar_url = env_string("CALENDAR_URL", "");
        config.news_window_minutes = env_u64("NEWS_WINDOW_MINUTES", 45) as i64;

        config.audit_log_path = PathBuf::from(env_string(
            "TRADE_LOG_FILE",
            &config.audit_log_path.display().to_string(),
        ));
        if let Ok(raw) = std::env::var("LISTEN_ADDR") {
            match raw.parse() {
                Ok(addr) => config.listen_addr = addr,
                Err(e) => warn!("invalid LISTEN_ADDR '{}': {}, keeping default", raw, e),
            }
        }

        config
    }

    /// Reject inconsistent numeric configuration. Called once at startup;
    /// a failure here is fatal to the whole process.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.symbols.is_empty() {
            return Err(ConfigError::NoSymbols);
        }
        if !(0.0..=100.0).contains(&self.min_confidence) || !self.min_confidence.is_finite() {
            return Err(ConfigError::ConfidenceOutOfRange(self.min_confidence));
        }

        require_positive("breakeven_threshold", self.breakeven_threshold)?;
        require_positive("trail_activation_threshold", self.trail_activation_threshold)?;
        require_positive("profit_threshold", self.profit_threshold)?;
        require_positive("base_lot", self.lot_sizing.base_lot)?;
        require_positive("capital_increment", self.lot_sizing.capital_increment)?;
        require_positive("lot_increment", self.lot_sizing.lot_increment)?;
        require_positive("min_lot", self.lot_sizing.min_lot)?;
        require_non_negative("starting_capital", self.lot_sizing.starting_capital)?;

        if self.entry_recheck_min > self.entry_recheck_max {
            return Err(ConfigError::InvertedRecheckInterval {
                min_secs: self.entry_recheck_min.as_secs(),
                max_secs: self.entry_recheck_max.as_secs(),
            });
        }
        if self.retry_attempts == 0 {
            return Err(ConfigError::NoRetryAttempts);
        }
        Ok(())
    }
}

fn require_positive(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if !value.is_finite() || value <= 0.0 {
        return Err(ConfigError::NonPositive { name, value });
    }
    Ok(())
}

fn require_non_negative(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if !value.is_finite() || value < 0.0 {
        return Err(ConfigError::Negative { name, value });
    }
    Ok(())
}

/// Split a PAIRS-style list into normalized symbols
pub fn parse_symbols(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|symbol| symbol.trim().to_uppercase())
        .filter(|symbol| !symbol.is_empty())
        .collect()
}

/// Chat-completion APIs expect the full path; accept a bare base URL too
fn normalize_oracle_url(url: &str) -> String {
    if url.ends_with("/chat/completions") {
        url.to_string()
    } else {
        format!("{}/chat/completions", url.trim_end_matches('/'))
    }
}

fn env_f64(key: &str, default: f64) -> f64 {
    match std::env::var(key) {
        Ok(raw) => match raw.parse() {
            Ok(value) => value,
            Err(e) => {
                warn!("invalid {} '{}': {}, using default {}", key, raw, e, default);
                default
            }
        },
        Err(_) => default,
    }
}

fn env_u64(key: &str, default: u64) -> u64 {
    match std::env::var(key) {
        Ok(raw) => match raw.parse() {
            Ok(value) => value,
            Err(e) => {
                warn!("invalid {} '{}': {}, using default {}", key, raw, e, default);
                default
            }
        },
        Err(_) => default,
    }
}

fn env_string(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
