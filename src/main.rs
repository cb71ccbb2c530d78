use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use vigil::application::entry::{EntryConfig, EntryService};
use vigil::application::supervisor::{Supervisor, SupervisorConfig};
use vigil::audit::AuditLog;
use vigil::config::Config;
use vigil::domain::repositories::execution_gateway::ExecutionGateway;
use vigil::domain::repositories::news_gate::{NewsGate, OpenGate};
use vigil::domain::repositories::signal_oracle::SignalOracle;
use vigil::domain::services::breakeven::BreakevenElevator;
use vigil::domain::services::position_registry::PositionRegistry;
use vigil::domain::services::position_sizer::PositionSizer;
use vigil::domain::services::reversal::ReversalMonitor;
use vigil::domain::services::risk_ladder::LadderEngine;
use vigil::domain::services::trailing::TrailingStopEngine;
use vigil::infrastructure::adapters::bridge_gateway::BridgeGateway;
use vigil::infrastructure::adapters::calendar_gate::CalendarGate;
use vigil::infrastructure::adapters::llm_oracle::LlmOracle;
use vigil::retry::RetryPolicy;

#[derive(Clone)]
struct AppState {
    gateway: Arc<dyn ExecutionGateway>,
    registry: Arc<PositionRegistry>,
    supervisor: Supervisor,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vigil=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    // invalid numeric configuration is fatal here, never mid-run
    config.validate()?;

    info!("VIGIL position risk manager starting");
    info!("instruments: {}", config.symbols.join(", "));
    info!(
        "breakeven at +${:.0}, trailing from +${:.0}, ladder every +${:.0}",
        config.breakeven_threshold, config.trail_activation_threshold, config.profit_threshold
    );

    let audit = AuditLog::spawn(config.audit_log_path.clone());
    let retry = RetryPolicy {
        attempts: config.retry_attempts,
        pause: config.retry_pause,
    };

    let gateway: Arc<dyn ExecutionGateway> = Arc::new(BridgeGateway::new(
        config.gateway_url.clone(),
        config.gateway_timeout,
    )?);
    let oracle: Arc<dyn SignalOracle> = Arc::new(LlmOracle::new(
        config.oracle_url.clone(),
        config.oracle_model.clone(),
        config.oracle_api_key.clone(),
        config.oracle_timeout,
    )?);
    let news: Arc<dyn NewsGate> = if config.calendar_url.is_empty() {
        warn!("no calendar feed configured, news gating disabled");
        Arc::new(OpenGate)
    } else {
        Arc::new(CalendarGate::new(
            config.calendar_url.clone(),
            config.news_window_minutes,
            config.gateway_timeout,
        ))
    };

    let registry = Arc::new(PositionRegistry::new());
    let breakeven = Arc::new(BreakevenElevator::new(
        gateway.clone(),
        registry.clone(),
        audit.clone(),
        config.breakeven_threshold,
        retry.clone(),
    ));
    let ladder = Arc::new(LadderEngine::new(
        gateway.clone(),
        registry.clone(),
        audit.clone(),
        config.profit_threshold,
        retry.clone(),
    ));
    let trailing = Arc::new(TrailingStopEngine::new(
        gateway.clone(),
        registry.clone(),
        audit.clone(),
        config.trail_activation_threshold,
        retry.clone(),
    ));
    let reversal = Arc::new(ReversalMonitor::new(
        gateway.clone(),
        registry.clone(),
        audit.clone(),
        config.min_confidence,
        retry.clone(),
    ));

    let supervisor = Supervisor::new(
        gateway.clone(),
        oracle.clone(),
        registry.clone(),
        breakeven,
        ladder,
        trailing,
        reversal,
        audit.clone(),
        SupervisorConfig {
            profit_interval: config.profit_interval,
            reversal_interval: config.reversal_interval,
            join_timeout: config.join_timeout,
        },
    );

    // positions that survived a restart get monitored right away
    match gateway.list_open_positions().await {
        Ok(positions) => {
            for position in &positions {
                supervisor.start(&position.symbol);
            }
            info!("{} open position(s) at startup", positions.len());
        }
        Err(e) => warn!("could not query positions at startup: {}", e),
    }

    let entry = Arc::new(EntryService::new(
        gateway.clone(),
        oracle,
        news,
        PositionSizer::new(config.lot_sizing.clone()),
        supervisor.clone(),
        audit,
        retry,
        EntryConfig {
            symbols: config.symbols.clone(),
            min_confidence: config.min_confidence,
            recheck_min: config.entry_recheck_min,
            recheck_max: config.entry_recheck_max,
        },
    ));
    let (entry_stop_tx, entry_stop_rx) = watch::channel(false);
    tokio::spawn(entry.run(entry_stop_rx));

    let state = AppState {
        gateway,
        registry,
        supervisor: supervisor.clone(),
    };
    let app = Router::new()
        .route("/health", get(health_check))
        .route("/positions", get(get_positions))
        .route("/risk", get(get_risk_states))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    info!("status surface listening on {}", config.listen_addr);

    let shutdown_signal = async {
        let ctrl_c = async {
            match tokio::signal::ctrl_c().await {
                Ok(()) => info!("received Ctrl+C"),
                Err(e) => error!("failed to install Ctrl+C handler: {}", e),
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut sig) => {
                    sig.recv().await;
                    info!("received SIGTERM");
                }
                Err(e) => error!("failed to install SIGTERM handler: {}", e),
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {},
            _ = terminate => {},
        }
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    info!("shutting down");
    let _ = entry_stop_tx.send(true);
    supervisor.stop_all().await;
    info!("shutdown complete");
    Ok(())
}

async fn health_check(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "running",
        "gateway": state.gateway.name(),
        "monitored_symbols": state.supervisor.monitored_symbols(),
        "tracked_tickets": state.registry.len(),
    }))
}

async fn get_positions(State(state): State<AppState>) -> Json<serde_json::Value> {
    match state.gateway.list_open_positions().await {
        Ok(positions) => {
            let rows: Vec<serde_json::Value> = positions
                .iter()
                .map(|p| {
                    serde_json::json!({
                        "ticket": p.ticket,
                        "symbol": p.symbol,
                        "direction": p.direction.to_string(),
                        "entry_price": p.entry_price.value(),
                        "volume": p.volume.value(),
                        "sl": p.current_sl.map(|sl| sl.value()),
                        "tp": p.current_tp.map(|tp| tp.value()),
                        "profit": p.profit.value(),
                        "opened_at": p.opened_at,
                    })
                })
                .collect();
            Json(serde_json::json!({ "positions": rows, "count": rows.len() }))
        }
        Err(e) => Json(serde_json::json!({ "error": e.to_string() })),
    }
}

async fn get_risk_states(State(state): State<AppState>) -> Json<serde_json::Value> {
    let rows: Vec<serde_json::Value> = state
        .registry
        .snapshot_all()
        .iter()
        .map(|(ticket, risk)| {
            serde_json::json!({
                "ticket": ticket,
                "breakeven_reached": risk.breakeven_reached,
                "trailing_armed": risk.trailing_armed,
                "last_protected_level": risk.last_protected_level,
            })
        })
        .collect();
    Json(serde_json::json!({ "risk_states": rows, "count": rows.len() }))
}
