//! Trade-Insight — trade journal analytics service
//!
//! Usage:
//!   trade-insight serve --port 5000          — Launch the analytics API
//!   trade-insight analyze --file trades.json — Analyze a journal from the CLI

use axum::{
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use chrono::Utc;
use clap::{Parser, Subcommand};
use engine::{
    derive_metrics, BehaviorAnalyzer, DataError, DerivedTrade, PatternAnalyzer, TradeRecord,
};
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "trade-insight")]
#[command(about = "Trade journal analytics service", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Launch the analytics web server
    Serve {
        /// Host to bind to
        #[arg(long, default_value = "0.0.0.0")]
        host: String,
        /// Port to listen on
        #[arg(short, long, default_value_t = 5000)]
        port: u16,
    },
    /// Analyze a trade journal from a JSON file (no web server)
    Analyze {
        /// Path to a JSON array of trade records
        #[arg(long)]
        file: String,
        /// Optional JSON export path for the combined report
        #[arg(long)]
        export: Option<String>,
    },
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = if verbose {
        EnvFilter::new("debug,engine=debug,trade_insight=debug")
    } else {
        EnvFilter::new("info,engine=info,trade_insight=info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).compact())
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    dotenvy::dotenv().ok();

    match cli.command {
        Commands::Serve { host, port } => {
            let host = std::env::var("HOST").unwrap_or(host);
            let port = std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(port);
            cmd_serve(&host, port).await?;
        }
        Commands::Analyze { file, export } => cmd_analyze(&file, export)?,
    }

    Ok(())
}

// ============================================================================
// Serve command — Axum web server
// ============================================================================

async fn cmd_serve(host: &str, port: u16) -> anyhow::Result<()> {
    info!("Trade-Insight v{} starting...", APP_VERSION);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        .route("/health", get(api_health))
        .route("/v1/analyze/patterns", post(api_analyze_patterns))
        .route("/v1/analyze/behavior", post(api_analyze_behavior))
        .route("/v1/analyze/combined-analysis", post(api_combined_analysis));

    let app = Router::new().nest("/api", api_routes).layer(cors);

    let addr: std::net::SocketAddr = format!("{}:{}", host, port).parse()?;
    println!("\n=== Trade-Insight v{} ===", APP_VERSION);
    println!("Trade Journal Analytics Server");
    println!("Listening on http://{}", addr);
    println!("\nEndpoints:");
    println!("  GET  /api/health                        - Health check");
    println!("  POST /api/v1/analyze/patterns           - Size, pair-direction, and R:R patterns");
    println!("  POST /api/v1/analyze/behavior           - Overtrading, revenge trading, risk discipline");
    println!("  POST /api/v1/analyze/combined-analysis  - Full report with insights");
    println!("\nPress Ctrl+C to stop\n");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============================================================================
// Analyze command — CLI mode (no web server)
// ============================================================================

fn cmd_analyze(file: &str, export: Option<String>) -> anyhow::Result<()> {
    println!("\n=== Trade-Insight v{} ===", APP_VERSION);

    let raw = std::fs::read_to_string(file)?;
    let trades: Vec<TradeRecord> = serde_json::from_str(&raw)?;
    println!("Journal: {} ({} trades)", file, trades.len());

    let rows = derive_metrics(normalize_trades(trades))?;
    let pattern = PatternAnalyzer::new(rows.clone());
    let behavior = BehaviorAnalyzer::new(rows.clone());

    println!("\n{}", behavior.get_key_insights());

    println!("\nKey trading insights:");
    for line in pattern.get_key_trading_insights() {
        println!("  - {}", line);
    }

    println!("\nBehavior:");
    for line in behavior.get_behavior_insights() {
        println!("  - {}", line);
    }

    if let Some(export_path) = export {
        let mut report = build_combined_report(rows);
        report["generated_at"] = serde_json::json!(Utc::now().to_rfc3339());
        let json = serde_json::to_string_pretty(&report)?;
        std::fs::write(&export_path, &json)?;
        println!("\nReport exported to {}", export_path);
    }

    Ok(())
}

// ============================================================================
// Shared plumbing
// ============================================================================

/// Strip the `/` separator some journals use in pair names (EUR/USD → EURUSD)
fn normalize_trades(mut trades: Vec<TradeRecord>) -> Vec<TradeRecord> {
    for trade in &mut trades {
        if trade.pair.contains('/') {
            trade.pair = trade.pair.replace('/', "");
        }
    }
    trades
}

/// Map a derivation failure to a client error naming the failed computation
fn derive_error(err: DataError) -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::BAD_REQUEST,
        Json(serde_json::json!({
            "error": format!("metrics derivation failed: {}", err),
        })),
    )
}

/// Assemble the six-section combined response from one derived table.
/// Each analyzer owns its own copy of the rows.
fn build_combined_report(rows: Vec<DerivedTrade>) -> serde_json::Value {
    let pattern = PatternAnalyzer::new(rows.clone());
    let behavior = BehaviorAnalyzer::new(rows);

    serde_json::json!({
        "pattern_analysis": {
            "position_size_impact": pattern.analyze_position_size_impact(),
            "direction_bias": pattern.analyze_pair_direction_bias(),
            "risk_reward_patterns": pattern.analyze_risk_reward_patterns(),
        },
        "pattern_insights": pattern.get_all_insights(),
        "behavior_analysis": {
            "overtrading": behavior.detect_overtrading(),
            "revenge_trading": behavior.detect_revenge_trading(),
            "risk_management_consistency": behavior.analyze_risk_management_consistency(),
            "loss_recovery_rate": behavior.calculate_loss_recovery_rate(),
            "sharpe_ratio": behavior.calculate_sharpe_ratio(),
            "risk_level": behavior.determine_risk_level().label(),
        },
        "behavior_insights": behavior.get_behavior_insights(),
        "key_insights": behavior.get_key_insights(),
        "key_trading_insights": pattern.get_key_trading_insights(),
    })
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health
async fn api_health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "service": "trade-insight",
        "version": APP_VERSION,
    }))
}

/// POST /api/v1/analyze/patterns — position-size, pair-direction, R:R patterns
async fn api_analyze_patterns(
    Json(trades): Json<Vec<TradeRecord>>,
) -> Result<Json<serde_json::Value>, (StatusCode, Json<serde_json::Value>)> {
    let rows = derive_metrics(normalize_trades(trades)).map_err(derive_error)?;
    info!(trades = rows.len(), "Pattern analysis requested");
    let analyzer = PatternAnalyzer::new(rows);

    Ok(Json(serde_json::json!({
        "analysis": {
            "position_size_impact": analyzer.analyze_position_size_impact(),
            "direction_bias": analyzer.analyze_pair_direction_bias(),
            "risk_reward_patterns": analyzer.analyze_risk_reward_patterns(),
        },
        "insights": analyzer.get_all_insights(),
    })))
}

/// POST /api/v1/analyze/behavior — overtrading, revenge trading, risk discipline
async fn api_analyze_behavior(
    Json(trades): Json<Vec<TradeRecord>>,
) -> Result<Json<serde_json::Value>, (StatusCode, Json<serde_json::Value>)> {
    let rows = derive_metrics(normalize_trades(trades)).map_err(derive_error)?;
    info!(trades = rows.len(), "Behavior analysis requested");
    let analyzer = BehaviorAnalyzer::new(rows);

    Ok(Json(serde_json::json!({
        "analysis": {
            "overtrading": analyzer.detect_overtrading(),
            "revenge_trading": analyzer.detect_revenge_trading(),
            "risk_management_consistency": analyzer.analyze_risk_management_consistency(),
        },
        "insights": analyzer.get_behavior_insights(),
    })))
}

/// POST /api/v1/analyze/combined-analysis — both analyzers plus every insight
async fn api_combined_analysis(
    Json(trades): Json<Vec<TradeRecord>>,
) -> Result<Json<serde_json::Value>, (StatusCode, Json<serde_json::Value>)> {
    let rows = derive_metrics(normalize_trades(trades)).map_err(derive_error)?;
    info!(trades = rows.len(), "Combined analysis requested");

    Ok(Json(build_combined_report(rows)))
}
