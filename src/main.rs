use anyhow::{Context, Result};
use clap::Parser;

use tradebot::broker::{BrokerConfig, BrokerKind};
use tradebot::engine::{ConfigOverrides, EngineEvent, TradingConfig, TradingEngine};
use tradebot::risk::RiskLimits;

#[derive(Parser, Debug)]
#[command(name = "tradebot", about = "Automated trading decision engine")]
struct Args {
    /// Broker back-end to trade against (paper | alpaca)
    #[arg(long, default_value = "paper")]
    broker: String,

    /// Symbols to track (comma separated); defaults to the built-in universe
    #[arg(long, value_delimiter = ',')]
    symbols: Vec<String>,

    /// Tick interval in seconds
    #[arg(long, default_value_t = 5)]
    interval_secs: u64,

    /// Fraction of balance risked per trade
    #[arg(long, default_value_t = 0.02)]
    risk_per_trade: f64,

    /// Max concurrent positions
    #[arg(long, default_value_t = 10)]
    max_positions: usize,

    /// Disable the external sentiment collaborator
    #[arg(long, default_value_t = false)]
    no_sentiment: bool,

    /// Use the live (non-paper) endpoint of the real broker
    #[arg(long, default_value_t = false)]
    live: bool,
}

fn setup_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tradebot=info".into()),
        )
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    setup_logging();

    let args = Args::parse();
    let kind: BrokerKind = args
        .broker
        .parse()
        .with_context(|| format!("unsupported --broker value: {}", args.broker))?;

    tracing::info!("🚀 TradeBot starting ({} broker)", kind.as_str());

    let broker = BrokerConfig {
        kind,
        api_key_id: std::env::var("ALPACA_API_KEY_ID").ok(),
        api_secret: std::env::var("ALPACA_API_SECRET").ok(),
        paper: !args.live,
        base_url: std::env::var("ALPACA_BASE_URL").ok(),
        simulated_balance: std::env::var("SIMULATED_BALANCE")
            .ok()
            .and_then(|v| v.parse::<f64>().ok()),
    };

    let mut config = TradingConfig {
        risk_per_trade: args.risk_per_trade,
        enable_sentiment: !args.no_sentiment,
        limits: RiskLimits {
            max_positions: args.max_positions,
            ..Default::default()
        },
        tick_interval: std::time::Duration::from_secs(args.interval_secs),
        broker,
        database_url: std::env::var("DATABASE_URL").ok(),
        ..Default::default()
    };
    if !args.symbols.is_empty() {
        config.symbols = args.symbols.clone();
    }

    tracing::info!("📊 Configuration:");
    tracing::info!("  Risk per trade: {}%", config.risk_per_trade * 100.0);
    tracing::info!("  Max positions: {}", config.limits.max_positions);
    tracing::info!("  Tick interval: {:?}", config.tick_interval);
    tracing::info!("  Symbols: {}", config.symbols.join(", "));

    let engine = TradingEngine::new(config);
    engine.initialize().await;

    // Relay lifecycle events the way a serving layer would
    let mut events = engine.subscribe_events();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                EngineEvent::TradingStarted => tracing::info!("event: trading_started"),
                EngineEvent::TradingStopped => tracing::info!("event: trading_stopped"),
                EngineEvent::TradingError { message } => {
                    tracing::error!("event: trading_error - {}", message)
                }
            }
        }
    });

    engine.start_trading(ConfigOverrides::default()).await?;

    tracing::info!("Press Ctrl+C to stop...");
    tokio::signal::ctrl_c().await?;

    tracing::info!("⚠️  Received Ctrl+C, shutting down...");
    engine.stop_trading().await;

    tracing::info!("👋 TradeBot stopped");
    Ok(())
}
