// Persistence gateway module
//
// Fire-and-forget storage of trades, signals and market data. The engine
// never blocks on this layer: failures are logged by the caller and the
// in-memory effect is retained.

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use crate::models::{FusedSignal, IndicatorSet, MarketSnapshot, SentimentScore, Trade};
use crate::Result;

/// Postgres persistence for trades and signals
pub struct PostgresGateway {
    pool: PgPool,
}

impl PostgresGateway {
    /// Connect to Postgres and run pending migrations
    pub async fn new(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        tracing::info!("Connected to Postgres at {}", database_url);

        Ok(Self { pool })
    }

    /// Store an executed trade
    pub async fn store_trade(&self, trade: &Trade) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO trades (id, symbol, side, quantity, price, executed_at, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(trade.id)
        .bind(&trade.symbol)
        .bind(trade.side.as_str())
        .bind(trade.quantity)
        .bind(trade.price)
        .bind(trade.timestamp)
        .bind(trade.status.as_str())
        .execute(&self.pool)
        .await?;

        tracing::debug!(
            "Stored trade {} {} {} @ {}",
            trade.symbol,
            trade.side.as_str(),
            trade.quantity,
            trade.price
        );

        Ok(())
    }

    /// Store a fused signal with the indicator values behind it
    pub async fn store_signal(
        &self,
        symbol: &str,
        signal: &FusedSignal,
        indicators: &IndicatorSet,
        sentiment: &SentimentScore,
    ) -> Result<()> {
        let indicators_json = serde_json::to_value(indicators)?;

        sqlx::query(
            r#"
            INSERT INTO trading_signals (symbol, signal_type, strength, indicators, sentiment_score)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(symbol)
        .bind(signal.action.as_str())
        .bind(signal.confidence)
        .bind(indicators_json)
        .bind(sentiment.score)
        .execute(&self.pool)
        .await?;

        tracing::debug!(
            "Stored trading signal for {}: {} ({:.3})",
            symbol,
            signal.action.as_str(),
            signal.confidence
        );

        Ok(())
    }

    /// Store one market snapshot row
    pub async fn store_market_data(&self, snapshot: &MarketSnapshot) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO market_data (time, symbol, price, volume, bid, ask)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(snapshot.last_update)
        .bind(&snapshot.symbol)
        .bind(snapshot.price)
        .bind(snapshot.volume)
        .bind(snapshot.bid)
        .bind(snapshot.ask)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
