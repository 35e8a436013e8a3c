// Trading engine module
// State machine (Stopped <-> Running) plus the periodic evaluation loop:
// market data -> indicators -> fusion -> sizing -> execution -> persistence

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::broker::{Broker, BrokerConfig, BrokerRegistry, ExecutionBroker};
use crate::error::{BrokerError, EngineError};
use crate::fusion;
use crate::indicators;
use crate::models::{
    FusedSignal, IndicatorSet, MarketSnapshot, OrderKind, Position, SentimentScore, Trade,
    TradeAction, TradeSide,
};
use crate::persistence::PostgresGateway;
use crate::risk::{AccountState, RiskLimits, RiskSizer, SizingDecision};
use crate::sentiment::SentimentClient;

/// Tick cadence of the evaluation loop
pub const TICK_INTERVAL: Duration = Duration::from_secs(5);

/// Minimum candle history before a symbol is evaluated at all
const MIN_TICK_HISTORY: usize = 50;

/// Symbol universe tracked when the config does not name one
const DEFAULT_SYMBOLS: &[&str] = &["AAPL", "GOOGL", "MSFT", "TSLA", "AMZN"];

/// Engine configuration
///
/// `stop_loss` and `take_profit` are accepted and carried with the config but
/// are not consulted by the tick loop; limit enforcement happens in the sizer.
#[derive(Debug, Clone)]
pub struct TradingConfig {
    pub symbols: Vec<String>,
    pub risk_per_trade: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub enable_sentiment: bool,
    pub limits: RiskLimits,
    pub tick_interval: Duration,
    pub broker: BrokerConfig,
    pub database_url: Option<String>,
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self {
            symbols: DEFAULT_SYMBOLS.iter().map(|s| s.to_string()).collect(),
            risk_per_trade: 0.02,
            stop_loss: 0.02,
            take_profit: 0.04,
            enable_sentiment: true,
            limits: RiskLimits::default(),
            tick_interval: TICK_INTERVAL,
            broker: BrokerConfig::default(),
            database_url: None,
        }
    }
}

/// Partial configuration merged into the engine config by `start_trading`
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub symbols: Option<Vec<String>>,
    pub risk_per_trade: Option<f64>,
    pub max_positions: Option<usize>,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
    pub enable_sentiment: Option<bool>,
    pub broker: Option<BrokerConfig>,
}

impl ConfigOverrides {
    fn apply(&self, config: &mut TradingConfig) {
        if let Some(symbols) = &self.symbols {
            config.symbols = symbols.clone();
        }
        if let Some(risk_per_trade) = self.risk_per_trade {
            config.risk_per_trade = risk_per_trade;
        }
        if let Some(max_positions) = self.max_positions {
            config.limits.max_positions = max_positions;
        }
        if let Some(stop_loss) = self.stop_loss {
            config.stop_loss = stop_loss;
        }
        if let Some(take_profit) = self.take_profit {
            config.take_profit = take_profit;
        }
        if let Some(enable_sentiment) = self.enable_sentiment {
            config.enable_sentiment = enable_sentiment;
        }
        if let Some(broker) = &self.broker {
            config.broker = broker.clone();
        }
    }
}

/// Lifecycle notifications relayed to the serving layer
#[derive(Debug, Clone)]
pub enum EngineEvent {
    TradingStarted,
    TradingStopped,
    TradingError { message: String },
}

/// The decision engine
///
/// Owns the broker, the market-data map and the order history exclusively;
/// external callers only ever receive owned snapshots through the query
/// operations. Multiple independent engines can coexist in one process.
pub struct TradingEngine {
    config: std::sync::Mutex<TradingConfig>,
    registry: BrokerRegistry,
    broker: tokio::sync::Mutex<Option<Broker>>,
    market_data: std::sync::RwLock<HashMap<String, MarketSnapshot>>,
    orders: std::sync::Mutex<Vec<Trade>>,
    sentiment: std::sync::Mutex<Option<SentimentClient>>,
    persistence: std::sync::Mutex<Option<Arc<PostgresGateway>>>,
    peak_equity: std::sync::Mutex<f64>,
    events: broadcast::Sender<EngineEvent>,
    running: AtomicBool,
    tick_count: AtomicU64,
    stop_tx: std::sync::Mutex<Option<watch::Sender<bool>>>,
    loop_handle: tokio::sync::Mutex<Option<JoinHandle<()>>>,
}

impl TradingEngine {
    pub fn new(config: TradingConfig) -> Arc<Self> {
        let (events, _) = broadcast::channel(64);

        Arc::new(Self {
            config: std::sync::Mutex::new(config),
            registry: BrokerRegistry::builtin(),
            broker: tokio::sync::Mutex::new(None),
            market_data: std::sync::RwLock::new(HashMap::new()),
            orders: std::sync::Mutex::new(Vec::new()),
            sentiment: std::sync::Mutex::new(None),
            persistence: std::sync::Mutex::new(None),
            peak_equity: std::sync::Mutex::new(0.0),
            events,
            running: AtomicBool::new(false),
            tick_count: AtomicU64::new(0),
            stop_tx: std::sync::Mutex::new(None),
            loop_handle: tokio::sync::Mutex::new(None),
        })
    }

    /// Wire up the optional collaborators before the first start
    ///
    /// A missing database or sentiment key degrades the engine (no
    /// persistence, neutral sentiment) instead of failing it.
    pub async fn initialize(&self) {
        tracing::info!("Initializing trading engine...");

        let database_url = self.config.lock().unwrap().database_url.clone();
        if let Some(url) = database_url {
            match PostgresGateway::new(&url).await {
                Ok(gateway) => {
                    *self.persistence.lock().unwrap() = Some(Arc::new(gateway));
                }
                Err(e) => {
                    tracing::warn!(
                        "Failed to connect to Postgres ({}), continuing without persistence",
                        e
                    );
                }
            }
        }

        let mut sentiment = self.sentiment.lock().unwrap();
        if sentiment.is_none() {
            *sentiment = SentimentClient::from_env();
        }
        drop(sentiment);

        tracing::info!("Trading engine initialized");
    }

    /// Replace the sentiment collaborator (tests point this at a mock server)
    pub fn set_sentiment_client(&self, client: SentimentClient) {
        *self.sentiment.lock().unwrap() = Some(client);
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Transition Stopped -> Running
    ///
    /// Merges the overrides, connects the configured broker (a connection
    /// failure is fatal to this attempt and leaves the engine Stopped),
    /// subscribes the symbol universe and starts the periodic tick. Calling
    /// this while Running fails without disturbing the live loop.
    pub async fn start_trading(
        self: &Arc<Self>,
        overrides: ConfigOverrides,
    ) -> Result<(), EngineError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(EngineError::AlreadyRunning);
        }

        let config = {
            let mut config = self.config.lock().unwrap();
            overrides.apply(&mut config);
            config.clone()
        };

        let mut broker = match self.registry.build(&config.broker) {
            Ok(broker) => broker,
            Err(e) => {
                self.running.store(false, Ordering::SeqCst);
                return Err(e);
            }
        };

        if let Err(e) = broker.connect().await {
            self.running.store(false, Ordering::SeqCst);
            let err = EngineError::from(e);
            self.emit_error(&format!("Failed to start trading: {}", err));
            return Err(err);
        }

        // Subscribe the symbol universe with initial snapshots
        for symbol in &config.symbols {
            match broker.get_market_data(symbol).await {
                Ok(snapshot) => {
                    self.persist_market_data(&snapshot);
                    self.market_data
                        .write()
                        .unwrap()
                        .insert(symbol.clone(), snapshot);
                    tracing::info!("Subscribed to {} market data", symbol);
                }
                Err(e) => {
                    tracing::error!("Failed to subscribe to {}: {}", symbol, e);
                }
            }
        }

        if let Ok(balance) = broker.get_balance().await {
            *self.peak_equity.lock().unwrap() = balance;
        }

        *self.broker.lock().await = Some(broker);

        // Fresh stop channel per run so no stale signal can leak into a
        // later start
        let (stop_tx, stop_rx) = watch::channel(false);
        *self.stop_tx.lock().unwrap() = Some(stop_tx);

        let engine = Arc::clone(self);
        let handle = tokio::spawn(async move {
            trading_loop(engine, stop_rx).await;
        });
        *self.loop_handle.lock().await = Some(handle);

        let _ = self.events.send(EngineEvent::TradingStarted);
        tracing::info!(
            "🚀 Trading started: {} symbols, tick every {:?}",
            config.symbols.len(),
            config.tick_interval
        );

        Ok(())
    }

    /// Transition Running -> Stopped; a no-op when already Stopped
    ///
    /// The cooperative stop flag is observed at tick boundaries only, so an
    /// in-flight tick always finishes before the loop exits.
    pub async fn stop_trading(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }

        if let Some(stop_tx) = self.stop_tx.lock().unwrap().take() {
            let _ = stop_tx.send(true);
        }

        if let Some(handle) = self.loop_handle.lock().await.take() {
            let _ = handle.await;
        }

        let _ = self.events.send(EngineEvent::TradingStopped);
        tracing::info!("Trading engine stopped");
    }

    // ========================================================================
    // Query operations (owned snapshots only)
    // ========================================================================

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Ticks completed since this engine was created
    pub fn tick_count(&self) -> u64 {
        self.tick_count.load(Ordering::SeqCst)
    }

    pub fn market_data(&self) -> HashMap<String, MarketSnapshot> {
        self.market_data.read().unwrap().clone()
    }

    pub fn market_snapshot(&self, symbol: &str) -> Option<MarketSnapshot> {
        self.market_data.read().unwrap().get(symbol).cloned()
    }

    pub async fn positions(&self) -> Vec<Position> {
        let guard = self.broker.lock().await;
        match guard.as_ref() {
            Some(broker) => broker.get_positions().await.unwrap_or_default(),
            None => Vec::new(),
        }
    }

    /// Every trade this engine executed, oldest first
    pub fn order_history(&self) -> Vec<Trade> {
        self.orders.lock().unwrap().clone()
    }

    // ========================================================================
    // Tick pipeline
    // ========================================================================

    async fn run_tick(&self) {
        let config = self.config.lock().unwrap().clone();

        for symbol in &config.symbols {
            if let Err(e) = self.process_symbol(symbol, &config).await {
                tracing::error!("{}: tick processing failed: {}", symbol, e);
                self.emit_error(&format!("{}: {}", symbol, e));
            }
        }
    }

    /// Evaluate and, if warranted, trade one symbol
    ///
    /// Failures bubble up to `run_tick`, which contains them so the rest of
    /// the universe still gets processed this tick.
    async fn process_symbol(
        &self,
        symbol: &str,
        config: &TradingConfig,
    ) -> Result<(), EngineError> {
        let snapshot = {
            let mut guard = self.broker.lock().await;
            let broker = guard.as_mut().ok_or(BrokerError::NotConnected)?;
            broker.get_market_data(symbol).await?
        };

        self.persist_market_data(&snapshot);

        let closes = snapshot.closes();
        let price = snapshot.price;

        // Replace the cached snapshot wholesale
        self.market_data
            .write()
            .unwrap()
            .insert(symbol.to_string(), snapshot);

        if closes.len() < MIN_TICK_HISTORY {
            tracing::debug!(
                "{}: {} candles collected, waiting for {}",
                symbol,
                closes.len(),
                MIN_TICK_HISTORY
            );
            return Ok(());
        }

        let indicator_set = indicators::compute_indicators(&closes);
        let subs = fusion::analyze(&indicator_set, price);

        let sentiment_client = if config.enable_sentiment {
            self.sentiment.lock().unwrap().clone()
        } else {
            None
        };
        let sentiment = match sentiment_client {
            Some(client) => client.analyze(symbol).await,
            None => SentimentScore::neutral(),
        };

        let fused = fusion::fuse(&subs, &sentiment);
        tracing::debug!(
            "{}: {} (confidence {:.3}) - {}",
            symbol,
            fused.action.as_str(),
            fused.confidence,
            fused.reason
        );

        if fused.action != TradeAction::Hold {
            self.execute_signal(symbol, &fused, price, config).await?;
        }

        self.persist_signal(symbol, &fused, &indicator_set, &sentiment);

        Ok(())
    }

    async fn execute_signal(
        &self,
        symbol: &str,
        signal: &FusedSignal,
        price: f64,
        config: &TradingConfig,
    ) -> Result<(), EngineError> {
        let mut guard = self.broker.lock().await;
        let broker = guard.as_mut().ok_or(BrokerError::NotConnected)?;

        match signal.action {
            TradeAction::Buy => {
                let balance = broker.get_balance().await?;
                let positions = broker.get_positions().await?;
                let exposure = self.exposure_of(&positions);

                let peak_equity = {
                    let mut peak = self.peak_equity.lock().unwrap();
                    let equity = balance + exposure;
                    if equity > *peak {
                        *peak = equity;
                    }
                    *peak
                };

                let state = AccountState {
                    balance,
                    open_positions: positions.len(),
                    exposure,
                    peak_equity,
                };

                let sizer = RiskSizer::new(config.risk_per_trade, config.limits.clone());
                match sizer.size_buy(&state, signal.confidence, price) {
                    SizingDecision::Approved {
                        quantity,
                        order_value,
                    } => {
                        let trade = broker
                            .place_order(symbol, TradeSide::Buy, quantity, OrderKind::Market)
                            .await?;
                        tracing::info!(
                            "Executed BUY order: {} {:.4} @ {:.4} (${:.2})",
                            symbol,
                            quantity,
                            price,
                            order_value
                        );
                        self.record_trade(trade);
                    }
                    SizingDecision::LimitExceeded(breach) => {
                        // A limit breach is a downgrade to HOLD, not a failure
                        tracing::info!(
                            "{}: BUY downgraded to HOLD ({})",
                            symbol,
                            breach.as_str()
                        );
                    }
                }
            }
            TradeAction::Sell => {
                let has_position = broker
                    .get_positions()
                    .await?
                    .iter()
                    .any(|p| p.symbol == symbol);

                if !has_position {
                    tracing::debug!("{}: SELL signal with no open position", symbol);
                    return Ok(());
                }

                let trade = broker.close_position(symbol).await?;
                tracing::info!(
                    "Executed SELL order: {} {:.4} @ {:.4}",
                    symbol,
                    trade.quantity,
                    trade.price
                );
                self.record_trade(trade);
            }
            TradeAction::Hold => {}
        }

        Ok(())
    }

    /// Market value of the open positions at the latest cached prices
    fn exposure_of(&self, positions: &[Position]) -> f64 {
        let market = self.market_data.read().unwrap();

        positions
            .iter()
            .map(|p| {
                let price = market
                    .get(&p.symbol)
                    .map(|s| s.price)
                    .unwrap_or(p.avg_price);
                p.quantity * price
            })
            .sum()
    }

    fn record_trade(&self, trade: Trade) {
        self.orders.lock().unwrap().push(trade.clone());
        self.persist_trade(trade);
    }

    fn emit_error(&self, message: &str) {
        let _ = self.events.send(EngineEvent::TradingError {
            message: message.to_string(),
        });
    }

    // ========================================================================
    // Fire-and-forget persistence
    // ========================================================================

    fn gateway(&self) -> Option<Arc<PostgresGateway>> {
        self.persistence.lock().unwrap().clone()
    }

    fn persist_trade(&self, trade: Trade) {
        let Some(gateway) = self.gateway() else { return };

        tokio::spawn(async move {
            if let Err(e) = gateway.store_trade(&trade).await {
                tracing::warn!("Failed to store trade {}: {}", trade.id, e);
            }
        });
    }

    fn persist_signal(
        &self,
        symbol: &str,
        signal: &FusedSignal,
        indicators: &IndicatorSet,
        sentiment: &SentimentScore,
    ) {
        let Some(gateway) = self.gateway() else { return };

        let symbol = symbol.to_string();
        let signal = signal.clone();
        let indicators = indicators.clone();
        let sentiment = *sentiment;

        tokio::spawn(async move {
            if let Err(e) = gateway
                .store_signal(&symbol, &signal, &indicators, &sentiment)
                .await
            {
                tracing::warn!("Failed to store trading signal for {}: {}", symbol, e);
            }
        });
    }

    fn persist_market_data(&self, snapshot: &MarketSnapshot) {
        let Some(gateway) = self.gateway() else { return };

        let snapshot = snapshot.clone();
        tokio::spawn(async move {
            if let Err(e) = gateway.store_market_data(&snapshot).await {
                tracing::warn!("Failed to store market data for {}: {}", snapshot.symbol, e);
            }
        });
    }
}

/// The periodic scheduler driving one engine
///
/// At most one tick executes at a time; when a tick overruns the interval the
/// missed firings are skipped, never queued. The stop flag is only observed
/// here, between ticks.
async fn trading_loop(engine: Arc<TradingEngine>, mut stop_rx: watch::Receiver<bool>) {
    let interval = engine.config.lock().unwrap().tick_interval;

    let mut ticker = interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = stop_rx.changed() => break,
        }

        if !engine.running.load(Ordering::SeqCst) {
            break;
        }

        let started = Instant::now();
        engine.run_tick().await;
        engine.tick_count.fetch_add(1, Ordering::SeqCst);

        let elapsed = started.elapsed();
        if elapsed > interval {
            tracing::warn!(
                "Tick took {:?}, longer than the {:?} interval; skipping missed ticks",
                elapsed,
                interval
            );
        }
    }
}
