// Execution broker module: capability interface, adapters, registry
pub mod alpaca;
pub mod candles;
pub mod paper;

pub use alpaca::AlpacaBroker;
pub use candles::CandleWindow;
pub use paper::PaperBroker;

use std::collections::HashMap;
use std::str::FromStr;

use crate::error::{BrokerError, EngineError};
use crate::models::{MarketSnapshot, OrderKind, Position, Trade, TradeSide};

/// Capability interface for order execution back-ends
///
/// `connect()` must succeed before any other operation is invoked. Every
/// operation is independently atomic: a failed call leaves balance and
/// positions exactly as they were.
#[allow(async_fn_in_trait)]
pub trait ExecutionBroker {
    async fn connect(&mut self) -> Result<(), BrokerError>;
    async fn get_balance(&self) -> Result<f64, BrokerError>;
    async fn place_order(
        &mut self,
        symbol: &str,
        side: TradeSide,
        quantity: f64,
        kind: OrderKind,
    ) -> Result<Trade, BrokerError>;
    async fn get_positions(&self) -> Result<Vec<Position>, BrokerError>;
    async fn close_position(&mut self, symbol: &str) -> Result<Trade, BrokerError>;
    async fn get_market_data(&mut self, symbol: &str) -> Result<MarketSnapshot, BrokerError>;
}

/// Identifier of a registered broker implementation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BrokerKind {
    #[default]
    Paper,
    Alpaca,
}

impl BrokerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BrokerKind::Paper => "paper",
            BrokerKind::Alpaca => "alpaca",
        }
    }
}

impl FromStr for BrokerKind {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "paper" => Ok(BrokerKind::Paper),
            "alpaca" => Ok(BrokerKind::Alpaca),
            other => Err(EngineError::UnknownBroker(other.to_string())),
        }
    }
}

/// Recognized broker configuration options
///
/// Unset optional fields take broker-specific defaults (the simulated
/// balance defaults to 100 000, Alpaca endpoints to the paper/live URLs).
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    pub kind: BrokerKind,
    pub api_key_id: Option<String>,
    pub api_secret: Option<String>,
    pub paper: bool,
    pub base_url: Option<String>,
    pub simulated_balance: Option<f64>,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            kind: BrokerKind::Paper,
            api_key_id: None,
            api_secret: None,
            paper: true,
            base_url: None,
            simulated_balance: None,
        }
    }
}

/// All broker variants behind one concrete type
///
/// The engine owns exactly one of these; the enum keeps dispatch static
/// while every variant honors the same `ExecutionBroker` contract.
pub enum Broker {
    Paper(PaperBroker),
    Alpaca(AlpacaBroker),
}

impl ExecutionBroker for Broker {
    async fn connect(&mut self) -> Result<(), BrokerError> {
        match self {
            Broker::Paper(b) => b.connect().await,
            Broker::Alpaca(b) => b.connect().await,
        }
    }

    async fn get_balance(&self) -> Result<f64, BrokerError> {
        match self {
            Broker::Paper(b) => b.get_balance().await,
            Broker::Alpaca(b) => b.get_balance().await,
        }
    }

    async fn place_order(
        &mut self,
        symbol: &str,
        side: TradeSide,
        quantity: f64,
        kind: OrderKind,
    ) -> Result<Trade, BrokerError> {
        match self {
            Broker::Paper(b) => b.place_order(symbol, side, quantity, kind).await,
            Broker::Alpaca(b) => b.place_order(symbol, side, quantity, kind).await,
        }
    }

    async fn get_positions(&self) -> Result<Vec<Position>, BrokerError> {
        match self {
            Broker::Paper(b) => b.get_positions().await,
            Broker::Alpaca(b) => b.get_positions().await,
        }
    }

    async fn close_position(&mut self, symbol: &str) -> Result<Trade, BrokerError> {
        match self {
            Broker::Paper(b) => b.close_position(symbol).await,
            Broker::Alpaca(b) => b.close_position(symbol).await,
        }
    }

    async fn get_market_data(&mut self, symbol: &str) -> Result<MarketSnapshot, BrokerError> {
        match self {
            Broker::Paper(b) => b.get_market_data(symbol).await,
            Broker::Alpaca(b) => b.get_market_data(symbol).await,
        }
    }
}

type BrokerCtor = fn(&BrokerConfig) -> Broker;

/// Explicit registry mapping a broker kind to its constructor
///
/// Populated by static registration at startup; replaces any notion of
/// discovering implementations at runtime.
pub struct BrokerRegistry {
    ctors: HashMap<BrokerKind, BrokerCtor>,
}

impl BrokerRegistry {
    pub fn new() -> Self {
        Self {
            ctors: HashMap::new(),
        }
    }

    /// Registry holding every built-in broker
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(BrokerKind::Paper, |config| {
            Broker::Paper(PaperBroker::new(config))
        });
        registry.register(BrokerKind::Alpaca, |config| {
            Broker::Alpaca(AlpacaBroker::new(config))
        });
        registry
    }

    pub fn register(&mut self, kind: BrokerKind, ctor: BrokerCtor) {
        self.ctors.insert(kind, ctor);
    }

    /// Construct a broker for the configured kind (not yet connected)
    pub fn build(&self, config: &BrokerConfig) -> Result<Broker, EngineError> {
        let ctor = self
            .ctors
            .get(&config.kind)
            .ok_or_else(|| EngineError::UnknownBroker(config.kind.as_str().to_string()))?;
        Ok(ctor(config))
    }
}

impl Default for BrokerRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}
