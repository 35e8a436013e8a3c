use std::collections::HashMap;

use chrono::{Duration, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::candles::CandleWindow;
use super::{BrokerConfig, ExecutionBroker};
use crate::error::BrokerError;
use crate::models::{
    Candle, MarketSnapshot, OrderKind, Position, Trade, TradeSide,
};

/// Paper money balance when the config leaves it unset
pub const DEFAULT_SIMULATED_BALANCE: f64 = 100_000.0;

/// Candles seeded on first request for a symbol
const SEED_CANDLES: usize = 100;

/// Bounded history window per symbol
const MAX_CANDLES: usize = 200;

/// Candle spacing of the simulated market
const CANDLE_SPACING_SECS: i64 = 60;

struct SymbolMarket {
    window: CandleWindow,
    last_price: f64,
}

/// Simulated (paper) broker
///
/// Owns a synthetic exchange account and fills every order synchronously at
/// the last known price with no slippage model. Market data is a random walk
/// seeded on the first request for each symbol and advanced by one candle on
/// every later request.
pub struct PaperBroker {
    connected: bool,
    balance: f64,
    positions: HashMap<String, Position>,
    orders: Vec<Trade>,
    markets: HashMap<String, SymbolMarket>,
    rng: StdRng,
}

impl PaperBroker {
    pub fn new(config: &BrokerConfig) -> Self {
        Self::with_balance(
            config
                .simulated_balance
                .unwrap_or(DEFAULT_SIMULATED_BALANCE),
        )
    }

    pub fn with_balance(balance: f64) -> Self {
        Self {
            connected: false,
            balance,
            positions: HashMap::new(),
            orders: Vec::new(),
            markets: HashMap::new(),
            rng: StdRng::from_entropy(),
        }
    }

    /// Deterministic market walk for tests
    pub fn with_seed(balance: f64, seed: u64) -> Self {
        Self {
            connected: false,
            balance,
            positions: HashMap::new(),
            orders: Vec::new(),
            markets: HashMap::new(),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Every filled order, oldest first
    pub fn order_history(&self) -> &[Trade] {
        &self.orders
    }

    fn ensure_connected(&self) -> Result<(), BrokerError> {
        if self.connected {
            Ok(())
        } else {
            Err(BrokerError::NotConnected)
        }
    }

    fn next_candle(rng: &mut StdRng, symbol: &str, open: f64, age: usize) -> Candle {
        let change = (rng.gen::<f64>() - 0.5) * 2.0; // Random change -1 to +1
        let close = open + change;
        let high = open.max(close) + rng.gen::<f64>();
        let low = (open.min(close) - rng.gen::<f64>()).max(0.01);
        let volume = rng.gen::<f64>() * 10_000.0;

        Candle {
            symbol: symbol.to_string(),
            timestamp: Utc::now() - Duration::seconds(age as i64 * CANDLE_SPACING_SECS),
            open,
            high,
            low,
            close: close.max(0.01),
            volume,
        }
    }

    /// Seed a fresh walk on first sight of a symbol, otherwise advance it
    fn refresh_market(&mut self, symbol: &str) {
        match self.markets.get_mut(symbol) {
            Some(market) => {
                let open = market.last_price;
                let candle = Self::next_candle(&mut self.rng, symbol, open, 0);
                market.last_price = candle.close;
                market.window.push(candle);
            }
            None => {
                let mut window = CandleWindow::new(MAX_CANDLES);
                let mut price = 100.0 + self.rng.gen::<f64>() * 50.0;

                for i in 0..SEED_CANDLES {
                    let candle =
                        Self::next_candle(&mut self.rng, symbol, price, SEED_CANDLES - 1 - i);
                    price = candle.close;
                    window.push(candle);
                }

                self.markets.insert(
                    symbol.to_string(),
                    SymbolMarket {
                        window,
                        last_price: price,
                    },
                );
            }
        }
    }

    fn last_price(&self, symbol: &str) -> Result<f64, BrokerError> {
        self.markets
            .get(symbol)
            .map(|m| m.last_price)
            .ok_or_else(|| {
                BrokerError::OrderRejected(format!("no market data for {}", symbol))
            })
    }

    fn fill_buy(&mut self, symbol: &str, quantity: f64, price: f64) -> Trade {
        self.balance -= quantity * price;

        let position = self
            .positions
            .entry(symbol.to_string())
            .or_insert_with(|| Position {
                symbol: symbol.to_string(),
                quantity: 0.0,
                avg_price: 0.0,
            });

        let total_cost = position.avg_price * position.quantity + price * quantity;
        position.quantity += quantity;
        position.avg_price = total_cost / position.quantity;

        let trade = Trade::filled(symbol, TradeSide::Buy, quantity, price);
        self.orders.push(trade.clone());
        trade
    }

    fn fill_liquidation(&mut self, symbol: &str, price: f64) -> Result<Trade, BrokerError> {
        let position = self
            .positions
            .remove(symbol)
            .ok_or_else(|| BrokerError::NoPosition(symbol.to_string()))?;

        self.balance += position.quantity * price;

        let trade = Trade::filled(symbol, TradeSide::Sell, position.quantity, price);
        self.orders.push(trade.clone());
        Ok(trade)
    }
}

impl ExecutionBroker for PaperBroker {
    async fn connect(&mut self) -> Result<(), BrokerError> {
        self.connected = true;
        tracing::info!("Paper broker connected (balance ${:.2})", self.balance);
        Ok(())
    }

    async fn get_balance(&self) -> Result<f64, BrokerError> {
        self.ensure_connected()?;
        Ok(self.balance)
    }

    async fn place_order(
        &mut self,
        symbol: &str,
        side: TradeSide,
        quantity: f64,
        _kind: OrderKind,
    ) -> Result<Trade, BrokerError> {
        self.ensure_connected()?;

        if !(quantity > 0.0) {
            return Err(BrokerError::OrderRejected(format!(
                "quantity must be positive, got {}",
                quantity
            )));
        }

        let price = self.last_price(symbol)?;

        match side {
            TradeSide::Buy => {
                // Validate before touching the account so a rejection leaves
                // balance and positions unchanged
                let cost = quantity * price;
                if cost > self.balance {
                    return Err(BrokerError::OrderRejected(format!(
                        "insufficient balance: order ${:.2}, available ${:.2}",
                        cost, self.balance
                    )));
                }

                Ok(self.fill_buy(symbol, quantity, price))
            }
            TradeSide::Sell => {
                let position = self
                    .positions
                    .get(symbol)
                    .ok_or_else(|| BrokerError::NoPosition(symbol.to_string()))?;

                // No partial exits: a SELL always liquidates the full position
                if (quantity - position.quantity).abs() > 1e-9 {
                    return Err(BrokerError::OrderRejected(format!(
                        "partial sells are not supported: position holds {}, order asked {}",
                        position.quantity, quantity
                    )));
                }

                self.fill_liquidation(symbol, price)
            }
        }
    }

    async fn get_positions(&self) -> Result<Vec<Position>, BrokerError> {
        self.ensure_connected()?;

        let mut positions: Vec<Position> = self.positions.values().cloned().collect();
        positions.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        Ok(positions)
    }

    async fn close_position(&mut self, symbol: &str) -> Result<Trade, BrokerError> {
        self.ensure_connected()?;

        if !self.positions.contains_key(symbol) {
            return Err(BrokerError::NoPosition(symbol.to_string()));
        }

        let price = self.last_price(symbol)?;
        self.fill_liquidation(symbol, price)
    }

    async fn get_market_data(&mut self, symbol: &str) -> Result<MarketSnapshot, BrokerError> {
        self.ensure_connected()?;

        self.refresh_market(symbol);

        let market = &self.markets[symbol];
        let last = market
            .window
            .last()
            .ok_or_else(|| BrokerError::InvalidResponse("empty candle window".to_string()))?;

        Ok(MarketSnapshot {
            symbol: symbol.to_string(),
            price: market.last_price,
            bid: market.last_price - 0.01,
            ask: market.last_price + 0.01,
            volume: last.volume,
            candles: market.window.snapshot(),
            last_update: Utc::now(),
        })
    }
}
