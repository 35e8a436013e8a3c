use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use super::{BrokerConfig, ExecutionBroker};
use crate::error::BrokerError;
use crate::models::{
    Candle, MarketSnapshot, OrderKind, Position, Trade, TradeSide, TradeStatus,
};

// Alpaca Trading API v2
// Docs: https://docs.alpaca.markets/reference
const PAPER_TRADING_API: &str = "https://paper-api.alpaca.markets";
const LIVE_TRADING_API: &str = "https://api.alpaca.markets";
const MARKET_DATA_API: &str = "https://data.alpaca.markets";

const KEY_HEADER: &str = "APCA-API-KEY-ID";
const SECRET_HEADER: &str = "APCA-API-SECRET-KEY";

/// Real brokerage adapter delegating to the Alpaca REST API
pub struct AlpacaBroker {
    client: Client,
    api_key_id: String,
    api_secret: String,
    base_url: String,
    data_url: String,
    connected: bool,
}

#[derive(Debug, Deserialize)]
struct AccountResponse {
    cash: String,
}

#[derive(Debug, Deserialize)]
struct OrderResponse {
    id: String,
    symbol: String,
    side: String,
    status: String,
    #[serde(default)]
    filled_qty: Option<String>,
    #[serde(default)]
    qty: Option<String>,
    #[serde(default)]
    filled_avg_price: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PositionResponse {
    symbol: String,
    qty: String,
    avg_entry_price: String,
}

#[derive(Debug, Deserialize)]
struct BarsResponse {
    #[serde(default)]
    bars: Vec<Bar>,
}

#[derive(Debug, Deserialize)]
struct Bar {
    t: DateTime<Utc>,
    o: f64,
    h: f64,
    l: f64,
    c: f64,
    v: f64,
}

#[derive(Debug, Deserialize)]
struct LatestQuoteResponse {
    quote: LatestQuote,
}

#[derive(Debug, Deserialize)]
struct LatestQuote {
    bp: f64,
    ap: f64,
}

fn parse_amount(raw: &str, field: &str) -> Result<f64, BrokerError> {
    raw.parse::<f64>()
        .map_err(|_| BrokerError::InvalidResponse(format!("{} is not numeric: {}", field, raw)))
}

impl AlpacaBroker {
    pub fn new(config: &BrokerConfig) -> Self {
        let default_base = if config.paper {
            PAPER_TRADING_API
        } else {
            LIVE_TRADING_API
        };

        Self {
            client: Client::new(),
            api_key_id: config.api_key_id.clone().unwrap_or_default(),
            api_secret: config.api_secret.clone().unwrap_or_default(),
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| default_base.to_string()),
            data_url: MARKET_DATA_API.to_string(),
            connected: false,
        }
    }

    /// Override both endpoints (tests point these at a mock server)
    pub fn with_endpoints(mut self, base_url: &str, data_url: &str) -> Self {
        self.base_url = base_url.to_string();
        self.data_url = data_url.to_string();
        self
    }

    fn ensure_connected(&self) -> Result<(), BrokerError> {
        if self.connected {
            Ok(())
        } else {
            Err(BrokerError::NotConnected)
        }
    }

    fn get(&self, url: &str) -> reqwest::RequestBuilder {
        self.client
            .get(url)
            .header(KEY_HEADER, &self.api_key_id)
            .header(SECRET_HEADER, &self.api_secret)
    }

    async fn fetch_account(&self) -> Result<AccountResponse, BrokerError> {
        let url = format!("{}/v2/account", self.base_url);
        let response = self.get(&url).send().await?;

        if !response.status().is_success() {
            return Err(BrokerError::InvalidResponse(format!(
                "account request returned {}",
                response.status()
            )));
        }

        Ok(response.json().await?)
    }

    fn order_to_trade(&self, order: OrderResponse) -> Result<Trade, BrokerError> {
        if order.status == "rejected" {
            return Err(BrokerError::OrderRejected(format!(
                "{} order for {} rejected by Alpaca",
                order.side, order.symbol
            )));
        }

        let quantity_raw = order
            .filled_qty
            .as_deref()
            .filter(|q| *q != "0")
            .or(order.qty.as_deref())
            .unwrap_or("0");
        let quantity = parse_amount(quantity_raw, "qty")?;
        let price = match order.filled_avg_price.as_deref() {
            Some(raw) => parse_amount(raw, "filled_avg_price")?,
            None => 0.0,
        };

        let side = match order.side.as_str() {
            "buy" => TradeSide::Buy,
            "sell" => TradeSide::Sell,
            other => {
                return Err(BrokerError::InvalidResponse(format!(
                    "unknown order side: {}",
                    other
                )))
            }
        };

        Ok(Trade {
            id: Uuid::parse_str(&order.id).unwrap_or_else(|_| Uuid::new_v4()),
            symbol: order.symbol,
            side,
            quantity,
            price,
            timestamp: Utc::now(),
            status: TradeStatus::Filled,
        })
    }
}

impl ExecutionBroker for AlpacaBroker {
    /// Authenticate by fetching the account; nothing else may run before this
    async fn connect(&mut self) -> Result<(), BrokerError> {
        let url = format!("{}/v2/account", self.base_url);
        let response = self
            .get(&url)
            .send()
            .await
            .map_err(|e| BrokerError::Connectivity(e.to_string()))?;

        if !response.status().is_success() {
            return Err(BrokerError::Connectivity(format!(
                "Alpaca authentication failed: {}",
                response.status()
            )));
        }

        self.connected = true;
        tracing::info!("Alpaca broker connected at {}", self.base_url);
        Ok(())
    }

    async fn get_balance(&self) -> Result<f64, BrokerError> {
        self.ensure_connected()?;

        let account = self.fetch_account().await?;
        parse_amount(&account.cash, "cash")
    }

    async fn place_order(
        &mut self,
        symbol: &str,
        side: TradeSide,
        quantity: f64,
        kind: OrderKind,
    ) -> Result<Trade, BrokerError> {
        self.ensure_connected()?;

        let url = format!("{}/v2/orders", self.base_url);
        let body = json!({
            "symbol": symbol,
            "qty": format!("{}", quantity),
            "side": match side {
                TradeSide::Buy => "buy",
                TradeSide::Sell => "sell",
            },
            "type": match kind {
                OrderKind::Market => "market",
                OrderKind::Limit => "limit",
            },
            "time_in_force": "day",
        });

        let response = self
            .client
            .post(&url)
            .header(KEY_HEADER, &self.api_key_id)
            .header(SECRET_HEADER, &self.api_secret)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            return Err(BrokerError::OrderRejected(format!(
                "{}: {}",
                status, detail
            )));
        }

        self.order_to_trade(response.json().await?)
    }

    async fn get_positions(&self) -> Result<Vec<Position>, BrokerError> {
        self.ensure_connected()?;

        let url = format!("{}/v2/positions", self.base_url);
        let response = self.get(&url).send().await?;

        if !response.status().is_success() {
            return Err(BrokerError::InvalidResponse(format!(
                "positions request returned {}",
                response.status()
            )));
        }

        let raw: Vec<PositionResponse> = response.json().await?;

        raw.into_iter()
            .map(|p| {
                Ok(Position {
                    quantity: parse_amount(&p.qty, "qty")?,
                    avg_price: parse_amount(&p.avg_entry_price, "avg_entry_price")?,
                    symbol: p.symbol,
                })
            })
            .collect()
    }

    async fn close_position(&mut self, symbol: &str) -> Result<Trade, BrokerError> {
        self.ensure_connected()?;

        let url = format!("{}/v2/positions/{}", self.base_url, symbol);
        let response = self
            .client
            .delete(&url)
            .header(KEY_HEADER, &self.api_key_id)
            .header(SECRET_HEADER, &self.api_secret)
            .send()
            .await?;

        if response.status().as_u16() == 404 {
            return Err(BrokerError::NoPosition(symbol.to_string()));
        }
        if !response.status().is_success() {
            return Err(BrokerError::OrderRejected(format!(
                "close {} returned {}",
                symbol,
                response.status()
            )));
        }

        self.order_to_trade(response.json().await?)
    }

    async fn get_market_data(&mut self, symbol: &str) -> Result<MarketSnapshot, BrokerError> {
        self.ensure_connected()?;

        let bars_url = format!(
            "{}/v2/stocks/{}/bars?timeframe=1Min&limit=100",
            self.data_url, symbol
        );
        let bars: BarsResponse = self.get(&bars_url).send().await?.json().await?;

        let quote_url = format!("{}/v2/stocks/{}/quotes/latest", self.data_url, symbol);
        let quote: LatestQuoteResponse = self.get(&quote_url).send().await?.json().await?;

        let candles: Vec<Candle> = bars
            .bars
            .into_iter()
            .map(|b| Candle {
                symbol: symbol.to_string(),
                timestamp: b.t,
                open: b.o,
                high: b.h,
                low: b.l,
                close: b.c,
                volume: b.v,
            })
            .collect();

        let last = candles
            .last()
            .ok_or_else(|| BrokerError::InvalidResponse(format!("no bars for {}", symbol)))?;

        Ok(MarketSnapshot {
            symbol: symbol.to_string(),
            price: last.close,
            bid: quote.quote.bp,
            ask: quote.quote.ap,
            volume: last.volume,
            candles: candles.clone(),
            last_update: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::BrokerKind;

    fn broker_for(server: &mockito::ServerGuard) -> AlpacaBroker {
        let config = BrokerConfig {
            kind: BrokerKind::Alpaca,
            api_key_id: Some("key".to_string()),
            api_secret: Some("secret".to_string()),
            ..Default::default()
        };
        AlpacaBroker::new(&config).with_endpoints(&server.url(), &server.url())
    }

    #[tokio::test]
    async fn test_connect_and_balance() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/v2/account")
            .match_header(KEY_HEADER, "key")
            .with_status(200)
            .with_body(r#"{"cash": "100000.25", "status": "ACTIVE"}"#)
            .expect_at_least(2)
            .create_async()
            .await;

        let mut broker = broker_for(&server);
        broker.connect().await.unwrap();

        let balance = broker.get_balance().await.unwrap();
        assert!((balance - 100_000.25).abs() < 1e-9);

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_failed_auth_is_connectivity_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/v2/account")
            .with_status(401)
            .create_async()
            .await;

        let mut broker = broker_for(&server);
        let result = broker.connect().await;

        assert!(matches!(result, Err(BrokerError::Connectivity(_))));
        // Connection never established, other operations stay gated
        assert!(matches!(
            broker.get_balance().await,
            Err(BrokerError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn test_place_order_maps_to_trade() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/v2/account")
            .with_status(200)
            .with_body(r#"{"cash": "100000"}"#)
            .create_async()
            .await;
        server
            .mock("POST", "/v2/orders")
            .with_status(200)
            .with_body(
                r#"{
                    "id": "61e69015-8549-4bfd-b9c3-01e75843f47d",
                    "symbol": "AAPL",
                    "side": "buy",
                    "status": "filled",
                    "filled_qty": "5",
                    "filled_avg_price": "182.4"
                }"#,
            )
            .create_async()
            .await;

        let mut broker = broker_for(&server);
        broker.connect().await.unwrap();

        let trade = broker
            .place_order("AAPL", TradeSide::Buy, 5.0, OrderKind::Market)
            .await
            .unwrap();

        assert_eq!(trade.symbol, "AAPL");
        assert_eq!(trade.side, TradeSide::Buy);
        assert_eq!(trade.quantity, 5.0);
        assert!((trade.price - 182.4).abs() < 1e-9);
        assert_eq!(trade.status, TradeStatus::Filled);
    }

    #[tokio::test]
    async fn test_missing_position_maps_to_no_position() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/v2/account")
            .with_status(200)
            .with_body(r#"{"cash": "100000"}"#)
            .create_async()
            .await;
        server
            .mock("DELETE", "/v2/positions/AAPL")
            .with_status(404)
            .create_async()
            .await;

        let mut broker = broker_for(&server);
        broker.connect().await.unwrap();

        let result = broker.close_position("AAPL").await;
        assert!(matches!(result, Err(BrokerError::NoPosition(_))));
    }

    #[tokio::test]
    async fn test_get_positions_parses_payload() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/v2/account")
            .with_status(200)
            .with_body(r#"{"cash": "100000"}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/v2/positions")
            .with_status(200)
            .with_body(
                r#"[{"symbol": "AAPL", "qty": "5", "avg_entry_price": "180.2"}]"#,
            )
            .create_async()
            .await;

        let mut broker = broker_for(&server);
        broker.connect().await.unwrap();

        let positions = broker.get_positions().await.unwrap();
        assert_eq!(positions.len(), 1);
        assert_eq!(positions[0].symbol, "AAPL");
        assert_eq!(positions[0].quantity, 5.0);
        assert!((positions[0].avg_price - 180.2).abs() < 1e-9);
    }
}
