// Core modules
pub mod broker;
pub mod engine;
pub mod error;
pub mod fusion;
pub mod indicators;
pub mod models;
pub mod persistence;
pub mod risk;
pub mod sentiment;

// Re-export commonly used types
pub use broker::{Broker, BrokerConfig, BrokerKind, BrokerRegistry, ExecutionBroker};
pub use engine::{ConfigOverrides, EngineEvent, TradingConfig, TradingEngine};
pub use error::{BrokerError, EngineError};
pub use models::*;

// Error handling
pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;
