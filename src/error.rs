use thiserror::Error;

/// Failures surfaced by broker implementations
#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("broker connection failed: {0}")]
    Connectivity(String),

    #[error("broker operation attempted before connect()")]
    NotConnected,

    #[error("order rejected: {0}")]
    OrderRejected(String),

    #[error("no open position for {0}")]
    NoPosition(String),

    #[error("malformed broker response: {0}")]
    InvalidResponse(String),

    #[error("broker request failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// Failures surfaced by the trading engine to the serving layer
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("trading engine is already running")]
    AlreadyRunning,

    #[error("unknown broker kind: {0}")]
    UnknownBroker(String),

    #[error(transparent)]
    Broker(#[from] BrokerError),
}

impl EngineError {
    /// True when the failure came from the broker connection handshake
    pub fn is_connectivity(&self) -> bool {
        matches!(self, EngineError::Broker(BrokerError::Connectivity(_)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_double_start_message() {
        let err = EngineError::AlreadyRunning;
        assert_eq!(err.to_string(), "trading engine is already running");
    }

    #[test]
    fn test_connectivity_classification() {
        let err: EngineError = BrokerError::Connectivity("auth failed".to_string()).into();
        assert!(err.is_connectivity());

        let err: EngineError = BrokerError::OrderRejected("insufficient funds".to_string()).into();
        assert!(!err.is_connectivity());
    }
}
