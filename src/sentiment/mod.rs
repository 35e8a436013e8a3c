// Sentiment collaborator module
//
// Narrow client for the external sentiment-scoring service. The engine only
// ever sees `analyze(symbol)`, which cannot fail: any transport or payload
// problem degrades to the neutral score.

use reqwest::Client;
use serde::Deserialize;

use crate::models::SentimentScore;
use crate::Result;

const DEFAULT_SENTIMENT_API: &str = "https://api.sentimentanalysis.com/v1";

/// Client for the sentiment analysis API
#[derive(Clone)]
pub struct SentimentClient {
    client: Client,
    base_url: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct SentimentResponse {
    score: f64,
    confidence: f64,
}

impl SentimentClient {
    pub fn new(api_key: String) -> Self {
        Self {
            client: Client::new(),
            base_url: DEFAULT_SENTIMENT_API.to_string(),
            api_key,
        }
    }

    /// Point the client at a different endpoint (tests use a mock server)
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.to_string();
        self
    }

    /// Build from `SENTIMENT_API_KEY`; a missing key disables the collaborator
    pub fn from_env() -> Option<Self> {
        match std::env::var("SENTIMENT_API_KEY") {
            Ok(key) if !key.is_empty() => Some(Self::new(key)),
            _ => {
                tracing::warn!("Sentiment analysis is disabled due to missing API key");
                None
            }
        }
    }

    /// Score a symbol, falling back to neutral on any failure
    pub async fn analyze(&self, symbol: &str) -> SentimentScore {
        match self.fetch(symbol).await {
            Ok(score) => score,
            Err(e) => {
                tracing::warn!("Failed to analyze sentiment for {}: {}", symbol, e);
                SentimentScore::neutral()
            }
        }
    }

    async fn fetch(&self, symbol: &str) -> Result<SentimentScore> {
        let url = format!("{}/sentiment/{}", self.base_url, symbol);

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.api_key)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(format!("sentiment API returned status {}", response.status()).into());
        }

        let body: SentimentResponse = response.json().await?;

        Ok(SentimentScore {
            score: body.score.clamp(0.0, 1.0),
            confidence: body.confidence.clamp(0.0, 1.0),
        })
    }
}
