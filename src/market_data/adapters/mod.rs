// Shared traits + errors for vendor adapters

use std::time::Duration;

use crate::market_data::adapters::sina_types::RawQuoteRecord;
use crate::market_data::directory::SymbolDirectoryEntry;

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("unexpected HTTP status {0}")]
    Status(reqwest::StatusCode),
    #[error("response is not valid JSON: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("listing ended after {received} of {total} rows")]
    Incomplete { received: usize, total: usize },
}

/// One page of quotes from a paginated vendor endpoint.
#[async_trait::async_trait]
pub trait QuoteSource: Send + Sync {
    /// `page` is 1-based. An empty vector means the listing is exhausted.
    async fn fetch_page(&self, page: u32, page_size: u32) -> Result<Vec<RawQuoteRecord>, SourceError>;
}

/// Whole-market code/name listing. Must be complete or an error.
#[async_trait::async_trait]
pub trait DirectorySource: Send + Sync {
    async fn fetch_listing(&self) -> Result<Vec<SymbolDirectoryEntry>, SourceError>;
}

/// Pause between page requests. Injected so tests don't wait on the clock.
#[async_trait::async_trait]
pub trait Throttle: Send + Sync {
    async fn pause(&self, delay: Duration);
}

pub struct TokioThrottle;

#[async_trait::async_trait]
impl Throttle for TokioThrottle {
    async fn pause(&self, delay: Duration) {
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

pub mod eastmoney;
pub mod sina;
pub mod sina_types;
