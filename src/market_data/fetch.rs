// Paginated acquisition: walk pages 1..=max_pages until the source runs dry.

use std::time::Duration;

use tracing::{info, instrument, warn};

use crate::config::QuoteSourceSettings;
use crate::market_data::adapters::sina_types::RawQuoteRecord;
use crate::market_data::adapters::{QuoteSource, Throttle};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchOptions {
    pub page_size: u32,
    pub max_pages: u32,
    /// Pause after each successful page.
    pub throttle: Duration,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            page_size: 80,
            max_pages: 99,
            throttle: Duration::from_millis(500),
        }
    }
}

impl From<&QuoteSourceSettings> for FetchOptions {
    fn from(settings: &QuoteSourceSettings) -> Self {
        Self {
            page_size: settings.page_size,
            max_pages: settings.max_pages,
            throttle: Duration::from_millis(settings.throttle_ms),
        }
    }
}

/// Fetch every page the source will give us.
///
/// Stops on the first empty page, the first failed request, or after
/// `max_pages`. A failure keeps whatever earlier pages returned.
#[instrument(level = "info", skip(source, throttle))]
pub async fn fetch_all_quotes(
    source: &dyn QuoteSource,
    throttle: &dyn Throttle,
    options: FetchOptions,
) -> Vec<RawQuoteRecord> {
    let mut all = Vec::new();

    for page in 1..=options.max_pages {
        match source.fetch_page(page, options.page_size).await {
            Ok(records) if records.is_empty() => {
                info!(page, total = all.len(), "Reached empty page, listing exhausted");
                break;
            }
            Ok(records) => {
                all.extend(records);
                metrics::counter!("screener_pages_fetched").increment(1);
                info!(page, total = all.len(), "Fetched quote page");
                throttle.pause(options.throttle).await;
            }
            Err(e) => {
                metrics::counter!("screener_fetch_failures").increment(1);
                warn!(page, total = all.len(), error = %e, "Quote page failed, keeping pages fetched so far");
                break;
            }
        }
    }

    metrics::gauge!("screener_quotes_fetched").set(all.len() as f64);
    all
}
