// Sina quote adapter: one GET per page against Market_Center.getHQNodeData

use std::time::Duration;

use tracing::debug;

use super::sina_types::RawQuoteRecord;
use super::{QuoteSource, SourceError};
use crate::config::QuoteSourceSettings;

pub struct SinaQuoteClient {
    client: reqwest::Client,
    base_url: String, // "http://vip.stock.finance.sina.com.cn/quotes_service/api/json_v2.php/Market_Center.getHQNodeData"
    node: String,     // market segment, "hs_a" = all Shanghai + Shenzhen A-shares
    sort: String,
    ascending: bool,
}

impl SinaQuoteClient {
    pub fn new(settings: &QuoteSourceSettings) -> Result<Self, SourceError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .user_agent(settings.user_agent.as_str())
            .build()?;

        Ok(Self {
            client,
            base_url: settings.base_url.clone(),
            node: settings.node.clone(),
            sort: settings.sort.clone(),
            ascending: settings.ascending,
        })
    }

    fn query(&self, page: u32, page_size: u32) -> [(&'static str, String); 5] {
        [
            ("page", page.to_string()),
            ("num", page_size.to_string()),
            ("sort", self.sort.clone()),
            ("asc", if self.ascending { "1" } else { "0" }.to_string()),
            ("node", self.node.clone()),
        ]
    }
}

#[async_trait::async_trait]
impl QuoteSource for SinaQuoteClient {
    async fn fetch_page(&self, page: u32, page_size: u32) -> Result<Vec<RawQuoteRecord>, SourceError> {
        debug!(url = %self.base_url, page, page_size, node = %self.node, "Requesting quote page");

        let response = self
            .client
            .get(&self.base_url)
            .query(&self.query(page, page_size))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status(status));
        }

        // text() honours the charset header; Sina has served GBK in the past
        let body = response.text().await?;
        parse_page(&body)
    }
}

/// Decode one page body. A literal `null` is treated as an exhausted listing.
pub fn parse_page(body: &str) -> Result<Vec<RawQuoteRecord>, SourceError> {
    let records: Option<Vec<RawQuoteRecord>> = serde_json::from_str(body.trim())?;
    Ok(records.unwrap_or_default())
}
