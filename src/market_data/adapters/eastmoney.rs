//! Eastmoney `clist` adapter used as the symbol directory source.
//!
//! Pages through `pn=1..` until the rows received reach the `total` the
//! vendor reports (`f12` = code, `f14` = name). A listing that ends short of
//! `total` is an error, never a smaller market.

use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};

use super::{DirectorySource, SourceError};
use crate::config::DirectorySettings;
use crate::market_data::directory::SymbolDirectoryEntry;

/// Shanghai + Shenzhen A-share segments (SZ main/SME, SZ ChiNext, SH main, SH STAR).
const A_SHARE_SEGMENTS: &str = "m:0+t:6,m:0+t:80,m:1+t:2,m:1+t:23";

/// Hard stop for pagination, whatever `total` claims.
const MAX_LISTING_PAGES: u32 = 500;

#[derive(Debug, Deserialize)]
struct ClistResponse {
    #[serde(default)]
    data: Option<ClistData>,
}

#[derive(Debug, Deserialize)]
struct ClistData {
    #[serde(default)]
    total: Option<usize>,
    #[serde(default)]
    diff: Vec<ClistItem>,
}

#[derive(Debug, Deserialize)]
struct ClistItem {
    #[serde(default)]
    f12: Value,
    #[serde(default)]
    f14: String,
}

/// One decoded `clist` page.
#[derive(Debug, Default)]
pub struct ListingPage {
    /// Size of the whole listing, when the vendor reports it.
    pub total: Option<usize>,
    /// Rows in this page, counting ones dropped as unusable.
    pub rows: usize,
    pub entries: Vec<SymbolDirectoryEntry>,
}

/// Pages gathered so far.
#[derive(Debug, Default)]
pub struct Listing {
    total: Option<usize>,
    received: usize,
    entries: Vec<SymbolDirectoryEntry>,
}

impl Listing {
    /// Add a page. Returns true while more pages are needed.
    pub fn extend(&mut self, page: ListingPage) -> bool {
        if page.total.is_some() {
            self.total = page.total;
        }
        self.received += page.rows;
        self.entries.extend(page.entries);

        match self.total {
            Some(total) => page.rows > 0 && self.received < total,
            None => false,
        }
    }

    pub fn finish(self) -> Result<Vec<SymbolDirectoryEntry>, SourceError> {
        match self.total {
            Some(total) if self.received < total => Err(SourceError::Incomplete {
                received: self.received,
                total,
            }),
            _ => Ok(self.entries),
        }
    }
}

pub struct EastmoneyDirectoryClient {
    client: reqwest::Client,
    base_url: String,
    page_size: u32,
}

impl EastmoneyDirectoryClient {
    pub fn new(settings: &DirectorySettings) -> Result<Self, SourceError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .user_agent("Mozilla/5.0")
            .build()?;

        Ok(Self {
            client,
            base_url: settings.base_url.clone(),
            page_size: settings.page_size,
        })
    }

    async fn fetch_page(&self, page: u32) -> Result<ListingPage, SourceError> {
        debug!(url = %self.base_url, page, page_size = self.page_size, "Fetching symbol directory page");

        let response = self
            .client
            .get(&self.base_url)
            .header("Referer", "https://quote.eastmoney.com/")
            .query(&[
                ("pn", page.to_string()),
                ("pz", self.page_size.to_string()),
                ("np", "1".to_string()),
                ("fltt", "2".to_string()),
                ("fs", A_SHARE_SEGMENTS.to_string()),
                ("fields", "f12,f14".to_string()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status(status));
        }

        let body = response.text().await?;
        parse_listing_page(&body)
    }
}

#[async_trait::async_trait]
impl DirectorySource for EastmoneyDirectoryClient {
    async fn fetch_listing(&self) -> Result<Vec<SymbolDirectoryEntry>, SourceError> {
        let mut listing = Listing::default();
        for page in 1..=MAX_LISTING_PAGES {
            if !listing.extend(self.fetch_page(page).await?) {
                break;
            }
        }

        let entries = listing.finish()?;
        info!(count = entries.len(), "Fetched symbol directory listing");
        Ok(entries)
    }
}

pub fn parse_listing_page(body: &str) -> Result<ListingPage, SourceError> {
    let parsed: ClistResponse = serde_json::from_str(body)?;
    let Some(data) = parsed.data else {
        return Ok(ListingPage::default());
    };

    let rows = data.diff.len();
    let entries = data
        .diff
        .into_iter()
        .filter_map(|item| {
            let code = match item.f12 {
                Value::String(s) => s,
                Value::Number(n) => n.to_string(),
                _ => return None,
            };
            if code.is_empty() || item.f14.is_empty() {
                return None;
            }
            Some(SymbolDirectoryEntry { code, name: item.f14 })
        })
        .collect();

    Ok(ListingPage { total: data.total, rows, entries })
}

/// Decode a single response that is expected to hold the whole listing.
pub fn parse_listing(body: &str) -> Result<Vec<SymbolDirectoryEntry>, SourceError> {
    let mut listing = Listing::default();
    listing.extend(parse_listing_page(body)?);
    listing.finish()
}
