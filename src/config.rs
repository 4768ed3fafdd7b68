//! Settings: compiled-in defaults, an optional TOML file, then
//! `SCREENER__SECTION__KEY` environment overrides.

use std::path::Path;

use serde::Deserialize;

use crate::engine::screen::DEFAULT_FALLBACK_SIZE;
use crate::engine::types::ScreeningCriteria;
use crate::persist::types::{DEFAULT_DIRECTORY_CACHE, DEFAULT_EXPORT_PATH};

pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";
pub const ENV_PREFIX: &str = "SCREENER";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub quote_source: QuoteSourceSettings,
    pub directory: DirectorySettings,
    pub name_filter: NameFilterSettings,
    pub criteria: CriteriaSettings,
    pub screening: ScreeningSettings,
    pub output: OutputSettings,
    pub logging: LoggingSettings,
}

impl Settings {
    /// Load settings. A missing file is fine as long as it is the default
    /// path; an explicitly requested file must exist.
    pub fn load(path: Option<&Path>) -> Result<Self, config::ConfigError> {
        let file = match path {
            Some(p) => config::File::from(p).required(true),
            None => config::File::with_name(DEFAULT_CONFIG_PATH).required(false),
        };

        let builder = config::Config::builder().add_source(file).add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct QuoteSourceSettings {
    pub base_url: String,
    pub page_size: u32,
    pub max_pages: u32,
    pub timeout_secs: u64,
    /// Pause after each page, in milliseconds.
    pub throttle_ms: u64,
    pub node: String,
    pub sort: String,
    pub ascending: bool,
    pub user_agent: String,
}

impl Default for QuoteSourceSettings {
    fn default() -> Self {
        Self {
            base_url: "http://vip.stock.finance.sina.com.cn/quotes_service/api/json_v2.php/Market_Center.getHQNodeData"
                .into(),
            page_size: 80,
            max_pages: 99,
            timeout_secs: 10,
            throttle_ms: 500,
            node: "hs_a".into(),
            sort: "code".into(),
            ascending: true,
            user_agent: "Mozilla/5.0".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DirectorySettings {
    pub base_url: String,
    /// Rows per `clist` page; the listing is paged until `total` is reached.
    pub page_size: u32,
    pub timeout_secs: u64,
    pub cache_path: String,
    pub board_prefixes: Vec<String>,
    pub excluded_markers: Vec<String>,
}

impl Default for DirectorySettings {
    fn default() -> Self {
        Self {
            base_url: "https://push2.eastmoney.com/api/qt/clist/get".into(),
            page_size: 100,
            timeout_secs: 15,
            cache_path: DEFAULT_DIRECTORY_CACHE.into(),
            board_prefixes: vec!["60".into(), "00".into()],
            excluded_markers: vec!["ST".into(), "退".into()],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NameFilterSettings {
    pub markers: Vec<String>,
}

impl Default for NameFilterSettings {
    fn default() -> Self {
        Self {
            markers: vec!["ST".into(), "退".into(), "B股".into(), "暂停".into()],
        }
    }
}

/// Thresholds in user-facing units (market cap in 亿).
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct CriteriaSettings {
    pub pb_max: f64,
    pub pe_max: f64,
    pub market_cap_min_yi: f64,
}

impl Default for CriteriaSettings {
    fn default() -> Self {
        Self {
            pb_max: 1.2,
            pe_max: 20.0,
            market_cap_min_yi: 100.0,
        }
    }
}

impl From<CriteriaSettings> for ScreeningCriteria {
    fn from(c: CriteriaSettings) -> Self {
        ScreeningCriteria::from_user_units(c.pb_max, c.pe_max, c.market_cap_min_yi)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScreeningSettings {
    pub fallback_size: usize,
    /// Join against the symbol directory; otherwise filter on quote names.
    pub use_directory: bool,
}

impl Default for ScreeningSettings {
    fn default() -> Self {
        Self {
            fallback_size: DEFAULT_FALLBACK_SIZE,
            use_directory: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputSettings {
    pub path: String,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self { path: DEFAULT_EXPORT_PATH.into() }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Used when RUST_LOG is not set.
    pub filter: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self { filter: "info".into() }
    }
}
