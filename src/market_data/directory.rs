//! Symbol directory: cached code -> display-name listing used to restrict the
//! universe to main-board, non-ST names.
//!
//! The cache is a convenience, not a source of truth. Any problem reading it
//! is a cache miss and triggers a refresh from the remote listing.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::config::{DirectorySettings, NameFilterSettings};
use crate::engine::types::NormalisedQuote;
use crate::market_data::adapters::{DirectorySource, SourceError};
use crate::market_data::normaliser::pad_code;
use crate::persist::directory_cache::DirectoryCache;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolDirectoryEntry {
    pub code: String,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Board {
    ShanghaiMain,
    ShenzhenMain,
    ChiNext,
    Star,
    Beijing,
    Other,
}

impl Board {
    pub fn of(code: &str) -> Self {
        match code {
            c if c.starts_with("60") => Board::ShanghaiMain,
            c if c.starts_with("00") => Board::ShenzhenMain,
            c if c.starts_with("30") => Board::ChiNext,
            c if c.starts_with("68") => Board::Star,
            c if c.starts_with('4') || c.starts_with('8') || c.starts_with("92") => Board::Beijing,
            _ => Board::Other,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Board::ShanghaiMain => "SH main",
            Board::ShenzhenMain => "SZ main",
            Board::ChiNext => "ChiNext",
            Board::Star => "STAR",
            Board::Beijing => "BJ",
            Board::Other => "other",
        }
    }
}

impl SymbolDirectoryEntry {
    pub fn board(&self) -> Board {
        Board::of(&self.code)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("failed to fetch symbol directory: {0}")]
    Fetch(#[from] SourceError),
}

pub struct SymbolDirectory {
    source: Arc<dyn DirectorySource>,
    cache: DirectoryCache,
    board_prefixes: Vec<String>,
    excluded_markers: Vec<String>,
}

impl SymbolDirectory {
    pub fn new(source: Arc<dyn DirectorySource>, settings: &DirectorySettings) -> Self {
        Self {
            source,
            cache: DirectoryCache::new(&settings.cache_path),
            board_prefixes: settings.board_prefixes.clone(),
            excluded_markers: settings.excluded_markers.clone(),
        }
    }

    /// Cached listing if readable, otherwise a fresh one.
    #[instrument(level = "debug", skip(self))]
    pub async fn load_directory(&self) -> Result<Vec<SymbolDirectoryEntry>, DirectoryError> {
        match self.cache.read() {
            Ok(entries) if !entries.is_empty() => {
                info!(count = entries.len(), path = %self.cache.path().display(), "Loaded symbol directory from cache");
                return Ok(entries);
            }
            Ok(_) => debug!("Directory cache is empty, refreshing"),
            Err(e) => debug!(error = %e, "Directory cache unavailable, refreshing"),
        }
        self.refresh_directory().await
    }

    /// Fetch the remote listing, filter it and rewrite the cache.
    pub async fn refresh_directory(&self) -> Result<Vec<SymbolDirectoryEntry>, DirectoryError> {
        let listing = self.source.fetch_listing().await?;
        let fetched = listing.len();
        let entries = self.filter_listing(listing);

        if let Err(e) = self.cache.write(&entries) {
            warn!(error = %e, path = %self.cache.path().display(), "Could not write directory cache");
        } else {
            info!(count = entries.len(), fetched, path = %self.cache.path().display(), "Saved symbol directory");
        }
        Ok(entries)
    }

    pub fn filter_listing(&self, listing: Vec<SymbolDirectoryEntry>) -> Vec<SymbolDirectoryEntry> {
        listing
            .into_iter()
            .filter(|e| !contains_marker(&e.name, &self.excluded_markers))
            .filter_map(|e| pad_code(&e.code).map(|code| SymbolDirectoryEntry { code, name: e.name }))
            .filter(|e| self.board_prefixes.iter().any(|p| e.code.starts_with(p.as_str())))
            .collect()
    }
}

/// Inner join on code. The directory name replaces the quote's own name;
/// quotes missing from the directory are dropped. Quote order is kept.
pub fn join_directory(quotes: Vec<NormalisedQuote>, entries: &[SymbolDirectoryEntry]) -> Vec<NormalisedQuote> {
    let names: HashMap<&str, &str> = entries.iter().map(|e| (e.code.as_str(), e.name.as_str())).collect();
    let before = quotes.len();

    let joined: Vec<NormalisedQuote> = quotes
        .into_iter()
        .filter_map(|mut q| {
            let name = names.get(q.code.as_str())?;
            q.name = (*name).to_string();
            Some(q)
        })
        .collect();

    info!(before, after = joined.len(), "Joined quotes with symbol directory");
    joined
}

/// Directory-less universe restriction: drop names carrying an ST /
/// delisting / suspension marker.
#[derive(Debug, Clone)]
pub struct NameFilter {
    markers: Vec<String>,
}

impl NameFilter {
    pub fn new(markers: Vec<String>) -> Self {
        Self { markers }
    }

    pub fn from_settings(settings: &NameFilterSettings) -> Self {
        Self::new(settings.markers.clone())
    }

    pub fn excludes(&self, name: &str) -> bool {
        contains_marker(name, &self.markers)
    }

    pub fn retain(&self, quotes: Vec<NormalisedQuote>) -> Vec<NormalisedQuote> {
        let before = quotes.len();
        let kept: Vec<NormalisedQuote> = quotes.into_iter().filter(|q| !self.excludes(&q.name)).collect();
        info!(before, after = kept.len(), "Filtered flagged names");
        kept
    }
}

fn contains_marker(name: &str, markers: &[String]) -> bool {
    markers.iter().any(|m| !m.is_empty() && name.contains(m.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct FixedListing {
        entries: Vec<SymbolDirectoryEntry>,
        calls: AtomicU32,
    }

    #[async_trait::async_trait]
    impl DirectorySource for FixedListing {
        async fn fetch_listing(&self) -> Result<Vec<SymbolDirectoryEntry>, SourceError> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            Ok(self.entries.clone())
        }
    }

    fn entry(code: &str, name: &str) -> SymbolDirectoryEntry {
        SymbolDirectoryEntry { code: code.into(), name: name.into() }
    }

    fn quote(code: &str, name: &str) -> NormalisedQuote {
        NormalisedQuote {
            code: code.into(),
            name: name.into(),
            price: 1.0,
            pb_ratio: 1.0,
            pe_ratio: None,
            market_cap: None,
        }
    }

    fn directory(dir: &tempfile::TempDir, entries: Vec<SymbolDirectoryEntry>) -> (SymbolDirectory, Arc<FixedListing>) {
        let source = Arc::new(FixedListing { entries, calls: AtomicU32::new(0) });
        let settings = DirectorySettings {
            cache_path: dir.path().join("a_stock_list.csv").to_string_lossy().into_owned(),
            ..DirectorySettings::default()
        };
        (SymbolDirectory::new(source.clone(), &settings), source)
    }

    #[test]
    fn test_board_of() {
        assert_eq!(Board::of("600000"), Board::ShanghaiMain);
        assert_eq!(Board::of("000001"), Board::ShenzhenMain);
        assert_eq!(Board::of("300750"), Board::ChiNext);
        assert_eq!(Board::of("688981"), Board::Star);
        assert_eq!(Board::of("830799"), Board::Beijing);
        assert_eq!(Board::of("200002"), Board::Other);
    }

    #[tokio::test]
    async fn test_refresh_filters_and_caches() {
        let dir = tempfile::tempdir().unwrap();
        let (directory, source) = directory(
            &dir,
            vec![
                entry("1", "平安银行"),
                entry("600000", "浦发银行"),
                entry("600001", "*ST海航"),
                entry("000003", "退市金田"),
                entry("300750", "宁德时代"),
                entry("688981", "中芯国际"),
            ],
        );

        let entries = directory.load_directory().await.unwrap();
        assert_eq!(entries, vec![entry("000001", "平安银行"), entry("600000", "浦发银行")]);
        assert_eq!(source.calls.load(Ordering::Relaxed), 1);

        // second load is served from cache, leading zeros intact
        let cached = directory.load_directory().await.unwrap();
        assert_eq!(cached, entries);
        assert_eq!(source.calls.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_corrupt_cache_triggers_refresh() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a_stock_list.csv"), "not,a\n\"broken").unwrap();
        let (directory, source) = directory(&dir, vec![entry("600000", "浦发银行")]);

        let entries = directory.load_directory().await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(source.calls.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_refresh_survives_unwritable_cache() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "a regular file").unwrap();

        let source = Arc::new(FixedListing {
            entries: vec![entry("600000", "浦发银行"), entry("000001", "平安银行")],
            calls: AtomicU32::new(0),
        });
        let settings = DirectorySettings {
            cache_path: blocker.join("a_stock_list.csv").to_string_lossy().into_owned(),
            ..DirectorySettings::default()
        };
        let directory = SymbolDirectory::new(source.clone(), &settings);

        let entries = directory.refresh_directory().await.unwrap();
        assert_eq!(entries, vec![entry("600000", "浦发银行"), entry("000001", "平安银行")]);
        assert!(!blocker.join("a_stock_list.csv").exists());

        // nothing was cached, so the next load goes back to the source
        let again = directory.load_directory().await.unwrap();
        assert_eq!(again, entries);
        assert_eq!(source.calls.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn test_join_overrides_name_and_drops_unknown() {
        let quotes = vec![quote("000001", "平安银行"), quote("300750", "宁德时代"), quote("600000", "浦发")];
        let entries = vec![entry("600000", "浦发银行"), entry("000001", "平安银行")];

        let joined = join_directory(quotes, &entries);
        let pairs: Vec<(&str, &str)> = joined.iter().map(|q| (q.code.as_str(), q.name.as_str())).collect();
        assert_eq!(pairs, vec![("000001", "平安银行"), ("600000", "浦发银行")]);
    }

    #[test]
    fn test_name_filter() {
        let filter = NameFilter::new(vec!["ST".into(), "退".into(), "B股".into(), "暂停".into()]);
        let kept = filter.retain(vec![
            quote("000001", "平安银行"),
            quote("600002", "ST明科"),
            quote("600003", "*ST东电"),
            quote("000004", "退市海润"),
            quote("200002", "万科B股"),
            quote("600005", "暂停上市"),
        ]);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].code, "000001");
    }
}
