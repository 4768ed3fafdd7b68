//! One analysis run: fetch -> normalise -> restrict universe -> screen.
//!
//! Every surface calls [`Pipeline::run_analysis`] (or [`run_guarded`] when the
//! run should live on its own task) and only renders the returned
//! [`RunReport`]. Nothing here keeps state between runs.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{error, info, instrument, warn};

use crate::config::Settings;
use crate::engine::screen::screen;
use crate::engine::types::{CandidateRow, MarketStats, NormalisedQuote, ScreeningCriteria};
use crate::market_data::adapters::eastmoney::EastmoneyDirectoryClient;
use crate::market_data::adapters::sina::SinaQuoteClient;
use crate::market_data::adapters::{QuoteSource, SourceError, Throttle, TokioThrottle};
use crate::market_data::directory::{join_directory, DirectoryError, NameFilter, SymbolDirectory};
use crate::market_data::fetch::{fetch_all_quotes, FetchOptions};
use crate::market_data::normaliser::Normaliser;

/// How the raw universe is cut down before screening.
pub enum UniverseFilter {
    /// Inner-join with the cached main-board, non-ST symbol directory.
    Directory(SymbolDirectory),
    /// Drop quotes whose own name carries an ST / delisting marker.
    NameMarkers(NameFilter),
}

impl UniverseFilter {
    async fn apply(&self, quotes: Vec<NormalisedQuote>) -> Result<Vec<NormalisedQuote>, DirectoryError> {
        match self {
            UniverseFilter::Directory(directory) => {
                let entries = directory.load_directory().await?;
                Ok(join_directory(quotes, &entries))
            }
            UniverseFilter::NameMarkers(filter) => Ok(filter.retain(quotes)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RunStatus {
    /// At least one candidate passed the screen.
    Completed,
    /// Data was screened but nothing passed; see `diagnostic`.
    NoCandidates,
    /// The quote source returned nothing at all.
    NoData,
    /// The run hit an error (or panicked) and was stopped.
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct RunReport {
    pub status: RunStatus,
    pub criteria: ScreeningCriteria,
    pub candidates: Vec<CandidateRow>,
    pub diagnostic: Vec<CandidateRow>,
    /// Full screened universe, kept for statistics.
    pub universe: Vec<NormalisedQuote>,
    pub stats: Option<MarketStats>,
    pub elapsed: Duration,
}

impl RunReport {
    fn empty(status: RunStatus, criteria: ScreeningCriteria, elapsed: Duration) -> Self {
        Self {
            status,
            criteria,
            candidates: Vec::new(),
            diagnostic: Vec::new(),
            universe: Vec::new(),
            stats: None,
            elapsed,
        }
    }

    pub fn failed(message: impl Into<String>, criteria: ScreeningCriteria, elapsed: Duration) -> Self {
        Self::empty(RunStatus::Failed(message.into()), criteria, elapsed)
    }

    pub fn has_candidates(&self) -> bool {
        !self.candidates.is_empty()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Directory(#[from] DirectoryError),
}

pub struct Pipeline {
    source: Arc<dyn QuoteSource>,
    throttle: Arc<dyn Throttle>,
    universe: UniverseFilter,
    normaliser: Normaliser,
    fetch: FetchOptions,
    fallback_size: usize,
}

impl Pipeline {
    pub fn new(source: Arc<dyn QuoteSource>, throttle: Arc<dyn Throttle>, universe: UniverseFilter) -> Self {
        Self {
            source,
            throttle,
            universe,
            normaliser: Normaliser::default(),
            fetch: FetchOptions::default(),
            fallback_size: crate::engine::screen::DEFAULT_FALLBACK_SIZE,
        }
    }

    pub fn with_fetch_options(mut self, fetch: FetchOptions) -> Self {
        self.fetch = fetch;
        self
    }

    pub fn with_fallback_size(mut self, fallback_size: usize) -> Self {
        self.fallback_size = fallback_size;
        self
    }

    /// Production wiring: Sina quotes, tokio throttle, and either the
    /// Eastmoney-backed directory or the name-marker filter.
    pub fn from_settings(settings: &Settings, use_directory: bool) -> Result<Self, SourceError> {
        let source = Arc::new(SinaQuoteClient::new(&settings.quote_source)?);
        let universe = if use_directory {
            let listing = Arc::new(EastmoneyDirectoryClient::new(&settings.directory)?);
            UniverseFilter::Directory(SymbolDirectory::new(listing, &settings.directory))
        } else {
            UniverseFilter::NameMarkers(NameFilter::from_settings(&settings.name_filter))
        };

        Ok(Self::new(source, Arc::new(TokioThrottle), universe)
            .with_fetch_options(FetchOptions::from(&settings.quote_source))
            .with_fallback_size(settings.screening.fallback_size))
    }

    /// Run the whole analysis. Errors never escape: they come back as
    /// `RunStatus::Failed`.
    #[instrument(level = "info", skip(self))]
    pub async fn run_analysis(&self, criteria: ScreeningCriteria) -> RunReport {
        let started = Instant::now();
        info!("Starting cigar-butt screen");

        let report = match self.try_run(criteria, started).await {
            Ok(report) => report,
            Err(e) => {
                error!(error = %e, "Analysis failed");
                RunReport::failed(e.to_string(), criteria, started.elapsed())
            }
        };

        metrics::histogram!("screener_run_seconds").record(report.elapsed.as_secs_f64());
        metrics::gauge!("screener_candidates").set(report.candidates.len() as f64);
        info!(status = ?report.status, elapsed_secs = report.elapsed.as_secs_f64(), "Analysis finished");
        report
    }

    async fn try_run(&self, criteria: ScreeningCriteria, started: Instant) -> Result<RunReport, PipelineError> {
        let raw = fetch_all_quotes(self.source.as_ref(), self.throttle.as_ref(), self.fetch).await;
        if raw.is_empty() {
            warn!("No quotes fetched, nothing to screen");
            return Ok(RunReport::empty(RunStatus::NoData, criteria, started.elapsed()));
        }
        info!(count = raw.len(), "Fetched raw quotes");

        let quotes = self.normaliser.normalise(&raw);
        let universe = self.universe.apply(quotes).await?;

        let outcome = screen(&universe, &criteria, self.fallback_size);
        let status = if outcome.has_candidates() {
            RunStatus::Completed
        } else {
            RunStatus::NoCandidates
        };
        let stats = MarketStats::from_universe(&universe, outcome.candidates.len());

        Ok(RunReport {
            status,
            criteria,
            candidates: outcome.candidates,
            diagnostic: outcome.diagnostic,
            universe,
            stats,
            elapsed: started.elapsed(),
        })
    }
}

/// Run the analysis on its own task. A panic inside the run is reported as
/// `RunStatus::Failed` instead of tearing down the caller.
pub async fn run_guarded(pipeline: Arc<Pipeline>, criteria: ScreeningCriteria) -> RunReport {
    let started = Instant::now();
    let handle = tokio::spawn(async move { pipeline.run_analysis(criteria).await });

    match handle.await {
        Ok(report) => report,
        Err(e) => {
            let message = if e.is_panic() {
                "analysis task panicked".to_string()
            } else {
                e.to_string()
            };
            error!(error = %message, "Analysis task did not complete");
            RunReport::failed(message, criteria, started.elapsed())
        }
    }
}
