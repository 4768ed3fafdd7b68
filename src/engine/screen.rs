use tracing::{debug, info, instrument};

use crate::engine::types::{CandidateRow, MarketStats, NormalisedQuote, ScreenOutcome, ScreeningCriteria};

/// Rows reported when nothing passes the screen.
pub const DEFAULT_FALLBACK_SIZE: usize = 20;

/// Apply `criteria` to `quotes`.
///
/// Matches are returned ascending by PB (stable, so ties keep input order).
/// With no match the `fallback_size` lowest-PB rows of the whole input are
/// returned as `diagnostic` instead.
#[instrument(level = "debug", skip(quotes), fields(universe = quotes.len()))]
pub fn screen(quotes: &[NormalisedQuote], criteria: &ScreeningCriteria, fallback_size: usize) -> ScreenOutcome {
    let mut matched: Vec<&NormalisedQuote> = quotes.iter().filter(|q| criteria.matches(q)).collect();

    if !matched.is_empty() {
        matched.sort_by(|a, b| a.pb_ratio.total_cmp(&b.pb_ratio));
        let candidates: Vec<CandidateRow> = matched.into_iter().cloned().map(CandidateRow::from_quote).collect();
        info!(
            count = candidates.len(),
            pb_max = criteria.pb_max,
            pe_max = criteria.pe_max,
            "Found cigar-butt candidates"
        );
        return ScreenOutcome { candidates, diagnostic: Vec::new() };
    }

    let diagnostic = lowest_pb(quotes, fallback_size);
    info!(
        shown = diagnostic.len(),
        "No quote passed the screen, reporting lowest PB instead"
    );
    ScreenOutcome { candidates: Vec::new(), diagnostic }
}

/// The `n` rows with the smallest PB, ties broken by input order.
pub fn lowest_pb(quotes: &[NormalisedQuote], n: usize) -> Vec<CandidateRow> {
    let mut ordered: Vec<&NormalisedQuote> = quotes.iter().collect();
    ordered.sort_by(|a, b| a.pb_ratio.total_cmp(&b.pb_ratio));
    ordered.into_iter().take(n).cloned().map(CandidateRow::from_quote).collect()
}

impl MarketStats {
    /// Summary over the full universe. `None` for an empty universe.
    pub fn from_universe(universe: &[NormalisedQuote], candidates: usize) -> Option<Self> {
        if universe.is_empty() {
            return None;
        }

        let pbs: Vec<f64> = universe.iter().map(|q| q.pb_ratio).collect();
        let pes: Vec<f64> = universe.iter().filter_map(|q| q.pe_ratio).collect();
        let (pb_min, pb_max, pb_mean) = min_max_mean(&pbs)?;
        let pe = min_max_mean(&pes);

        debug!(total = universe.len(), pe_samples = pes.len(), "Computed market stats");

        Some(Self {
            total: universe.len(),
            candidates,
            pb_min,
            pb_max,
            pb_mean,
            pe_min: pe.map(|p| p.0),
            pe_max: pe.map(|p| p.1),
            pe_mean: pe.map(|p| p.2),
        })
    }
}

fn min_max_mean(values: &[f64]) -> Option<(f64, f64, f64)> {
    if values.is_empty() {
        return None;
    }
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    Some((min, max, mean))
}
