use serde::{Deserialize, Serialize};

/// Yuan per hundred-million (亿).
pub const YUAN_PER_YI: f64 = 1e8;

/// Quote after normalisation. `code` is always six ASCII digits and
/// `price` / `pb_ratio` are finite and strictly positive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalisedQuote {
    pub code: String,
    pub name: String,
    pub price: f64,
    pub pb_ratio: f64,
    pub pe_ratio: Option<f64>,
    /// Total market cap in yuan.
    pub market_cap: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScreeningCriteria {
    pub pb_max: f64,
    pub pe_max: f64,
    /// Exclusive lower bound, in yuan.
    pub market_cap_min: f64,
}

impl ScreeningCriteria {
    /// Build criteria from the units a user types: the market-cap floor is
    /// given in hundred-millions of yuan.
    pub fn from_user_units(pb_max: f64, pe_max: f64, market_cap_min_yi: f64) -> Self {
        Self {
            pb_max,
            pe_max,
            market_cap_min: market_cap_min_yi * YUAN_PER_YI,
        }
    }

    pub fn market_cap_min_yi(&self) -> f64 {
        self.market_cap_min / YUAN_PER_YI
    }

    pub fn matches(&self, quote: &NormalisedQuote) -> bool {
        let pb_ok = quote.pb_ratio > 0.0 && quote.pb_ratio <= self.pb_max;
        let pe_ok = matches!(quote.pe_ratio, Some(pe) if pe > 0.0 && pe <= self.pe_max);
        let cap_ok = matches!(quote.market_cap, Some(cap) if cap > self.market_cap_min);
        pb_ok && pe_ok && cap_ok && quote.price > 0.0
    }
}

impl Default for ScreeningCriteria {
    fn default() -> Self {
        Self::from_user_units(1.2, 20.0, 100.0)
    }
}

/// A screened row: the underlying quote plus its market cap in 亿,
/// rounded to two decimals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateRow {
    pub quote: NormalisedQuote,
    pub market_cap_yi: Option<f64>,
}

impl CandidateRow {
    pub fn from_quote(quote: NormalisedQuote) -> Self {
        let market_cap_yi = quote.market_cap.map(|cap| round2(cap / YUAN_PER_YI));
        Self { quote, market_cap_yi }
    }

    pub fn display_name(&self) -> &str {
        &self.quote.name
    }

    pub fn code(&self) -> &str {
        &self.quote.code
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScreenOutcome {
    /// Rows passing every threshold, ascending by PB.
    pub candidates: Vec<CandidateRow>,
    /// Lowest-PB rows of the whole input; only filled when `candidates` is empty.
    pub diagnostic: Vec<CandidateRow>,
}

impl ScreenOutcome {
    pub fn has_candidates(&self) -> bool {
        !self.candidates.is_empty()
    }
}

/// Summary figures over the screened universe.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarketStats {
    pub total: usize,
    pub candidates: usize,
    pub pb_min: f64,
    pub pb_max: f64,
    pub pb_mean: f64,
    pub pe_min: Option<f64>,
    pub pe_max: Option<f64>,
    pub pe_mean: Option<f64>,
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
