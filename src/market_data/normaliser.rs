// Convert raw vendor records into `NormalisedQuote`s.
// Bad fields degrade to None; rows without a usable price/PB are dropped here.

use serde_json::Value;
use tracing::info;

use crate::engine::types::NormalisedQuote;
use crate::market_data::adapters::sina_types::RawQuoteRecord;

/// Sina reports market cap in 万元.
pub const YUAN_PER_WAN: f64 = 10_000.0;

const CODE_LEN: usize = 6;
const MARKET_PREFIX_LEN: usize = 2;

pub struct Normaliser {
    cap_scale: f64, // multiplier from vendor market-cap unit to yuan
}

impl Default for Normaliser {
    fn default() -> Self {
        Self { cap_scale: YUAN_PER_WAN }
    }
}

impl Normaliser {
    pub fn normalise(&self, records: &[RawQuoteRecord]) -> Vec<NormalisedQuote> {
        let quotes: Vec<NormalisedQuote> = records.iter().filter_map(|r| self.normalise_one(r)).collect();

        if let Some((lo, hi)) = pb_range(&quotes) {
            info!(valid = quotes.len(), raw = records.len(), pb_min = lo, pb_max = hi, "Normalised quotes");
        } else {
            info!(valid = 0, raw = records.len(), "No usable quotes after normalisation");
        }
        quotes
    }

    pub fn normalise_one(&self, record: &RawQuoteRecord) -> Option<NormalisedQuote> {
        let code = strip_market_prefix(&record.symbol)?;
        let price = coerce_f64(&record.trade)?;
        let pb_ratio = coerce_f64(&record.pb)?;
        if price <= 0.0 || pb_ratio <= 0.0 {
            return None;
        }

        Some(NormalisedQuote {
            code,
            name: record.name.trim().to_string(),
            price,
            pb_ratio,
            pe_ratio: coerce_f64(&record.per),
            market_cap: coerce_f64(&record.mktcap).map(|cap| cap * self.cap_scale),
        })
    }
}

/// "sh600000" -> "600000". Short numeric remainders are zero-padded; anything
/// that isn't a 1..=6 digit code yields None.
pub fn strip_market_prefix(symbol: &str) -> Option<String> {
    let rest = symbol.trim().get(MARKET_PREFIX_LEN..)?;
    pad_code(rest)
}

/// Left-pad a numeric code to six digits.
pub fn pad_code(code: &str) -> Option<String> {
    let code = code.trim();
    if code.is_empty() || code.len() > CODE_LEN || !code.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(format!("{:0>width$}", code, width = CODE_LEN))
}

/// Numbers and numeric strings become `Some(f64)`; everything else
/// (null, "", "-", NaN, inf) becomes None.
pub fn coerce_f64(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|v| v.is_finite())
}

fn pb_range(quotes: &[NormalisedQuote]) -> Option<(f64, f64)> {
    quotes.iter().map(|q| q.pb_ratio).fold(None, |acc, pb| match acc {
        None => Some((pb, pb)),
        Some((lo, hi)) => Some((lo.min(pb), hi.max(pb))),
    })
}
