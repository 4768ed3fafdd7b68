// Screening engine: domain types + the pure PB/PE/market-cap filter
pub mod screen;
pub mod types;

pub use screen::{lowest_pb, screen, DEFAULT_FALLBACK_SIZE};
pub use types::*;
