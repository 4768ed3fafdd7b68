pub mod types;
pub use types::*;
pub mod directory_cache;
pub mod export;

use crate::engine::types::CandidateRow;

/// Somewhere a screened table ends up: a file, the terminal, ...
pub trait ResultSink {
    fn write(&self, rows: &[CandidateRow]) -> PersistResult<()>;
}
