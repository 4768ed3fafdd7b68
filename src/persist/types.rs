use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error("I/O failure on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("CSV failure on {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

impl PersistError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PersistError::Io { path: path.into(), source }
    }

    pub fn csv(path: impl Into<PathBuf>, source: csv::Error) -> Self {
        PersistError::Csv { path: path.into(), source }
    }
}

pub type PersistResult<T> = Result<T, PersistError>;

/// UTF-8 byte-order mark so spreadsheet tools pick the right encoding.
pub const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Output header: display name, code, price, PB, PE, market cap (亿).
pub const EXPORT_HEADER: [&str; 6] = ["股票名", "代码", "股价", "PB", "PE", "市值(亿)"];

pub const DEFAULT_EXPORT_PATH: &str = "cigar_butt_realtime.csv";
pub const DEFAULT_DIRECTORY_CACHE: &str = "a_stock_list.csv";
