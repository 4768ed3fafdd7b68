// Market data module entrypoint
pub mod adapters;   // vendor-specific fetchers (Sina quotes, Eastmoney listing)
pub mod directory;  // cached code -> name listing + name-marker filter
pub mod fetch;      // page-by-page acquisition with throttle
pub mod normaliser; // raw JSON values -> NormalisedQuote
