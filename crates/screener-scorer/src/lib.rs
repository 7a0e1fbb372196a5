//! Normalizes raw provider payloads into `FinancialMetrics` and friends,
//! replays point-in-time visibility rules over them, and scores the result
//! into a `StockAnalysisResult`.

mod normalizer;
mod pit;
mod scorer;

pub use normalizer::{
    prepare_earnings_info, prepare_financial_metrics, prepare_insider_trading_info,
    prepare_sentiment_info, safe_float,
};
pub use pit::PointInTimeFilter;
pub use scorer::{attach_sector_percentiles, Scorer};
