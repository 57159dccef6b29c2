//! Trade-Insight Engine — trade journal analytics
//!
//! Pure, synchronous analytics over a trader's historical trade log:
//! - Metric derivation (risk, reward, R:R ratio) into a time-ordered table
//! - Pattern analysis: position-size buckets, pair/direction bias, R:R buckets
//! - Behavior analysis: overtrading, revenge trading, risk discipline,
//!   loss recovery, Sharpe ratio, risk classification
//! - Natural-language insight generation from every analysis

pub mod behavior;
pub mod metrics;
pub mod patterns;
pub mod stats;
pub mod types;

use thiserror::Error;

/// Errors raised while building the derived trade table.
///
/// Degenerate statistics (zero variance, empty groups, missing successors)
/// are not errors; they surface as `None` in the reports.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DataError {
    #[error("empty trade log: at least one trade is required")]
    EmptyLog,

    #[error("non-finite value in field '{field}' at row {row}")]
    NonFiniteField { field: &'static str, row: usize },
}

pub type EngineResult<T> = Result<T, DataError>;

// Re-exports for convenience
pub use behavior::{
    risk_level_from, BehaviorAnalyzer, OvertradingReport, RevengeTradingReport,
    RiskConsistencyReport, RiskLevel,
};
pub use metrics::derive_metrics;
pub use patterns::{
    DirectionStats, PatternAnalyzer, PatternInsights, PnlStats, RrBucketStats, SizeBucketStats,
};
pub use types::{DerivedTrade, Direction, TradeRecord, TradeStatus};
