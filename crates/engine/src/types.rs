//! Trade record types shared by the analyzers

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Direction of a position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Long => "long",
            Self::Short => "short",
        }
    }
}

/// Outcome of a closed trade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeStatus {
    Win,
    Loss,
}

/// One closed position from a trade journal.
///
/// Field names follow the journal wire format; extra payload fields
/// (`_id`, `accountId`, screenshot URLs) are ignored at deserialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeRecord {
    pub pair: String,
    pub direction: Direction,
    pub status: TradeStatus,
    #[serde(default)]
    pub strategy: Option<String>,
    pub date: DateTime<Utc>,
    #[serde(rename = "accountBalance")]
    pub account_balance: f64,
    #[serde(rename = "entryPrice")]
    pub entry_price: f64,
    pub size: f64,
    #[serde(rename = "stopLoss")]
    pub stop_loss: f64,
    pub target: f64,
    #[serde(rename = "exitPrice")]
    pub exit_price: f64,
    #[serde(rename = "netPNL")]
    pub net_pnl: f64,
    #[serde(rename = "accountChange")]
    pub account_change: f64,
}

/// A trade record extended with the computed risk metrics.
///
/// `rr_ratio` is `None` when the stop sits exactly on the entry (zero risk),
/// so downstream bucketing can apply an explicit policy instead of dividing
/// by zero.
#[derive(Debug, Clone)]
pub struct DerivedTrade {
    pub trade: TradeRecord,
    pub risk: f64,
    pub reward: f64,
    pub rr_ratio: Option<f64>,
}
