//! Behavior Analyzer — overtrading, revenge trading, risk discipline, and
//! risk classification over the derived trade table

use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate};
use serde::Serialize;

use crate::stats::{mean, std_dev};
use crate::types::{DerivedTrade, TradeStatus};

/// Gap below which a trade entered after a loss counts as a revenge trade
const REVENGE_WINDOW_MINUTES: i64 = 30;

/// Annualization factor: trading days per year
const TRADING_DAYS_PER_YEAR: f64 = 252.0;

// ---------------------------------------------------------------------------
// Report types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct OvertradingReport {
    pub avg_trades_per_day: f64,
    pub max_trades_per_day: u64,
    /// Days more than one standard deviation above the daily average
    pub days_with_excessive_trading: u64,
    /// Trade-count value → number of days with exactly that many trades
    pub trading_frequency_distribution: BTreeMap<u64, u64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RevengeTradingReport {
    pub quick_trades_after_losses: u64,
    /// Win rate of the trade immediately following each flagged trade;
    /// `None` when nothing was flagged
    pub quick_trades_after_losses_success_rate: Option<f64>,
    pub avg_pnl_after_quick_trade: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RiskConsistencyReport {
    /// std(size) / mean(size)
    pub position_size_consistency: Option<f64>,
    /// std(|stopLoss − entryPrice| / entryPrice)
    pub stop_loss_consistency: Option<f64>,
    /// std(|netPNL| / accountBalance)
    pub risk_per_trade_consistency: Option<f64>,
}

/// Discrete risk classification from Sharpe ratio and max drawdown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RiskLevel {
    Low,
    Moderate,
    High,
}

impl RiskLevel {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Moderate => "Moderate",
            Self::High => "High",
        }
    }
}

/// Strict rule table, evaluated in priority order. An undefined Sharpe or
/// drawdown fails its comparison; both thresholds are exclusive.
pub fn risk_level_from(sharpe: Option<f64>, max_drawdown: Option<f64>) -> RiskLevel {
    let sharpe_above = |t: f64| sharpe.map(|s| s > t).unwrap_or(false);
    let drawdown_below = |t: f64| max_drawdown.map(|d| d < t).unwrap_or(false);

    if sharpe_above(1.5) && drawdown_below(0.10) {
        RiskLevel::Low
    } else if sharpe_above(0.5) && drawdown_below(0.20) {
        RiskLevel::Moderate
    } else {
        RiskLevel::High
    }
}

/// Keep a statistic only when it is a finite number
fn finite(value: f64) -> Option<f64> {
    value.is_finite().then_some(value)
}

// ---------------------------------------------------------------------------
// Analyzer
// ---------------------------------------------------------------------------

/// Behavioral-signal queries over one derived trade table.
///
/// Each instance owns its copy of the table; the date ordering established by
/// the deriver drives every sequence-dependent signal here.
pub struct BehaviorAnalyzer {
    rows: Vec<DerivedTrade>,
}

impl BehaviorAnalyzer {
    pub fn new(rows: Vec<DerivedTrade>) -> Self {
        Self { rows }
    }

    fn trades_per_day(&self) -> Vec<u64> {
        let mut per_day: BTreeMap<NaiveDate, u64> = BTreeMap::new();
        for row in &self.rows {
            *per_day.entry(row.trade.date.date_naive()).or_insert(0) += 1;
        }
        per_day.into_values().collect()
    }

    /// Per-calendar-day trade volume statistics
    pub fn detect_overtrading(&self) -> OvertradingReport {
        let counts = self.trades_per_day();
        let as_f64: Vec<f64> = counts.iter().map(|&c| c as f64).collect();

        let avg = mean(&as_f64).unwrap_or(0.0);
        let max = counts.iter().copied().max().unwrap_or(0);

        // With a single day there is no spread to exceed
        let excessive = match std_dev(&as_f64) {
            Some(sd) => as_f64.iter().filter(|&&c| c > avg + sd).count() as u64,
            None => 0,
        };

        let mut distribution: BTreeMap<u64, u64> = BTreeMap::new();
        for count in &counts {
            *distribution.entry(*count).or_insert(0) += 1;
        }

        OvertradingReport {
            avg_trades_per_day: avg,
            max_trades_per_day: max,
            days_with_excessive_trading: excessive,
            trading_frequency_distribution: distribution,
        }
    }

    /// Flag losses followed by a new trade within the revenge window.
    ///
    /// The last trade has no successor and is never flagged; successor
    /// statistics come from the next trade in the full ordered table.
    pub fn detect_revenge_trading(&self) -> RevengeTradingReport {
        let window = Duration::minutes(REVENGE_WINDOW_MINUTES);
        let mut successor_wins: Vec<f64> = Vec::new();
        let mut successor_pnls: Vec<f64> = Vec::new();

        for w in self.rows.windows(2) {
            let (current, next) = (&w[0], &w[1]);
            let gap = next.trade.date - current.trade.date;
            if current.trade.status == TradeStatus::Loss && gap < window {
                successor_wins.push(if next.trade.status == TradeStatus::Win {
                    1.0
                } else {
                    0.0
                });
                successor_pnls.push(next.trade.net_pnl);
            }
        }

        RevengeTradingReport {
            quick_trades_after_losses: successor_wins.len() as u64,
            quick_trades_after_losses_success_rate: mean(&successor_wins),
            avg_pnl_after_quick_trade: mean(&successor_pnls),
        }
    }

    /// Three dimensionless spreads describing risk discipline; each is
    /// undefined on single-row input or a degenerate denominator.
    pub fn analyze_risk_management_consistency(&self) -> RiskConsistencyReport {
        let sizes: Vec<f64> = self.rows.iter().map(|r| r.trade.size).collect();
        let position_size_consistency = match (std_dev(&sizes), mean(&sizes)) {
            (Some(sd), Some(m)) if m != 0.0 => finite(sd / m),
            _ => None,
        };

        let stop_ratios: Vec<f64> = self
            .rows
            .iter()
            .map(|r| (r.trade.stop_loss - r.trade.entry_price).abs() / r.trade.entry_price)
            .collect();
        let stop_loss_consistency = std_dev(&stop_ratios).and_then(finite);

        let risk_ratios: Vec<f64> = self
            .rows
            .iter()
            .map(|r| r.trade.net_pnl.abs() / r.trade.account_balance)
            .collect();
        let risk_per_trade_consistency = std_dev(&risk_ratios).and_then(finite);

        RiskConsistencyReport {
            position_size_consistency,
            stop_loss_consistency,
            risk_per_trade_consistency,
        }
    }

    /// Mean length of completed loss streaks.
    ///
    /// A streak is a maximal run of consecutive non-win trades terminated by
    /// a win; a trailing run that never recovers is not counted. `None` when
    /// no streak completes.
    pub fn calculate_loss_recovery_rate(&self) -> Option<f64> {
        let mut streaks: Vec<f64> = Vec::new();
        let mut run = 0u64;
        for row in &self.rows {
            match row.trade.status {
                TradeStatus::Win => {
                    if run > 0 {
                        streaks.push(run as f64);
                        run = 0;
                    }
                }
                TradeStatus::Loss => run += 1,
            }
        }
        mean(&streaks)
    }

    /// Annualized Sharpe ratio over per-trade account changes:
    /// mean / sample std × √252. `None` below two trades or at zero spread.
    pub fn calculate_sharpe_ratio(&self) -> Option<f64> {
        let returns: Vec<f64> = self.rows.iter().map(|r| r.trade.account_change).collect();
        let m = mean(&returns)?;
        let sd = std_dev(&returns)?;
        if sd == 0.0 {
            return None;
        }
        finite(m / sd * TRADING_DAYS_PER_YEAR.sqrt())
    }

    /// Peak-to-trough account-balance decline relative to the starting
    /// balance. `None` for a zero starting balance.
    fn max_drawdown(&self) -> Option<f64> {
        let first = self.rows.first().map(|r| r.trade.account_balance)?;
        if first == 0.0 {
            return None;
        }

        let mut peak = first;
        let mut worst = 0.0f64;
        for row in &self.rows {
            let balance = row.trade.account_balance;
            if balance > peak {
                peak = balance;
            }
            let drawdown = peak - balance;
            if drawdown > worst {
                worst = drawdown;
            }
        }
        Some(worst / first)
    }

    pub fn determine_risk_level(&self) -> RiskLevel {
        risk_level_from(self.calculate_sharpe_ratio(), self.max_drawdown())
    }

    // -----------------------------------------------------------------------
    // Insights
    // -----------------------------------------------------------------------

    /// Fixed-template sentences over the behavioral signals; sentences whose
    /// inputs are undefined are skipped.
    pub fn get_behavior_insights(&self) -> Vec<String> {
        let mut insights = Vec::new();

        let overtrading = self.detect_overtrading();
        insights.push(format!(
            "On average, you make {:.2} trades per day, with a maximum of {} trades in a single day.",
            overtrading.avg_trades_per_day, overtrading.max_trades_per_day
        ));
        if overtrading.days_with_excessive_trading > 0 {
            insights.push(format!(
                "There were {} days with excessive trading, which might indicate overtrading tendencies.",
                overtrading.days_with_excessive_trading
            ));
        }

        let revenge = self.detect_revenge_trading();
        if revenge.quick_trades_after_losses > 0 {
            insights.push(format!(
                "You made {} quick trades after losses, which could be signs of revenge trading.",
                revenge.quick_trades_after_losses
            ));
            if let (Some(rate), Some(pnl)) = (
                revenge.quick_trades_after_losses_success_rate,
                revenge.avg_pnl_after_quick_trade,
            ) {
                insights.push(format!(
                    "The success rate of these quick trades is {:.2}%, with an average PNL of {:.2}.",
                    rate * 100.0,
                    pnl
                ));
            }
        }

        let risk = self.analyze_risk_management_consistency();
        if let Some(v) = risk.position_size_consistency {
            if v > 0.5 {
                insights.push(
                    "Your position sizes vary considerably, which might indicate inconsistent risk management."
                        .to_string(),
                );
            } else {
                insights.push(
                    "Your position sizes are relatively consistent, showing good risk management practices."
                        .to_string(),
                );
            }
        }
        if let Some(v) = risk.stop_loss_consistency {
            if v < 0.01 {
                insights.push(
                    "Your stop loss placements are very consistent, which is a positive risk management practice."
                        .to_string(),
                );
            } else if v > 0.05 {
                insights.push(
                    "Your stop loss placements vary significantly, which could lead to inconsistent risk exposure."
                        .to_string(),
                );
            }
        }
        if let Some(v) = risk.risk_per_trade_consistency {
            if v < 0.01 {
                insights.push(
                    "Your risk per trade is very consistent, indicating disciplined risk management."
                        .to_string(),
                );
            } else if v > 0.05 {
                insights.push(
                    "Your risk per trade varies considerably, which might lead to inconsistent overall risk exposure."
                        .to_string(),
                );
            }
        }

        insights
    }

    /// One-line digest of overall performance
    pub fn get_key_insights(&self) -> String {
        if self.rows.is_empty() {
            return "No trades to analyze.".to_string();
        }

        let total_trades = self.rows.len();
        let wins = self
            .rows
            .iter()
            .filter(|r| r.trade.status == TradeStatus::Win)
            .count();
        let win_rate = wins as f64 / total_trades as f64;
        let total_pnl: f64 = self.rows.iter().map(|r| r.trade.net_pnl).sum();
        let risk_level = self.determine_risk_level();

        match self.calculate_sharpe_ratio() {
            Some(sharpe) => format!(
                "Over {} trades, you achieved a {:.2}% win rate with a total PNL of {:.2}. Your trading strategy shows a Sharpe ratio of {:.2}, indicating a {} risk level.",
                total_trades,
                win_rate * 100.0,
                total_pnl,
                sharpe,
                risk_level.label().to_lowercase()
            ),
            None => format!(
                "Over {} trades, you achieved a {:.2}% win rate with a total PNL of {:.2}. Too few trades to compute a Sharpe ratio; risk level is {}.",
                total_trades,
                win_rate * 100.0,
                total_pnl,
                risk_level.label().to_lowercase()
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::derive_metrics;
    use crate::types::{Direction, TradeRecord};

    fn make_trade(date: &str, status: TradeStatus, net_pnl: f64, account_change: f64) -> TradeRecord {
        TradeRecord {
            pair: "EURUSD".into(),
            direction: Direction::Long,
            status,
            strategy: None,
            date: date.parse().unwrap(),
            account_balance: 10_000.0,
            entry_price: 1.10,
            size: 1.0,
            stop_loss: 1.08,
            target: 1.16,
            exit_price: 1.12,
            net_pnl,
            account_change,
        }
    }

    fn analyzer(trades: Vec<TradeRecord>) -> BehaviorAnalyzer {
        BehaviorAnalyzer::new(derive_metrics(trades).unwrap())
    }

    #[test]
    fn test_overtrading_single_day() {
        let trades: Vec<TradeRecord> = (0..5)
            .map(|i| {
                make_trade(
                    &format!("2024-01-01T{:02}:00:00Z", 9 + i),
                    TradeStatus::Win,
                    10.0,
                    0.1,
                )
            })
            .collect();

        let report = analyzer(trades).detect_overtrading();
        assert_eq!(report.avg_trades_per_day, 5.0);
        assert_eq!(report.max_trades_per_day, 5);
        assert_eq!(report.days_with_excessive_trading, 0);
        assert_eq!(report.trading_frequency_distribution, BTreeMap::from([(5, 1)]));
    }

    #[test]
    fn test_overtrading_flags_outlier_days() {
        // 1 trade/day for five days, then a 10-trade day
        let mut trades = Vec::new();
        for day in 1..=5 {
            trades.push(make_trade(
                &format!("2024-01-{:02}T10:00:00Z", day),
                TradeStatus::Win,
                10.0,
                0.1,
            ));
        }
        for i in 0..10 {
            trades.push(make_trade(
                &format!("2024-01-06T{:02}:10:00Z", 8 + i),
                TradeStatus::Loss,
                -5.0,
                -0.05,
            ));
        }

        let report = analyzer(trades).detect_overtrading();
        assert_eq!(report.max_trades_per_day, 10);
        assert_eq!(report.days_with_excessive_trading, 1);
        assert_eq!(report.trading_frequency_distribution[&1], 5);
        assert_eq!(report.trading_frequency_distribution[&10], 1);
    }

    #[test]
    fn test_revenge_trading_flags_quick_reentry_only() {
        // Loss at T0, re-entry 10 minutes later, third trade 2 hours on
        let trades = vec![
            make_trade("2024-01-01T10:00:00Z", TradeStatus::Loss, -50.0, -0.5),
            make_trade("2024-01-01T10:10:00Z", TradeStatus::Win, 30.0, 0.3),
            make_trade("2024-01-01T12:10:00Z", TradeStatus::Win, 20.0, 0.2),
        ];

        let report = analyzer(trades).detect_revenge_trading();
        assert_eq!(report.quick_trades_after_losses, 1);
        assert_eq!(report.quick_trades_after_losses_success_rate, Some(1.0));
        assert_eq!(report.avg_pnl_after_quick_trade, Some(30.0));
    }

    #[test]
    fn test_revenge_trading_never_flags_last_trade() {
        let trades = vec![
            make_trade("2024-01-01T10:00:00Z", TradeStatus::Win, 30.0, 0.3),
            make_trade("2024-01-01T10:05:00Z", TradeStatus::Loss, -50.0, -0.5),
        ];

        let report = analyzer(trades).detect_revenge_trading();
        assert_eq!(report.quick_trades_after_losses, 0);
        assert_eq!(report.quick_trades_after_losses_success_rate, None);
        assert_eq!(report.avg_pnl_after_quick_trade, None);
    }

    #[test]
    fn test_risk_consistency_single_trade_is_undefined() {
        let trades = vec![make_trade("2024-01-01T10:00:00Z", TradeStatus::Win, 10.0, 0.1)];
        let report = analyzer(trades).analyze_risk_management_consistency();
        assert_eq!(report.position_size_consistency, None);
        assert_eq!(report.stop_loss_consistency, None);
        assert_eq!(report.risk_per_trade_consistency, None);
    }

    #[test]
    fn test_risk_consistency_uniform_sizing() {
        let trades = vec![
            make_trade("2024-01-01T10:00:00Z", TradeStatus::Win, 10.0, 0.1),
            make_trade("2024-01-02T10:00:00Z", TradeStatus::Loss, -10.0, -0.1),
        ];
        let report = analyzer(trades).analyze_risk_management_consistency();
        assert_eq!(report.position_size_consistency, Some(0.0));
        assert_eq!(report.stop_loss_consistency, Some(0.0));
        assert_eq!(report.risk_per_trade_consistency, Some(0.0));
    }

    #[test]
    fn test_loss_recovery_counts_completed_streaks() {
        let statuses = [
            TradeStatus::Loss,
            TradeStatus::Loss,
            TradeStatus::Win,
            TradeStatus::Loss,
            TradeStatus::Win,
        ];
        let trades: Vec<TradeRecord> = statuses
            .iter()
            .enumerate()
            .map(|(i, s)| {
                make_trade(&format!("2024-01-{:02}T10:00:00Z", i + 1), *s, 10.0, 0.1)
            })
            .collect();

        // Streaks of 2 and 1 both end in a win
        assert_eq!(analyzer(trades).calculate_loss_recovery_rate(), Some(1.5));
    }

    #[test]
    fn test_loss_recovery_without_wins_is_undefined() {
        let trades: Vec<TradeRecord> = (0..3)
            .map(|i| {
                make_trade(
                    &format!("2024-01-{:02}T10:00:00Z", i + 1),
                    TradeStatus::Loss,
                    -10.0,
                    -0.1,
                )
            })
            .collect();
        assert_eq!(analyzer(trades).calculate_loss_recovery_rate(), None);
    }

    #[test]
    fn test_sharpe_scales_with_positive_multiplier_only() {
        let changes = [0.5, 1.0, -0.3, 0.8, 0.2];
        let build = |f: &dyn Fn(f64) -> f64| {
            let trades: Vec<TradeRecord> = changes
                .iter()
                .enumerate()
                .map(|(i, c)| {
                    make_trade(
                        &format!("2024-01-{:02}T10:00:00Z", i + 1),
                        TradeStatus::Win,
                        10.0,
                        f(*c),
                    )
                })
                .collect();
            analyzer(trades).calculate_sharpe_ratio().unwrap()
        };

        let base = build(&|c| c);
        let scaled = build(&|c| c * 3.0);
        let shifted = build(&|c| c + 1.0);

        assert!((base - scaled).abs() < 1e-9, "Sharpe must be scale-invariant");
        assert!((base - shifted).abs() > 1e-6, "Sharpe must shift under translation");
    }

    #[test]
    fn test_sharpe_undefined_on_zero_spread() {
        let trades: Vec<TradeRecord> = (0..3)
            .map(|i| {
                make_trade(
                    &format!("2024-01-{:02}T10:00:00Z", i + 1),
                    TradeStatus::Win,
                    10.0,
                    0.5,
                )
            })
            .collect();
        assert_eq!(analyzer(trades).calculate_sharpe_ratio(), None);

        let single = vec![make_trade("2024-01-01T10:00:00Z", TradeStatus::Win, 10.0, 0.5)];
        assert_eq!(analyzer(single).calculate_sharpe_ratio(), None);
    }

    #[test]
    fn test_risk_level_rule_table() {
        assert_eq!(risk_level_from(Some(2.0), Some(0.05)), RiskLevel::Low);
        assert_eq!(risk_level_from(Some(1.0), Some(0.15)), RiskLevel::Moderate);
        assert_eq!(risk_level_from(Some(0.1), Some(0.5)), RiskLevel::High);
    }

    #[test]
    fn test_risk_level_boundaries_are_exclusive() {
        // Sharpe exactly 1.5 fails the Low rule but passes Moderate
        assert_eq!(risk_level_from(Some(1.5), Some(0.05)), RiskLevel::Moderate);
        // Drawdown exactly 0.1 likewise
        assert_eq!(risk_level_from(Some(2.0), Some(0.1)), RiskLevel::Moderate);
        assert_eq!(risk_level_from(None, Some(0.05)), RiskLevel::High);
        assert_eq!(risk_level_from(Some(2.0), None), RiskLevel::High);
    }

    #[test]
    fn test_max_drawdown_feeds_risk_level() {
        // Balance runs 10k → 11k → 8k: drawdown 3k / 10k = 0.3 ⇒ High
        let mut trades = vec![
            make_trade("2024-01-01T10:00:00Z", TradeStatus::Win, 100.0, 1.0),
            make_trade("2024-01-02T10:00:00Z", TradeStatus::Win, 50.0, 2.0),
            make_trade("2024-01-03T10:00:00Z", TradeStatus::Loss, -300.0, 0.5),
        ];
        trades[1].account_balance = 11_000.0;
        trades[2].account_balance = 8_000.0;

        assert_eq!(analyzer(trades).determine_risk_level(), RiskLevel::High);
    }

    #[test]
    fn test_behavior_insights_wording() {
        let trades = vec![
            make_trade("2024-01-01T10:00:00Z", TradeStatus::Loss, -50.0, -0.5),
            make_trade("2024-01-01T10:10:00Z", TradeStatus::Win, 30.0, 0.3),
            make_trade("2024-01-02T11:00:00Z", TradeStatus::Win, 20.0, 0.2),
        ];
        let insights = analyzer(trades).get_behavior_insights();

        assert!(insights[0].starts_with("On average, you make"));
        assert!(insights
            .iter()
            .any(|i| i.contains("quick trades after losses")));
        assert!(insights
            .iter()
            .any(|i| i.contains("position sizes are relatively consistent")));
    }

    #[test]
    fn test_key_insights_digest() {
        let trades = vec![
            make_trade("2024-01-01T10:00:00Z", TradeStatus::Win, 100.0, 1.0),
            make_trade("2024-01-02T10:00:00Z", TradeStatus::Loss, -40.0, -0.4),
            make_trade("2024-01-03T10:00:00Z", TradeStatus::Win, 60.0, 0.6),
        ];
        let digest = analyzer(trades).get_key_insights();
        assert!(digest.starts_with("Over 3 trades, you achieved a 66.67% win rate"));
        assert!(digest.contains("total PNL of 120.00"));
        assert!(digest.contains("risk level"));
    }

    #[test]
    fn test_reports_serialize_undefined_as_null() {
        let trades = vec![make_trade("2024-01-01T10:00:00Z", TradeStatus::Win, 10.0, 0.1)];
        let report = analyzer(trades).detect_revenge_trading();
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["quick_trades_after_losses"], 0);
        assert_eq!(
            json["quick_trades_after_losses_success_rate"],
            serde_json::Value::Null
        );
    }
}
