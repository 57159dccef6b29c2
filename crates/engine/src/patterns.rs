//! Pattern Analyzer — position-size, pair/direction, and risk/reward patterns
//!
//! Each analysis partitions the derived trade table, reports per-group win
//! rates and PNL statistics, and renders fixed-template insight sentences
//! from the comparisons.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::Serialize;
use tracing::debug;

use crate::stats::{bucket_index, mean, quantile_edges, round4, std_dev};
use crate::types::{DerivedTrade, TradeStatus};

/// Quartile labels for position-size buckets, smallest first
const SIZE_LABELS: [&str; 4] = ["Small", "Medium", "Large", "Very Large"];

/// Target bucket count for the quantile analyses
const TARGET_BUCKETS: usize = 4;

/// Win-rate gap above which a long/short split counts as a significant bias
const DIRECTION_BIAS_THRESHOLD: f64 = 0.1;

// ---------------------------------------------------------------------------
// Report types
// ---------------------------------------------------------------------------

/// Mean and spread of a PNL-like column within one bucket.
/// `std` is `None` for single-row buckets (no variance to report).
#[derive(Debug, Clone, Serialize)]
pub struct PnlStats {
    pub mean: f64,
    pub std: Option<f64>,
}

/// Per-bucket performance for the position-size analysis
#[derive(Debug, Clone, Serialize)]
pub struct SizeBucketStats {
    pub win_rate: f64,
    #[serde(rename = "netPNL")]
    pub net_pnl: PnlStats,
    #[serde(rename = "accountChange")]
    pub account_change: PnlStats,
}

/// Per-(pair, direction) performance
#[derive(Debug, Clone, Serialize)]
pub struct DirectionStats {
    pub win_rate: f64,
    #[serde(rename = "avg_netPNL")]
    pub avg_net_pnl: f64,
    #[serde(rename = "avg_accountChange")]
    pub avg_account_change: f64,
}

/// Per-bucket performance for the risk/reward analysis
#[derive(Debug, Clone, Serialize)]
pub struct RrBucketStats {
    pub win_rate: f64,
    #[serde(rename = "avg_netPNL")]
    pub avg_net_pnl: f64,
}

/// The three insight lists produced by `get_all_insights`
#[derive(Debug, Clone, Serialize)]
pub struct PatternInsights {
    pub position_size_insights: Vec<String>,
    pub pair_direction_insights: Vec<String>,
    pub risk_reward_insights: Vec<String>,
}

fn win_rate(rows: &[&DerivedTrade]) -> f64 {
    if rows.is_empty() {
        return 0.0;
    }
    let wins = rows
        .iter()
        .filter(|r| r.trade.status == TradeStatus::Win)
        .count();
    wins as f64 / rows.len() as f64
}

/// Format a 0..1 fraction as a percentage with two decimals
fn pct(value: f64) -> String {
    format!("{:.2}%", value * 100.0)
}

// ---------------------------------------------------------------------------
// Analyzer
// ---------------------------------------------------------------------------

/// Read-only pattern queries over one derived trade table.
///
/// Each instance owns its copy of the table; concurrent analyses never share
/// state.
pub struct PatternAnalyzer {
    rows: Vec<DerivedTrade>,
}

impl PatternAnalyzer {
    pub fn new(rows: Vec<DerivedTrade>) -> Self {
        Self { rows }
    }

    /// Win rate and PNL statistics per position-size quantile bucket.
    ///
    /// Targets four buckets labeled Small → Very Large; with fewer rows or
    /// tied quantile boundaries the bucket count degrades and the label list
    /// is truncated to match.
    pub fn analyze_position_size_impact(&self) -> BTreeMap<String, SizeBucketStats> {
        let sizes: Vec<f64> = self.rows.iter().map(|r| r.trade.size).collect();
        let edges = quantile_edges(&sizes, TARGET_BUCKETS);
        if edges.len() < 2 {
            return BTreeMap::new();
        }
        let bucket_count = edges.len() - 1;

        let mut groups: Vec<Vec<&DerivedTrade>> = vec![Vec::new(); bucket_count];
        for row in &self.rows {
            groups[bucket_index(&edges, row.trade.size)].push(row);
        }

        let mut result = BTreeMap::new();
        for (i, group) in groups.iter().enumerate() {
            if group.is_empty() {
                continue;
            }
            let pnls: Vec<f64> = group.iter().map(|r| r.trade.net_pnl).collect();
            let changes: Vec<f64> = group.iter().map(|r| r.trade.account_change).collect();
            result.insert(
                SIZE_LABELS[i].to_string(),
                SizeBucketStats {
                    win_rate: round4(win_rate(group)),
                    net_pnl: PnlStats {
                        mean: round4(mean(&pnls).unwrap_or(0.0)),
                        std: std_dev(&pnls).map(round4),
                    },
                    account_change: PnlStats {
                        mean: round4(mean(&changes).unwrap_or(0.0)),
                        std: std_dev(&changes).map(round4),
                    },
                },
            );
        }
        result
    }

    /// Win rate and average PNL per (pair, direction) group.
    /// Directions with no trades for a pair are absent from the result.
    pub fn analyze_pair_direction_bias(
        &self,
    ) -> BTreeMap<String, BTreeMap<String, DirectionStats>> {
        let mut groups: BTreeMap<(String, &'static str), Vec<&DerivedTrade>> = BTreeMap::new();
        for row in &self.rows {
            groups
                .entry((row.trade.pair.clone(), row.trade.direction.label()))
                .or_default()
                .push(row);
        }

        let mut result: BTreeMap<String, BTreeMap<String, DirectionStats>> = BTreeMap::new();
        for ((pair, direction), group) in &groups {
            let pnls: Vec<f64> = group.iter().map(|r| r.trade.net_pnl).collect();
            let changes: Vec<f64> = group.iter().map(|r| r.trade.account_change).collect();
            result.entry(pair.clone()).or_default().insert(
                direction.to_string(),
                DirectionStats {
                    win_rate: round4(win_rate(group)),
                    avg_net_pnl: round4(mean(&pnls).unwrap_or(0.0)),
                    avg_account_change: round4(mean(&changes).unwrap_or(0.0)),
                },
            );
        }
        result
    }

    /// Win rate and average PNL per risk/reward-ratio quantile bucket.
    ///
    /// Bucket keys are the numeric interval `"{lower:.2}-{upper:.2}"`. Rows
    /// with an undefined ratio (zero risk) are excluded from this analysis.
    pub fn analyze_risk_reward_patterns(&self) -> BTreeMap<String, RrBucketStats> {
        let with_rr: Vec<(&DerivedTrade, f64)> = self
            .rows
            .iter()
            .filter_map(|r| r.rr_ratio.map(|rr| (r, rr)))
            .collect();
        if with_rr.len() < self.rows.len() {
            debug!(
                excluded = self.rows.len() - with_rr.len(),
                "Excluding trades with undefined R:R ratio from bucketing"
            );
        }

        let ratios: Vec<f64> = with_rr.iter().map(|(_, rr)| *rr).collect();
        let edges = quantile_edges(&ratios, TARGET_BUCKETS);
        if edges.len() < 2 {
            return BTreeMap::new();
        }
        let bucket_count = edges.len() - 1;

        let mut groups: Vec<Vec<&DerivedTrade>> = vec![Vec::new(); bucket_count];
        for (row, rr) in with_rr.iter().copied() {
            groups[bucket_index(&edges, rr)].push(row);
        }

        let mut result = BTreeMap::new();
        for (i, group) in groups.iter().enumerate() {
            if group.is_empty() {
                continue;
            }
            let pnls: Vec<f64> = group.iter().map(|r| r.trade.net_pnl).collect();
            result.insert(
                format!("{:.2}-{:.2}", edges[i], edges[i + 1]),
                RrBucketStats {
                    win_rate: round4(win_rate(group)),
                    avg_net_pnl: round4(mean(&pnls).unwrap_or(0.0)),
                },
            );
        }
        result
    }

    // -----------------------------------------------------------------------
    // Insights
    // -----------------------------------------------------------------------

    /// Size-bucket labels present in `analysis`, smallest bucket first
    fn ordered_size_labels(analysis: &BTreeMap<String, SizeBucketStats>) -> Vec<&str> {
        SIZE_LABELS
            .iter()
            .copied()
            .filter(|l| analysis.contains_key(*l))
            .collect()
    }

    /// R:R bucket keys sorted by their numeric lower bound
    fn ordered_rr_keys(analysis: &BTreeMap<String, RrBucketStats>) -> Vec<&str> {
        let lower = |k: &str| {
            k.split('-')
                .next()
                .and_then(|s| s.parse::<f64>().ok())
                .unwrap_or(0.0)
        };
        let mut keys: Vec<&str> = analysis.keys().map(String::as_str).collect();
        keys.sort_by(|a, b| lower(a).partial_cmp(&lower(b)).unwrap_or(Ordering::Equal));
        keys
    }

    pub fn get_position_size_insights(&self) -> Vec<String> {
        let analysis = self.analyze_position_size_impact();
        let labels = Self::ordered_size_labels(&analysis);
        let mut insights = Vec::new();
        if labels.len() < 2 {
            return insights;
        }
        let first = labels[0];
        let last = labels[labels.len() - 1];

        let first_wr = analysis[first].win_rate;
        let last_wr = analysis[last].win_rate;
        if last_wr > first_wr {
            insights.push(format!(
                "Larger position sizes tend to have higher win rates, with {} positions having a {} win rate compared to {} for {} positions.",
                last, pct(last_wr), pct(first_wr), first
            ));
        } else if first_wr > last_wr {
            insights.push(format!(
                "Smaller position sizes tend to have higher win rates, with {} positions having a {} win rate compared to {} for {} positions.",
                first, pct(first_wr), pct(last_wr), last
            ));
        }

        let first_pnl = analysis[first].net_pnl.mean;
        let last_pnl = analysis[last].net_pnl.mean;
        if last_pnl > first_pnl {
            insights.push(format!(
                "Larger positions tend to be more profitable, with an average PNL of {:.2} for {} positions compared to {:.2} for {} positions.",
                last_pnl, last, first_pnl, first
            ));
        } else if first_pnl > last_pnl {
            insights.push(format!(
                "Smaller positions tend to be more profitable, with an average PNL of {:.2} for {} positions compared to {:.2} for {} positions.",
                first_pnl, first, last_pnl, last
            ));
        }

        insights
    }

    pub fn get_pair_direction_insights(&self) -> Vec<String> {
        let analysis = self.analyze_pair_direction_bias();
        let mut insights = Vec::new();

        for (pair, directions) in &analysis {
            match (directions.get("long"), directions.get("short")) {
                (Some(long), Some(short)) => {
                    if (long.win_rate - short.win_rate).abs() > DIRECTION_BIAS_THRESHOLD {
                        let (better, better_stats, worse, worse_stats) =
                            if long.win_rate > short.win_rate {
                                ("long", long, "short", short)
                            } else {
                                ("short", short, "long", long)
                            };
                        insights.push(format!(
                            "For {}, {} trades have a significantly higher win rate ({}) compared to {} trades ({}).",
                            pair, better, pct(better_stats.win_rate), worse, pct(worse_stats.win_rate)
                        ));
                    }
                }
                (Some(long), None) => insights.push(format!(
                    "For {}, only long trades were found with a win rate of {}.",
                    pair,
                    pct(long.win_rate)
                )),
                (None, Some(short)) => insights.push(format!(
                    "For {}, only short trades were found with a win rate of {}.",
                    pair,
                    pct(short.win_rate)
                )),
                (None, None) => {}
            }
        }

        if insights.is_empty() {
            insights
                .push("No significant directional bias was found for any currency pair.".to_string());
        }
        insights
    }

    pub fn get_risk_reward_insights(&self) -> Vec<String> {
        let analysis = self.analyze_risk_reward_patterns();
        let keys = Self::ordered_rr_keys(&analysis);
        let mut insights = Vec::new();
        if keys.len() < 2 {
            return insights;
        }
        let first = keys[0];
        let last = keys[keys.len() - 1];

        let first_wr = analysis[first].win_rate;
        let last_wr = analysis[last].win_rate;
        if last_wr > first_wr {
            insights.push(format!(
                "Trades with higher risk-reward ratios tend to have better win rates, with {} R:R trades having a {} win rate compared to {} for {} R:R trades.",
                last, pct(last_wr), pct(first_wr), first
            ));
        } else if first_wr > last_wr {
            insights.push(format!(
                "Trades with lower risk-reward ratios tend to have better win rates, with {} R:R trades having a {} win rate compared to {} for {} R:R trades.",
                first, pct(first_wr), pct(last_wr), last
            ));
        }

        let first_pnl = analysis[first].avg_net_pnl;
        let last_pnl = analysis[last].avg_net_pnl;
        if last_pnl > first_pnl {
            insights.push(format!(
                "Trades with higher risk-reward ratios tend to be more profitable, with an average PNL of {:.2} for {} R:R trades compared to {:.2} for {} R:R trades.",
                last_pnl, last, first_pnl, first
            ));
        } else if first_pnl > last_pnl {
            insights.push(format!(
                "Trades with lower risk-reward ratios tend to be more profitable, with an average PNL of {:.2} for {} R:R trades compared to {:.2} for {} R:R trades.",
                first_pnl, first, last_pnl, last
            ));
        }

        insights
    }

    pub fn get_all_insights(&self) -> PatternInsights {
        PatternInsights {
            position_size_insights: self.get_position_size_insights(),
            pair_direction_insights: self.get_pair_direction_insights(),
            risk_reward_insights: self.get_risk_reward_insights(),
        }
    }

    /// Digest of the best-performing group from each analysis: perfect
    /// (pair, direction) combos, the strongest size bucket, the strongest
    /// R:R bucket. Lines whose source analysis is empty are skipped.
    pub fn get_key_trading_insights(&self) -> Vec<String> {
        let mut insights = Vec::new();

        let direction_analysis = self.analyze_pair_direction_bias();
        let mut best_pairs = Vec::new();
        for (pair, directions) in &direction_analysis {
            for direction in ["long", "short"] {
                if let Some(stats) = directions.get(direction) {
                    if stats.win_rate == 1.0 {
                        best_pairs.push(format!("{} {}", pair, direction));
                    }
                }
            }
        }
        if !best_pairs.is_empty() {
            best_pairs.truncate(2);
            insights.push(format!(
                "Pair Direction: {} show 100% win rates.",
                best_pairs.join(" and ")
            ));
        }

        let size_analysis = self.analyze_position_size_impact();
        let labels = Self::ordered_size_labels(&size_analysis);
        if let Some(best) = labels.iter().copied().max_by(|a, b| {
            size_analysis[*a]
                .win_rate
                .partial_cmp(&size_analysis[*b].win_rate)
                .unwrap_or(Ordering::Equal)
        }) {
            insights.push(format!(
                "Position Size: {} positions have higher win rates ({}) and profitability.",
                best,
                pct(size_analysis[best].win_rate)
            ));
        }

        let rr_analysis = self.analyze_risk_reward_patterns();
        let keys = Self::ordered_rr_keys(&rr_analysis);
        if let Some(best) = keys.iter().copied().max_by(|a, b| {
            rr_analysis[*a]
                .win_rate
                .partial_cmp(&rr_analysis[*b].win_rate)
                .unwrap_or(Ordering::Equal)
        }) {
            insights.push(format!(
                "Risk-Reward: Higher R:R ratios ({}) yield better win rates ({}) and profitability.",
                best,
                pct(rr_analysis[best].win_rate)
            ));
        }

        insights
    }
}
