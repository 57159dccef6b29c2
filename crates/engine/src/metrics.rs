//! Metrics Deriver — build the derived trade table from raw journal records

use tracing::debug;

use crate::types::{DerivedTrade, TradeRecord};
use crate::{DataError, EngineResult};

fn check_finite(trade: &TradeRecord, row: usize) -> EngineResult<()> {
    let fields: [(&'static str, f64); 8] = [
        ("accountBalance", trade.account_balance),
        ("entryPrice", trade.entry_price),
        ("size", trade.size),
        ("stopLoss", trade.stop_loss),
        ("target", trade.target),
        ("exitPrice", trade.exit_price),
        ("netPNL", trade.net_pnl),
        ("accountChange", trade.account_change),
    ];
    for (field, value) in fields {
        if !value.is_finite() {
            return Err(DataError::NonFiniteField { field, row });
        }
    }
    Ok(())
}

/// Compute per-trade risk metrics and sort the table by date ascending.
///
/// The output has exactly one row per input record; ties on `date` keep the
/// original input order. `risk == 0` yields an undefined `rr_ratio` rather
/// than an error.
pub fn derive_metrics(records: Vec<TradeRecord>) -> EngineResult<Vec<DerivedTrade>> {
    if records.is_empty() {
        return Err(DataError::EmptyLog);
    }

    let mut rows = Vec::with_capacity(records.len());
    for (row, trade) in records.into_iter().enumerate() {
        check_finite(&trade, row)?;

        let risk = (trade.entry_price - trade.stop_loss).abs();
        let reward = (trade.target - trade.entry_price).abs();
        let rr_ratio = if risk > 0.0 { Some(reward / risk) } else { None };

        rows.push(DerivedTrade {
            trade,
            risk,
            reward,
            rr_ratio,
        });
    }

    // Stable sort: equal dates keep input order
    rows.sort_by_key(|r| r.trade.date);

    debug!(rows = rows.len(), "Derived trade table");
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Direction, TradeStatus};

    fn make_trade(date: &str, entry: f64, stop: f64, target: f64) -> TradeRecord {
        TradeRecord {
            pair: "EURUSD".into(),
            direction: Direction::Long,
            status: TradeStatus::Win,
            strategy: None,
            date: date.parse().unwrap(),
            account_balance: 10_000.0,
            entry_price: entry,
            size: 1.0,
            stop_loss: stop,
            target,
            exit_price: target,
            net_pnl: 50.0,
            account_change: 0.5,
        }
    }

    #[test]
    fn test_preserves_rows_and_sorts_by_date() {
        let trades = vec![
            make_trade("2024-01-03T10:00:00Z", 1.10, 1.09, 1.12),
            make_trade("2024-01-01T10:00:00Z", 1.10, 1.09, 1.12),
            make_trade("2024-01-02T10:00:00Z", 1.10, 1.09, 1.12),
        ];
        let rows = derive_metrics(trades).unwrap();
        assert_eq!(rows.len(), 3);
        assert!(rows.windows(2).all(|w| w[0].trade.date <= w[1].trade.date));
    }

    #[test]
    fn test_equal_dates_keep_input_order() {
        let mut first = make_trade("2024-01-01T10:00:00Z", 1.10, 1.09, 1.12);
        first.pair = "AAA".into();
        let mut second = make_trade("2024-01-01T10:00:00Z", 1.10, 1.09, 1.12);
        second.pair = "BBB".into();

        let rows = derive_metrics(vec![first, second]).unwrap();
        assert_eq!(rows[0].trade.pair, "AAA");
        assert_eq!(rows[1].trade.pair, "BBB");
    }

    #[test]
    fn test_risk_reward_ratio() {
        let rows =
            derive_metrics(vec![make_trade("2024-01-01T10:00:00Z", 1.10, 1.08, 1.16)]).unwrap();
        assert!((rows[0].risk - 0.02).abs() < 1e-12);
        assert!((rows[0].reward - 0.06).abs() < 1e-12);
        assert!((rows[0].rr_ratio.unwrap() - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_risk_yields_undefined_ratio() {
        let rows =
            derive_metrics(vec![make_trade("2024-01-01T10:00:00Z", 1.10, 1.10, 1.16)]).unwrap();
        assert_eq!(rows[0].rr_ratio, None);
    }

    #[test]
    fn test_empty_log_rejected() {
        assert!(matches!(derive_metrics(Vec::new()), Err(DataError::EmptyLog)));
    }

    #[test]
    fn test_non_finite_field_rejected() {
        let mut trade = make_trade("2024-01-01T10:00:00Z", 1.10, 1.08, 1.16);
        trade.net_pnl = f64::NAN;
        let err = derive_metrics(vec![trade]).unwrap_err();
        assert_eq!(
            err,
            DataError::NonFiniteField {
                field: "netPNL",
                row: 0
            }
        );
    }
}
