//! Shared statistics and quantile-bucketing utilities
//!
//! Degenerate inputs (empty samples, single values, tied boundaries) resolve
//! to `None` or to fewer buckets, never to a panic.

use std::cmp::Ordering;

/// Mean of a sample; `None` on empty input.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Sample standard deviation (n − 1 divisor); `None` for fewer than 2 values.
pub fn std_dev(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let n = values.len() as f64;
    let m = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (n - 1.0);
    Some(variance.sqrt())
}

/// Linear-interpolation quantile over an ascending-sorted, non-empty slice.
/// `q` is clamped to `[0, 1]`.
pub fn quantile(sorted: &[f64], q: f64) -> f64 {
    let q = q.clamp(0.0, 1.0);
    let n = sorted.len();
    if n == 1 {
        return sorted[0];
    }
    let pos = q * (n - 1) as f64;
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    if lower == upper {
        return sorted[lower];
    }
    let weight = pos - lower as f64;
    sorted[lower] * (1.0 - weight) + sorted[upper] * weight
}

/// Edges for `min(n, k)` equal-frequency buckets over `values`.
///
/// Returns an ascending edge list of length `bucket_count + 1`. Tied quantile
/// boundaries are dropped, yielding fewer, wider buckets rather than failing;
/// a single distinct value collapses to one bucket. Empty input or `k == 0`
/// returns an empty edge list.
pub fn quantile_edges(values: &[f64], k: usize) -> Vec<f64> {
    if values.is_empty() || k == 0 {
        return Vec::new();
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));

    let buckets = k.min(sorted.len());
    let mut edges: Vec<f64> = (0..=buckets)
        .map(|i| quantile(&sorted, i as f64 / buckets as f64))
        .collect();
    edges.dedup();
    if edges.len() == 1 {
        // All values identical: keep a single degenerate bucket
        edges.push(edges[0]);
    }
    edges
}

/// Index of the bucket containing `value` for the given edge list.
///
/// Intervals are `(edges[i], edges[i + 1]]`; the minimum edge value itself
/// belongs to bucket 0 and out-of-range values clamp to the end buckets, so
/// the result never indexes past `edges.len() - 2`.
pub fn bucket_index(edges: &[f64], value: f64) -> usize {
    debug_assert!(edges.len() >= 2);
    let buckets = edges.len() - 1;
    for i in 0..buckets {
        if value <= edges[i + 1] {
            return i;
        }
    }
    buckets - 1
}

/// Round to 4 decimal places
pub fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean_empty_is_undefined() {
        assert_eq!(mean(&[]), None);
        assert_eq!(mean(&[2.0, 4.0]), Some(3.0));
    }

    #[test]
    fn test_std_dev_single_value_is_undefined() {
        assert_eq!(std_dev(&[]), None);
        assert_eq!(std_dev(&[5.0]), None);
    }

    #[test]
    fn test_std_dev_sample_divisor() {
        // var = ((1-2.5)² + (2-2.5)² + (3-2.5)² + (4-2.5)²) / 3 = 5/3
        let sd = std_dev(&[1.0, 2.0, 3.0, 4.0]).unwrap();
        assert!((sd - (5.0f64 / 3.0).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_quantile_basic() {
        let vals = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(quantile(&vals, 0.0), 1.0);
        assert_eq!(quantile(&vals, 0.25), 2.0);
        assert_eq!(quantile(&vals, 0.5), 3.0);
        assert_eq!(quantile(&vals, 1.0), 5.0);
    }

    #[test]
    fn test_quantile_interpolates() {
        let vals = [1.0, 2.0];
        assert!((quantile(&vals, 0.5) - 1.5).abs() < 1e-12);
    }

    #[test]
    fn test_edges_never_exceed_row_count() {
        for n in 1..=10usize {
            let values: Vec<f64> = (1..=n).map(|v| v as f64).collect();
            let edges = quantile_edges(&values, 4);
            let buckets = edges.len() - 1;
            assert!(buckets >= 1, "n={} produced no buckets", n);
            assert!(buckets <= 4, "n={} produced {} buckets", n, buckets);
            assert!(buckets <= n, "n={} produced {} buckets", n, buckets);
            // Every value must land inside the label range
            for v in &values {
                assert!(bucket_index(&edges, *v) < buckets);
            }
        }
    }

    #[test]
    fn test_tied_boundaries_are_dropped() {
        // Heavy ties collapse the lower quartile edges
        let values = [1.0, 1.0, 1.0, 2.0];
        let edges = quantile_edges(&values, 4);
        let buckets = edges.len() - 1;
        assert!(buckets < 4);
        assert_eq!(bucket_index(&edges, 1.0), 0);
    }

    #[test]
    fn test_constant_values_collapse_to_one_bucket() {
        let edges = quantile_edges(&[5.0, 5.0, 5.0, 5.0, 5.0], 4);
        assert_eq!(edges.len(), 2);
        assert_eq!(bucket_index(&edges, 5.0), 0);
    }

    #[test]
    fn test_bucket_index_bounds() {
        let edges = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(bucket_index(&edges, 1.0), 0); // minimum belongs to bucket 0
        assert_eq!(bucket_index(&edges, 2.5), 1);
        assert_eq!(bucket_index(&edges, 4.0), 2);
        assert_eq!(bucket_index(&edges, 99.0), 2); // clamps to the last bucket
    }

    #[test]
    fn test_round4() {
        assert_eq!(round4(0.123456), 0.1235);
        assert_eq!(round4(2.0), 2.0);
    }
}
