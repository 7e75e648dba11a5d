// Run and test metrics

use std::collections::BTreeMap;

/// Metric name to value, ordered by name
pub type Metrics = BTreeMap<String, String>;

/// Merge `incoming` into `existing`.
///
/// Without aggregation each incoming value replaces the stored one. With
/// aggregation, values present on both sides are summed when both parse as
/// numbers; integers stay integers unless either side is decimal. Any value
/// that is not numeric makes the incoming value win.
pub fn merge_metrics(existing: &mut Metrics, incoming: &Metrics, aggregate: bool) {
    for (key, value) in incoming {
        let merged = match existing.get(key) {
            Some(previous) if aggregate => combine_values(previous, value),
            _ => value.clone(),
        };
        existing.insert(key.clone(), merged);
    }
}

fn combine_values(previous: &str, incoming: &str) -> String {
    if let (Ok(a), Ok(b)) = (previous.parse::<i64>(), incoming.parse::<i64>())
        && let Some(sum) = a.checked_add(b)
    {
        return sum.to_string();
    }
    match (parse_decimal(previous), parse_decimal(incoming)) {
        (Some(a), Some(b)) => format_decimal(a + b),
        _ => incoming.to_string(),
    }
}

fn parse_decimal(value: &str) -> Option<f64> {
    value.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

// Debug keeps the fractional part for whole numbers ("3.0") while printing
// the shortest round-trip form otherwise ("2.2").
fn format_decimal(value: f64) -> String {
    format!("{:?}", value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn merge_twice(first: &str, second: &str) -> String {
        let mut stored = Metrics::new();
        let key = "key".to_string();
        merge_metrics(&mut stored, &Metrics::from([(key.clone(), first.into())]), true);
        merge_metrics(&mut stored, &Metrics::from([(key.clone(), second.into())]), true);
        stored.remove(&key).unwrap()
    }

    #[test]
    fn test_aggregate_integers() {
        assert_eq!(merge_twice("1", "1"), "2");
    }

    #[test]
    fn test_aggregate_decimals() {
        assert_eq!(merge_twice("1.1", "1.1"), "2.2");
    }

    #[test]
    fn test_aggregate_mixed() {
        assert_eq!(merge_twice("1", "1.1"), "2.1");
    }

    #[test]
    fn test_aggregate_whole_decimal_keeps_point() {
        assert_eq!(merge_twice("1.5", "1.5"), "3.0");
    }

    #[test]
    fn test_aggregate_new_value_not_numeric() {
        assert_eq!(merge_twice("1", "bar"), "bar");
    }

    #[test]
    fn test_aggregate_existing_value_not_numeric() {
        assert_eq!(merge_twice("bar", "1"), "1");
    }

    #[test]
    fn test_aggregate_rejects_non_finite() {
        assert_eq!(merge_twice("1", "NaN"), "NaN");
        assert_eq!(merge_twice("inf", "1"), "1");
    }

    #[test]
    fn test_integer_overflow_falls_back_to_decimal() {
        let merged = merge_twice(&i64::MAX.to_string(), "1");
        assert!(merged.parse::<f64>().is_ok());
    }

    #[test]
    fn test_overwrite_without_aggregation() {
        let mut stored = Metrics::from([("k".to_string(), "1".to_string())]);
        merge_metrics(&mut stored, &Metrics::from([("k".into(), "1".into())]), false);
        assert_eq!(stored["k"], "1");
    }

    #[test]
    fn test_new_keys_inserted() {
        let mut stored = Metrics::new();
        merge_metrics(&mut stored, &Metrics::from([("k".into(), "v".into())]), true);
        assert_eq!(stored["k"], "v");
    }
}
