//! Pure unit conversions shared by the mapping pipeline.
//!
//! All of these are total: malformed input degrades to a safe default
//! instead of failing, because a single bad field must never sink a record.

use serde_json::Value;

/// Unix seconds → millisecond epoch, the encoding Bitable date columns take.
pub fn to_store_timestamp(unix_secs: i64) -> i64 {
    unix_secs.max(0).saturating_mul(1000)
}

/// Milliseconds → seconds with two decimal places.
///
/// Rounds half away from zero on the second decimal, computed in integer
/// centiseconds so boundary values are exact: 1234 ms → 1.23, 1235 ms → 1.24.
pub fn millis_to_seconds(duration_ms: i64) -> f64 {
    let centis = duration_ms.max(0).saturating_add(5) / 10;
    centis as f64 / 100.0
}

/// Minor currency units (fen) → major units (yuan).
pub fn minor_to_major(price_minor: i64) -> f64 {
    price_minor as f64 / 100.0
}

/// Coerce a loose JSON value into a non-negative integer counter.
///
/// Null, absent, negative and non-numeric values all map to 0; floats
/// truncate toward zero; integer-valued strings parse (the platform has been
/// seen quoting counters).
pub fn coerce_count(value: &Value) -> u64 {
    match value {
        Value::Number(n) => {
            if let Some(u) = n.as_u64() {
                u
            } else if let Some(f) = n.as_f64() {
                if f.is_finite() && f > 0.0 {
                    f.trunc() as u64
                } else {
                    0
                }
            } else {
                0
            }
        }
        Value::String(s) => match s.trim().parse::<i64>() {
            Ok(i) if i > 0 => i as u64,
            _ => 0,
        },
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn timestamps_scale_to_millis() {
        assert_eq!(to_store_timestamp(1_700_000_000), 1_700_000_000_000);
        assert_eq!(to_store_timestamp(0), 0);
        assert_eq!(to_store_timestamp(-5), 0);
    }

    #[test]
    fn durations_round_to_two_decimals() {
        assert_eq!(millis_to_seconds(125_000), 125.0);
        assert_eq!(millis_to_seconds(1_234), 1.23);
        assert_eq!(millis_to_seconds(0), 0.0);
        assert_eq!(millis_to_seconds(-300), 0.0);
    }

    #[test]
    fn duration_ties_round_up() {
        // half-away-from-zero on the second decimal
        assert_eq!(millis_to_seconds(1_235), 1.24);
        assert_eq!(millis_to_seconds(15), 0.02);
    }

    #[test]
    fn prices_convert_to_major_units() {
        assert_eq!(minor_to_major(9_900), 99.0);
        assert_eq!(minor_to_major(1), 0.01);
        assert_eq!(minor_to_major(0), 0.0);
    }

    #[test]
    fn counters_coerce_to_non_negative_integers() {
        assert_eq!(coerce_count(&json!(42)), 42);
        assert_eq!(coerce_count(&json!(-7)), 0);
        assert_eq!(coerce_count(&json!(3.9)), 3);
        assert_eq!(coerce_count(&json!("1500")), 1500);
        assert_eq!(coerce_count(&json!("not a number")), 0);
        assert_eq!(coerce_count(&json!(null)), 0);
        assert_eq!(coerce_count(&json!([1, 2])), 0);
    }
}
