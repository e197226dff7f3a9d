//! Value Normalizer
//!
//! Maps heterogeneous attribute values onto integer gauge values:
//!
//! | raw value                        | result                  |
//! |----------------------------------|-------------------------|
//! | absent                           | skipped (no sample)     |
//! | `on` / `true` (any case)         | 1                       |
//! | `off` / `false` (any case)       | 0                       |
//! | other text                       | decimal, truncated to 0 |
//! | number                           | truncated toward zero   |
//! | boolean                          | 1 / 0                   |

use crate::domain::RawValue;
use crate::error::{Error, Result};

/// Normalize a raw attribute value.
///
/// Returns `Ok(None)` when the value is absent and no sample should be
/// emitted, and `Error::InvalidMetricValue` for text that is neither a known
/// flag nor a decimal number.
pub fn normalize(value: Option<&RawValue>) -> Result<Option<i64>> {
    let Some(value) = value else {
        return Ok(None);
    };

    let normalized = match value {
        RawValue::Text(text) => normalize_text(text)?,
        RawValue::Number(n) => truncate(*n, &n.to_string())?,
        RawValue::Flag(b) => i64::from(*b),
    };
    Ok(Some(normalized))
}

fn normalize_text(text: &str) -> Result<i64> {
    match text.to_ascii_uppercase().as_str() {
        "ON" | "TRUE" => return Ok(1),
        "OFF" | "FALSE" => return Ok(0),
        _ => {}
    }

    let parsed: f64 = text.trim().parse().map_err(|_| invalid(text))?;
    truncate(parsed, text)
}

fn truncate(n: f64, original: &str) -> Result<i64> {
    if !n.is_finite() {
        return Err(invalid(original));
    }
    Ok(n.trunc() as i64)
}

fn invalid(value: &str) -> Error {
    Error::InvalidMetricValue {
        value: value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn text(s: &str) -> Option<RawValue> {
        Some(RawValue::from(s))
    }

    #[test]
    fn test_absent_is_skipped() {
        assert_eq!(normalize(None).unwrap(), None);
    }

    #[test]
    fn test_truthy_flags() {
        for v in ["ON", "on", "True", "TRUE", "true", "oN"] {
            assert_eq!(normalize(text(v).as_ref()).unwrap(), Some(1), "{v}");
        }
    }

    #[test]
    fn test_falsy_flags() {
        for v in ["OFF", "off", "False", "FALSE", "oFf"] {
            assert_eq!(normalize(text(v).as_ref()).unwrap(), Some(0), "{v}");
        }
    }

    #[test]
    fn test_numeric_text() {
        assert_eq!(normalize(text("42").as_ref()).unwrap(), Some(42));
        assert_eq!(normalize(text("3.9").as_ref()).unwrap(), Some(3));
        assert_eq!(normalize(text("-2.7").as_ref()).unwrap(), Some(-2));
        assert_eq!(normalize(text(" 7 ").as_ref()).unwrap(), Some(7));
    }

    #[test]
    fn test_invalid_text() {
        for v in ["ROOTDSE", "ERROR", "", "12abc", "NaN", "inf"] {
            let result = normalize(text(v).as_ref());
            assert!(
                matches!(result, Err(Error::InvalidMetricValue { .. })),
                "{v} should be rejected"
            );
        }
    }

    #[test]
    fn test_numbers_and_booleans() {
        assert_eq!(normalize(Some(&RawValue::Number(5.99))).unwrap(), Some(5));
        assert_eq!(normalize(Some(&RawValue::Number(-0.5))).unwrap(), Some(0));
        assert_eq!(normalize(Some(&RawValue::from(true))).unwrap(), Some(1));
        assert_eq!(normalize(Some(&RawValue::from(false))).unwrap(), Some(0));
        assert!(normalize(Some(&RawValue::Number(f64::NAN))).is_err());
    }

    proptest! {
        /// Integers survive normalization unchanged whether numeric or textual.
        #[test]
        fn prop_integers_round_trip(n in -1_000_000i64..1_000_000) {
            prop_assert_eq!(normalize(Some(&RawValue::from(n))).unwrap(), Some(n));
            prop_assert_eq!(normalize(Some(&RawValue::Text(n.to_string()))).unwrap(), Some(n));
        }

        /// Decimal text truncates toward zero.
        #[test]
        fn prop_decimal_text_truncates(x in -1.0e6f64..1.0e6) {
            let got = normalize(Some(&RawValue::Text(x.to_string()))).unwrap();
            prop_assert_eq!(got, Some(x.trunc() as i64));
        }
    }
}
