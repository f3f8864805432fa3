use std::time::Duration;
use thiserror::Error;

/// Why an interval literal was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IntervalError {
    #[error("Interval is empty")]
    Empty,

    #[error("Invalid interval {0:?}: expected e.g. \"30s\", \"1m30s\" or \"1.5h\"")]
    Invalid(String),

    #[error("Missing unit in interval {0:?} (use ns, us, ms, s, m or h)")]
    MissingUnit(String),

    #[error("Unknown unit {unit:?} in interval {input:?} (use ns, us, ms, s, m or h)")]
    UnknownUnit { unit: String, input: String },

    #[error("Interval {0:?} is too large")]
    Overflow(String),

    #[error("Interval must be positive, got {0:?}")]
    NonPositive(String),
}

/// Digits of a fractional part that are significant at nanosecond scale.
const MAX_FRACTION_DIGITS: usize = 18;

/// Parse a duration literal such as `"1m30s"`, `"500ms"` or `"1.5h"`.
///
/// The literal is a sequence of decimal numbers, each followed by a unit
/// (`ns`, `us`/`µs`, `ms`, `s`, `m`, `h`), optionally signed. Only strictly
/// positive results are accepted since the value drives a polling period.
pub fn parse_interval(input: &str) -> Result<Duration, IntervalError> {
    let literal = input.trim();
    if literal.is_empty() {
        return Err(IntervalError::Empty);
    }

    let (negative, mut rest) = match literal.as_bytes()[0] {
        b'-' => (true, &literal[1..]),
        b'+' => (false, &literal[1..]),
        _ => (false, literal),
    };
    if rest == "0" {
        return Err(IntervalError::NonPositive(input.to_string()));
    }
    if rest.is_empty() {
        return Err(IntervalError::Invalid(input.to_string()));
    }

    let mut total: u128 = 0;
    while !rest.is_empty() {
        let number_end = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        let number = &rest[..number_end];
        if number.is_empty() || number == "." || number.matches('.').count() > 1 {
            return Err(IntervalError::Invalid(input.to_string()));
        }
        rest = &rest[number_end..];

        let unit_end = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let unit = &rest[..unit_end];
        rest = &rest[unit_end..];

        let unit_nanos: u128 = match unit {
            "ns" => 1,
            "us" | "µs" | "μs" => 1_000,
            "ms" => 1_000_000,
            "s" => 1_000_000_000,
            "m" => 60 * 1_000_000_000,
            "h" => 3_600 * 1_000_000_000,
            "" => return Err(IntervalError::MissingUnit(input.to_string())),
            other => {
                return Err(IntervalError::UnknownUnit {
                    unit: other.to_string(),
                    input: input.to_string(),
                })
            }
        };

        let overflow = || IntervalError::Overflow(input.to_string());
        let (whole_digits, fraction_digits) = number.split_once('.').unwrap_or((number, ""));

        let whole: u128 = if whole_digits.is_empty() {
            0
        } else {
            whole_digits.parse().map_err(|_| overflow())?
        };

        let mut fraction: u128 = 0;
        let mut scale: u128 = 1;
        for digit in fraction_digits.bytes().take(MAX_FRACTION_DIGITS) {
            fraction = fraction * 10 + u128::from(digit - b'0');
            scale *= 10;
        }

        let nanos = whole
            .checked_mul(unit_nanos)
            .and_then(|n| n.checked_add(fraction * unit_nanos / scale))
            .ok_or_else(overflow)?;
        total = total.checked_add(nanos).ok_or_else(overflow)?;
    }

    if negative || total == 0 {
        return Err(IntervalError::NonPositive(input.to_string()));
    }

    let nanos = u64::try_from(total).map_err(|_| IntervalError::Overflow(input.to_string()))?;
    Ok(Duration::from_nanos(nanos))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_units() {
        assert_eq!(parse_interval("1h").unwrap(), Duration::from_secs(3600));
        assert_eq!(parse_interval("5m").unwrap(), Duration::from_secs(300));
        assert_eq!(parse_interval("30s").unwrap(), Duration::from_secs(30));
        assert_eq!(parse_interval("250ms").unwrap(), Duration::from_millis(250));
        assert_eq!(parse_interval("10us").unwrap(), Duration::from_micros(10));
        assert_eq!(parse_interval("10µs").unwrap(), Duration::from_micros(10));
        assert_eq!(parse_interval("7ns").unwrap(), Duration::from_nanos(7));
    }

    #[test]
    fn test_compound_literal() {
        assert_eq!(parse_interval("1m30s").unwrap(), Duration::from_secs(90));
        assert_eq!(
            parse_interval("1h2m3s4ms").unwrap(),
            Duration::from_millis(3_723_004)
        );
    }

    #[test]
    fn test_fractions() {
        assert_eq!(parse_interval("1.5h").unwrap(), Duration::from_secs(5400));
        assert_eq!(parse_interval(".5s").unwrap(), Duration::from_millis(500));
        assert_eq!(parse_interval("2.s").unwrap(), Duration::from_secs(2));
    }

    #[test]
    fn test_leading_plus_and_whitespace() {
        assert_eq!(parse_interval(" +10s ").unwrap(), Duration::from_secs(10));
    }

    #[test]
    fn test_rejects_non_positive() {
        assert!(matches!(parse_interval("0"), Err(IntervalError::NonPositive(_))));
        assert!(matches!(parse_interval("0s"), Err(IntervalError::NonPositive(_))));
        assert!(matches!(parse_interval("-1m"), Err(IntervalError::NonPositive(_))));
    }

    #[test]
    fn test_rejects_missing_or_unknown_unit() {
        assert!(matches!(parse_interval("10"), Err(IntervalError::MissingUnit(_))));
        assert!(matches!(
            parse_interval("10d"),
            Err(IntervalError::UnknownUnit { ref unit, .. }) if unit == "d"
        ));
    }

    #[test]
    fn test_rejects_garbage() {
        assert_eq!(parse_interval(""), Err(IntervalError::Empty));
        assert!(matches!(parse_interval("abc"), Err(IntervalError::Invalid(_))));
        assert!(matches!(parse_interval("1..5s"), Err(IntervalError::Invalid(_))));
        assert!(matches!(parse_interval("-"), Err(IntervalError::Invalid(_))));
        assert!(matches!(parse_interval("s"), Err(IntervalError::Invalid(_))));
    }

    #[test]
    fn test_rejects_overflow() {
        assert!(matches!(
            parse_interval("99999999999999999999999h"),
            Err(IntervalError::Overflow(_))
        ));
    }
}
