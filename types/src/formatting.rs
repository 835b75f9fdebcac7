//! Value formatting used by template transforms.
//!
//! Overlay values are stored as strings, so every formatter accepts the raw
//! tag value and returns it unchanged when it does not parse as a number.

/// Format a large number with K/M suffix for compact display.
///
/// - Values >= 1,000,000 are formatted as `X.XXM`
/// - Values >= 1,000 are formatted as `X.XXK`
/// - Values below 1,000 are formatted as-is
///
/// # Examples
/// ```
/// use herald_types::formatting::format_compact;
/// assert_eq!(format_compact(500), "500");
/// assert_eq!(format_compact(1_500), "1.50K");
/// assert_eq!(format_compact(1_500_000), "1.50M");
/// ```
pub fn format_compact(n: i64) -> String {
    let n_abs = n.unsigned_abs();
    if n_abs >= 1_000_000 {
        format!("{:.2}M", n as f64 / 1_000_000.0)
    } else if n_abs >= 1_000 {
        format!("{:.2}K", n as f64 / 1_000.0)
    } else {
        format!("{}", n)
    }
}

/// Format a number with thousands separators.
///
/// # Examples
/// ```
/// use herald_types::formatting::format_thousands;
/// assert_eq!(format_thousands(0), "0");
/// assert_eq!(format_thousands(1_500), "1,500");
/// assert_eq!(format_thousands(-1_500_000), "-1,500,000");
/// ```
pub fn format_thousands(n: i64) -> String {
    let s = n.unsigned_abs().to_string();
    let mut result = String::with_capacity(s.len() + s.len() / 3 + 1);
    for (i, c) in s.chars().enumerate() {
        if i > 0 && (s.len() - i) % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    if n < 0 {
        result.insert(0, '-');
    }
    result
}

/// Format a duration as `M:SS`.
///
/// # Examples
/// ```
/// use herald_types::formatting::format_duration;
/// assert_eq!(format_duration(125), "2:05");
/// assert_eq!(format_duration(0), "0:00");
/// ```
pub fn format_duration(secs: i64) -> String {
    let secs = secs.max(0);
    format!("{}:{:02}", secs / 60, secs % 60)
}

/// Parse an overlay value as an integer, accepting integral floats (`"12.0"`).
fn parse_integer(value: &str) -> Option<i64> {
    let trimmed = value.trim();
    if let Ok(n) = trimmed.parse::<i64>() {
        return Some(n);
    }
    trimmed
        .parse::<f64>()
        .ok()
        .filter(|f| f.is_finite() && f.fract() == 0.0)
        .map(|f| f as i64)
}

/// Apply a named template transform to a tag value.
///
/// Returns `None` for unknown transform names so the caller can decide how to
/// report them. Numeric transforms leave non-numeric input untouched.
pub fn apply_transform(name: &str, value: &str) -> Option<String> {
    let out = match name.trim().to_ascii_lowercase().as_str() {
        "upper" => value.to_uppercase(),
        "lower" => value.to_lowercase(),
        "trim" => value.trim().to_string(),
        "compact" => parse_integer(value).map_or_else(|| value.to_string(), format_compact),
        "thousands" => parse_integer(value).map_or_else(|| value.to_string(), format_thousands),
        "duration" => parse_integer(value).map_or_else(|| value.to_string(), format_duration),
        _ => return None,
    };
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_compact() {
        assert_eq!(format_compact(0), "0");
        assert_eq!(format_compact(999), "999");
        assert_eq!(format_compact(1_000), "1.00K");
        assert_eq!(format_compact(15_000), "15.00K");
        assert_eq!(format_compact(1_000_000), "1.00M");
        assert_eq!(format_compact(-2_500), "-2.50K");
    }

    #[test]
    fn test_format_thousands() {
        assert_eq!(format_thousands(500), "500");
        assert_eq!(format_thousands(1_000), "1,000");
        assert_eq!(format_thousands(123_456), "123,456");
        assert_eq!(format_thousands(1_234_567), "1,234,567");
        assert_eq!(format_thousands(-1_500), "-1,500");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(59), "0:59");
        assert_eq!(format_duration(60), "1:00");
        assert_eq!(format_duration(-4), "0:00");
    }

    #[test]
    fn test_apply_transform() {
        assert_eq!(apply_transform("upper", "kappa").as_deref(), Some("KAPPA"));
        assert_eq!(apply_transform("LOWER", "KaPpA").as_deref(), Some("kappa"));
        assert_eq!(apply_transform("compact", "1500").as_deref(), Some("1.50K"));
        assert_eq!(apply_transform("compact", "12.0").as_deref(), Some("12"));
        assert_eq!(apply_transform("thousands", "not a number").as_deref(), Some("not a number"));
        assert_eq!(apply_transform("duration", "125").as_deref(), Some("2:05"));
        assert_eq!(apply_transform("sparkle", "x"), None);
    }
}
