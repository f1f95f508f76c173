//! Parsing of the collection interval.

use std::time::Duration;

/// Parse a duration from a human-readable string.
///
/// Supports the following suffixes:
/// - `s` or no suffix: seconds
/// - `m`: minutes
/// - `h`: hours
/// - `ms`: milliseconds
///
/// A bare number is read as seconds, which keeps `EXPORTER_COLLECT_INTERVAL=60`
/// working. Zero is rejected since it would poll the sensors back to back.
///
/// # Examples
/// ```
/// use mijia_exporter::duration::parse_duration;
/// use std::time::Duration;
///
/// assert_eq!(parse_duration("60").unwrap(), Duration::from_secs(60));
/// assert_eq!(parse_duration("5m").unwrap(), Duration::from_secs(300));
/// assert_eq!(parse_duration("500ms").unwrap(), Duration::from_millis(500));
/// ```
pub fn parse_duration(src: &str) -> Result<Duration, String> {
    let src = src.trim();

    if src.is_empty() {
        return Err("empty duration string".to_string());
    }

    let (num, unit, scale) = if let Some(num) = src.strip_suffix("ms") {
        (num, "milliseconds", Duration::from_millis(1))
    } else if let Some(num) = src.strip_suffix('h') {
        (num, "hours", Duration::from_secs(3600))
    } else if let Some(num) = src.strip_suffix('m') {
        (num, "minutes", Duration::from_secs(60))
    } else if let Some(num) = src.strip_suffix('s') {
        (num, "seconds", Duration::from_secs(1))
    } else {
        (src, "duration", Duration::from_secs(1))
    };

    let count: u32 = num
        .trim()
        .parse()
        .map_err(|_| format!("invalid {unit}: {num}"))?;
    if count == 0 {
        return Err("interval must be greater than zero".to_string());
    }

    Ok(scale * count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration_suffixes() {
        assert_eq!(parse_duration("30s").unwrap(), Duration::from_secs(30));
        assert_eq!(parse_duration("2m").unwrap(), Duration::from_secs(120));
        assert_eq!(parse_duration("1h").unwrap(), Duration::from_secs(3600));
        assert_eq!(parse_duration("250ms").unwrap(), Duration::from_millis(250));
    }

    #[test]
    fn test_parse_duration_bare_seconds() {
        assert_eq!(parse_duration("60").unwrap(), Duration::from_secs(60));
        assert_eq!(parse_duration(" 90 ").unwrap(), Duration::from_secs(90));
    }

    #[test]
    fn test_parse_duration_invalid() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("abc").is_err());
        assert!(parse_duration("-5s").is_err());
        assert_eq!(parse_duration("1.5m").unwrap_err(), "invalid minutes: 1.5");
    }

    #[test]
    fn test_parse_duration_rejects_zero() {
        assert!(parse_duration("0").is_err());
        assert!(parse_duration("0ms").is_err());
    }
}
