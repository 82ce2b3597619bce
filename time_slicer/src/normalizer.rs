use crate::error::FormatError;
use crate::models::Timestamp;
use chrono::format::ParseErrorKind;
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime};
use log::warn;

/// Layouts tried, in order, when no input format is configured.
pub const DEFAULT_INPUT_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M:%S%.f%z",
    "%Y-%m-%dT%H:%M:%S%.fZ",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
];

/// Parse `raw` with `format`, correcting the "24:00" rollover into midnight of the next day.
pub fn normalize(raw: &str, format: &str) -> Result<Timestamp, FormatError> {
    if let Ok(ts) = parse_exact(raw, format) {
        return Ok(ts);
    }

    let (find, replace) = if raw.contains("2400") {
        ("2400", "0000")
    } else if raw.contains("24:00") {
        ("24:00", "00:00")
    } else {
        return Err(FormatError::new(raw, format));
    };

    let corrected = raw.replacen(find, replace, 1);
    let rolled = parse_exact(&corrected, format)
        .ok()
        .and_then(|ts| ts.checked_add(Duration::days(1)))
        .ok_or_else(|| FormatError::new(raw, format))?;

    warn!(
        "Auto-correcting unparsable time '{}' ({}) to {}",
        raw,
        format,
        rolled.naive_local()
    );
    Ok(rolled)
}

/// Try each format in turn; the first one that parses (with rollover correction) wins.
pub fn normalize_with_fallbacks<S: AsRef<str>>(raw: &str, formats: &[S]) -> Result<Timestamp, FormatError> {
    for format in formats {
        if let Ok(ts) = parse_exact(raw, format.as_ref()) {
            return Ok(ts);
        }
    }
    // Only attempt rollover once no format accepts the value as-is.
    for format in formats {
        if let Ok(ts) = normalize(raw, format.as_ref()) {
            return Ok(ts);
        }
    }

    let tried: Vec<&str> = formats.iter().map(|f| f.as_ref()).collect();
    Err(FormatError::new(raw, &tried.join(" | ")))
}

/// RFC 3339 first, then [`DEFAULT_INPUT_FORMATS`].
pub fn normalize_inferred(raw: &str) -> Result<Timestamp, FormatError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw.trim()) {
        return Ok(Timestamp::Aware(dt));
    }
    normalize_with_fallbacks(raw, DEFAULT_INPUT_FORMATS)
}

fn parse_exact(raw: &str, format: &str) -> Result<Timestamp, chrono::ParseError> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_str(raw, format) {
        return Ok(Timestamp::Aware(dt));
    }
    match NaiveDateTime::parse_from_str(raw, format) {
        Ok(naive) => Ok(Timestamp::Naive(naive)),
        // Date-only formats leave the time unset.
        Err(e) if e.kind() == ParseErrorKind::NotEnough => NaiveDate::parse_from_str(raw, format)
            .map(|date| Timestamp::Naive(date.and_time(NaiveTime::MIN))),
        Err(e) => Err(e),
    }
}
