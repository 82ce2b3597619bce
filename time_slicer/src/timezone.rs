use crate::error::TimezoneError;
use crate::models::{Timestamp, Zone, ZonedTimestamp};
use chrono::{Duration, Utc};
use log::{info, warn};

/// Whether an index carries offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexState {
    Empty,
    Naive,
    Aware,
    Mixed,
}

pub fn index_state(index: &[Timestamp]) -> IndexState {
    let aware = index.iter().filter(|ts| ts.is_aware()).count();
    match aware {
        _ if index.is_empty() => IndexState::Empty,
        0 => IndexState::Naive,
        n if n == index.len() => IndexState::Aware,
        _ => IndexState::Mixed,
    }
}

/// Shift naive values by `hours` and localize them in `destination`; convert aware
/// values to `destination` without shifting.
pub fn adjust(index: &[Timestamp], hours: f64, destination: &str) -> Result<Vec<ZonedTimestamp>, TimezoneError> {
    let zone = Zone::parse(destination)?;
    let shift = hours_to_duration(hours)?;

    match index_state(index) {
        IndexState::Empty => return Ok(Vec::new()),
        IndexState::Naive => info!("Shifting {} naive timestamps by {}h and localizing to {}", index.len(), hours, zone),
        IndexState::Aware => info!("Converting {} aware timestamps to {}", index.len(), zone),
        IndexState::Mixed => warn!(
            "Index mixes naive and aware timestamps; shifting naive values by {}h, converting aware values to {}",
            hours, zone
        ),
    }

    index
        .iter()
        .map(|ts| match ts {
            Timestamp::Naive(naive) => {
                let shifted = naive
                    .checked_add_signed(shift)
                    .ok_or(TimezoneError::InvalidShift(hours))?;
                zone.localize(shifted)
            }
            Timestamp::Aware(dt) => Ok(ZonedTimestamp::new(dt.with_timezone(&Utc), zone)),
        })
        .collect()
}

/// Attach `zone` to a naive index. Aware values are an error, not a no-op.
pub fn localize(index: &[Timestamp], zone: Zone) -> Result<Vec<ZonedTimestamp>, TimezoneError> {
    index
        .iter()
        .map(|ts| match ts {
            Timestamp::Naive(naive) => zone.localize(*naive),
            Timestamp::Aware(_) => Err(TimezoneError::AlreadyAware),
        })
        .collect()
}

/// Used when no adjustment is requested: naive values are taken to be in `zone`,
/// aware values keep the offset they were parsed with.
pub fn assume_zone(index: &[Timestamp], zone: Zone) -> Result<Vec<ZonedTimestamp>, TimezoneError> {
    index
        .iter()
        .map(|ts| match ts {
            Timestamp::Naive(naive) => zone.localize(*naive),
            Timestamp::Aware(dt) => Ok(ZonedTimestamp::new(dt.with_timezone(&Utc), Zone::Fixed(*dt.offset()))),
        })
        .collect()
}

fn hours_to_duration(hours: f64) -> Result<Duration, TimezoneError> {
    let millis = hours * 3_600_000.0;
    if !millis.is_finite() || millis.abs() > i64::MAX as f64 {
        return Err(TimezoneError::InvalidShift(hours));
    }
    Duration::try_milliseconds(millis.round() as i64).ok_or(TimezoneError::InvalidShift(hours))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DEFAULT_OUTPUT_FORMAT;
    use chrono::{DateTime, NaiveDateTime};

    fn naive(s: &str) -> Timestamp {
        Timestamp::Naive(NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S").unwrap())
    }

    fn aware(s: &str) -> Timestamp {
        Timestamp::Aware(DateTime::parse_from_rfc3339(s).unwrap())
    }

    fn rendered(index: &[ZonedTimestamp]) -> Vec<String> {
        index.iter().map(|ts| ts.render(DEFAULT_OUTPUT_FORMAT).unwrap()).collect()
    }

    #[test]
    fn test_naive_shift_then_localize() {
        let out = adjust(&[naive("2024-01-01T00:00:00")], 3.5, "UTC").unwrap();
        assert_eq!(rendered(&out), vec!["2024-01-01T03:30:00+00:00"]);
    }

    #[test]
    fn test_negative_shift_into_named_zone() {
        let out = adjust(&[naive("2024-07-01T12:00:00")], -2.0, "America/Chicago").unwrap();
        assert_eq!(rendered(&out), vec!["2024-07-01T10:00:00-05:00"]);
    }

    #[test]
    fn test_aware_values_are_converted_not_shifted() {
        let out = adjust(&[aware("2024-01-01T12:00:00+02:00")], 3.5, "UTC").unwrap();
        assert_eq!(rendered(&out), vec!["2024-01-01T10:00:00+00:00"]);
    }

    #[test]
    fn test_mixed_index_takes_per_value_path() {
        let index = [naive("2024-01-01T00:00:00"), aware("2024-01-01T05:00:00+01:00")];
        assert_eq!(index_state(&index), IndexState::Mixed);
        let out = adjust(&index, 1.0, "UTC").unwrap();
        assert_eq!(
            rendered(&out),
            vec!["2024-01-01T01:00:00+00:00", "2024-01-01T04:00:00+00:00"]
        );
    }

    #[test]
    fn test_order_is_preserved() {
        let index = [
            naive("2024-01-01T00:00:00"),
            naive("2024-01-01T00:05:00"),
            naive("2024-01-01T00:10:00"),
        ];
        let out = adjust(&index, 6.0, "Europe/Berlin").unwrap();
        assert!(out.windows(2).all(|w| w[0].instant() <= w[1].instant()));
    }

    #[test]
    fn test_errors() {
        assert_eq!(
            adjust(&[naive("2024-01-01T00:00:00")], 1.0, "Nowhere/Land"),
            Err(TimezoneError::UnknownZone("Nowhere/Land".to_string()))
        );
        assert!(matches!(
            adjust(&[naive("2024-01-01T00:00:00")], f64::NAN, "UTC"),
            Err(TimezoneError::InvalidShift(_))
        ));
        assert_eq!(
            localize(&[aware("2024-01-01T00:00:00+00:00")], Zone::utc()),
            Err(TimezoneError::AlreadyAware)
        );
    }

    #[test]
    fn test_assume_zone_keeps_parsed_offsets() {
        let out = assume_zone(
            &[naive("2024-01-01T00:00:00"), aware("2024-01-01T00:00:00-05:00")],
            Zone::utc(),
        )
        .unwrap();
        assert_eq!(
            rendered(&out),
            vec!["2024-01-01T00:00:00+00:00", "2024-01-01T00:00:00-05:00"]
        );
    }

    #[test]
    fn test_index_state() {
        assert_eq!(index_state(&[]), IndexState::Empty);
        assert_eq!(index_state(&[naive("2024-01-01T00:00:00")]), IndexState::Naive);
        assert_eq!(index_state(&[aware("2024-01-01T00:00:00Z")]), IndexState::Aware);
    }
}
