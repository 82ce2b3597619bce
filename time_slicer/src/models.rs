use crate::error::{Result, SlicerError, TimezoneError};
use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Duration, DurationRound, FixedOffset, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use std::fmt::{self, Write};

/// Ordered cells of one row, aligned with the owning table's column names.
pub type Record = Vec<String>;

/// Output rendering used when none is configured (ISO-8601 with offset).
pub const DEFAULT_OUTPUT_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%:z";

/// A parsed timestamp before any zone has been decided for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timestamp {
    Naive(NaiveDateTime),
    Aware(DateTime<FixedOffset>),
}

impl Timestamp {
    pub fn is_aware(&self) -> bool {
        matches!(self, Timestamp::Aware(_))
    }

    /// Wall-clock value, ignoring any offset.
    pub fn naive_local(&self) -> NaiveDateTime {
        match self {
            Timestamp::Naive(naive) => *naive,
            Timestamp::Aware(dt) => dt.naive_local(),
        }
    }

    pub fn checked_add(self, delta: Duration) -> Option<Self> {
        match self {
            Timestamp::Naive(naive) => naive.checked_add_signed(delta).map(Timestamp::Naive),
            Timestamp::Aware(dt) => dt.checked_add_signed(delta).map(Timestamp::Aware),
        }
    }

    /// Render through a strftime format. Offset specifiers fail on naive values.
    pub fn render(&self, format: &str) -> Result<String> {
        let mut out = String::new();
        let written = match self {
            Timestamp::Naive(naive) => write!(out, "{}", naive.format(format)),
            Timestamp::Aware(dt) => write!(out, "{}", dt.format(format)),
        };
        written.map_err(|_| render_error(format, &self.naive_local().to_string()))?;
        Ok(out)
    }
}

/// The zone a timestamp is displayed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Zone {
    Named(Tz),
    Fixed(FixedOffset),
}

impl Zone {
    pub fn utc() -> Self {
        Zone::Named(Tz::UTC)
    }

    /// Accepts IANA names (`UTC`, `America/Chicago`) and offsets (`+05:30`).
    pub fn parse(label: &str) -> std::result::Result<Self, TimezoneError> {
        let label = label.trim();
        if let Ok(tz) = label.parse::<Tz>() {
            return Ok(Zone::Named(tz));
        }
        label
            .parse::<FixedOffset>()
            .map(Zone::Fixed)
            .map_err(|_| TimezoneError::UnknownZone(label.to_string()))
    }

    /// Attach this zone to a wall-clock value without changing it.
    pub fn localize(&self, local: NaiveDateTime) -> std::result::Result<ZonedTimestamp, TimezoneError> {
        let (single, earliest) = self.candidates(local);
        match (single, earliest) {
            (Some(instant), _) => Ok(ZonedTimestamp::new(instant, *self)),
            (None, Some(_)) => Err(TimezoneError::Ambiguous {
                local,
                zone: self.to_string(),
            }),
            (None, None) => Err(TimezoneError::Nonexistent {
                local,
                zone: self.to_string(),
            }),
        }
    }

    /// Like [`localize`](Self::localize), but a wall-clock value that occurs twice
    /// (DST fall back) resolves to its first occurrence.
    pub fn localize_earliest(&self, local: NaiveDateTime) -> std::result::Result<ZonedTimestamp, TimezoneError> {
        match self.candidates(local) {
            (_, Some(instant)) => Ok(ZonedTimestamp::new(instant, *self)),
            _ => Err(TimezoneError::Nonexistent {
                local,
                zone: self.to_string(),
            }),
        }
    }

    /// The unique instant for `local`, if any, and its earliest instant, if any.
    fn candidates(&self, local: NaiveDateTime) -> (Option<DateTime<Utc>>, Option<DateTime<Utc>>) {
        match self {
            Zone::Named(tz) => {
                let mapped = tz.from_local_datetime(&local);
                (
                    mapped.single().map(|dt| dt.with_timezone(&Utc)),
                    mapped.earliest().map(|dt| dt.with_timezone(&Utc)),
                )
            }
            Zone::Fixed(offset) => {
                let mapped = offset.from_local_datetime(&local);
                (
                    mapped.single().map(|dt| dt.with_timezone(&Utc)),
                    mapped.earliest().map(|dt| dt.with_timezone(&Utc)),
                )
            }
        }
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Zone::Named(tz) => f.write_str(tz.name()),
            Zone::Fixed(offset) => write!(f, "{}", offset),
        }
    }
}

/// An instant together with the zone it is displayed in.
///
/// Two values are the same point in time when their [`instant`](Self::instant)s
/// are equal; ordering, dedup and flooring all work on the instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZonedTimestamp {
    instant: DateTime<Utc>,
    zone: Zone,
}

impl ZonedTimestamp {
    pub fn new(instant: DateTime<Utc>, zone: Zone) -> Self {
        Self { instant, zone }
    }

    pub fn instant(&self) -> DateTime<Utc> {
        self.instant
    }

    pub fn zone(&self) -> Zone {
        self.zone
    }

    pub fn naive_local(&self) -> NaiveDateTime {
        match self.zone {
            Zone::Named(tz) => self.instant.with_timezone(&tz).naive_local(),
            Zone::Fixed(offset) => self.instant.with_timezone(&offset).naive_local(),
        }
    }

    /// Truncate down to a multiple of `step` in local wall-clock time.
    pub fn floor(self, step: Duration) -> Result<Self> {
        let floored = match self.zone {
            Zone::Named(tz) => self
                .instant
                .with_timezone(&tz)
                .duration_trunc(step)
                .map(|dt| dt.with_timezone(&Utc)),
            Zone::Fixed(offset) => self
                .instant
                .with_timezone(&offset)
                .duration_trunc(step)
                .map(|dt| dt.with_timezone(&Utc)),
        }
        .map_err(|e| SlicerError::config(format!("cannot floor {} to {}: {}", self.instant, step, e)))?;

        Ok(Self::new(floored, self.zone))
    }

    pub fn render(&self, format: &str) -> Result<String> {
        let mut out = String::new();
        let written = match self.zone {
            Zone::Named(tz) => write!(out, "{}", self.instant.with_timezone(&tz).format(format)),
            Zone::Fixed(offset) => write!(out, "{}", self.instant.with_timezone(&offset).format(format)),
        };
        written.map_err(|_| render_error(format, &self.instant.to_rfc3339()))?;
        Ok(out)
    }
}

fn render_error(format: &str, value: &str) -> SlicerError {
    SlicerError::config(format!("cannot render {} with format '{}'", value, format))
}

/// Reject strftime strings containing unknown specifiers before any row is touched.
pub fn validate_format(format: &str) -> Result<()> {
    if format.is_empty() {
        return Err(SlicerError::config("empty time format"));
    }
    if StrftimeItems::new(format).any(|item| matches!(item, Item::Error)) {
        return Err(SlicerError::config(format!("invalid time format '{}'", format)));
    }
    Ok(())
}
