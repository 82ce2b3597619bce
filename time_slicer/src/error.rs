//! Error types for slicing operations.

use chrono::NaiveDateTime;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for slicing operations.
pub type Result<T> = std::result::Result<T, SlicerError>;

/// A timestamp string that matches neither its format nor a 24:00 rollover pattern.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("timestamp '{raw}' does not match format '{format}'")]
pub struct FormatError {
    /// The value as it appeared in the input.
    pub raw: String,
    /// The format (or formats, joined with `|`) that were tried.
    pub format: String,
}

impl FormatError {
    pub fn new(raw: &str, format: &str) -> Self {
        Self {
            raw: raw.to_string(),
            format: format.to_string(),
        }
    }
}

/// Errors raised while attaching or converting timezones.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TimezoneError {
    /// The zone label is neither an IANA name nor a UTC offset.
    #[error("unrecognized timezone '{0}'")]
    UnknownZone(String),

    /// Localization was requested for values that already carry an offset.
    #[error("index is already timezone-aware; convert it instead of localizing")]
    AlreadyAware,

    /// The local wall-clock time occurs twice in the zone (DST fall back).
    #[error("local time {local} is ambiguous in {zone}")]
    Ambiguous {
        local: NaiveDateTime,
        zone: String,
    },

    /// The local wall-clock time is skipped in the zone (DST spring forward).
    #[error("local time {local} does not exist in {zone}")]
    Nonexistent {
        local: NaiveDateTime,
        zone: String,
    },

    /// The hour shift is not a finite number.
    #[error("invalid hour adjustment {0}")]
    InvalidShift(f64),
}

/// Errors that can occur while ingesting, planning or writing buckets.
#[derive(Debug, Error)]
pub enum SlicerError {
    /// An index cell could not be turned into a timestamp.
    #[error("data row {row}: {source}")]
    Format {
        /// 1-based data row (header excluded).
        row: usize,
        source: FormatError,
    },

    /// Options that cannot produce a correct result.
    #[error("configuration error: {message}")]
    Config {
        /// Description of the offending option.
        message: String,
    },

    /// A referenced column is absent.
    #[error("column '{column}' not found in {context}")]
    MissingColumn { column: String, context: String },

    #[error(transparent)]
    Timezone(#[from] TimezoneError),

    /// Filesystem failure on a specific path.
    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// CSV decoding or encoding failure on a specific file.
    #[error("CSV error in {}: {source}", path.display())]
    Csv { path: PathBuf, source: csv::Error },
}

impl SlicerError {
    pub fn config(message: impl Into<String>) -> Self {
        SlicerError::Config {
            message: message.into(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SlicerError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn csv(path: impl Into<PathBuf>, source: csv::Error) -> Self {
        SlicerError::Csv {
            path: path.into(),
            source,
        }
    }

    /// Whether the error must stop the whole run rather than a single bucket.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, SlicerError::Io { .. } | SlicerError::Csv { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_error_message_names_value_and_format() {
        let err = SlicerError::Format {
            row: 7,
            source: FormatError::new("2024-13-01", "%Y-%m-%d"),
        };
        let message = err.to_string();
        assert!(message.contains("row 7"));
        assert!(message.contains("2024-13-01"));
        assert!(message.contains("%Y-%m-%d"));
    }

    #[test]
    fn test_io_errors_are_not_fatal() {
        let io = SlicerError::io(
            "out/a.csv",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(!io.is_fatal());
        assert!(SlicerError::config("bad").is_fatal());
        assert!(SlicerError::from(TimezoneError::AlreadyAware).is_fatal());
    }
}
