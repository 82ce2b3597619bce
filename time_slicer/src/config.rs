use crate::error::{Result, SlicerError};
use crate::models::{Zone, DEFAULT_OUTPUT_FORMAT};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;
use std::str::FromStr;

/// Rows dropped from the raw file before the header row is picked.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkipRows {
    #[default]
    None,
    /// Skip this many leading records.
    Leading(usize),
    /// Skip exactly these 0-based record positions.
    Rows(Vec<usize>),
}

impl SkipRows {
    pub fn skips(&self, position: usize) -> bool {
        match self {
            SkipRows::None => false,
            SkipRows::Leading(count) => position < *count,
            SkipRows::Rows(rows) => rows.contains(&position),
        }
    }
}

impl FromStr for SkipRows {
    type Err = SlicerError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Ok(SkipRows::None);
        }
        if !s.contains(',') {
            return s
                .parse::<usize>()
                .map(SkipRows::Leading)
                .map_err(|_| SlicerError::config(format!("invalid row count '{}'", s)));
        }

        s.split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(|part| {
                part.parse::<usize>()
                    .map_err(|_| SlicerError::config(format!("invalid row number '{}' in '{}'", part, s)))
            })
            .collect::<Result<Vec<_>>>()
            .map(SkipRows::Rows)
    }
}

/// Header row argument: negative means the file has no header row.
pub fn header_row_from(arg: i64) -> Option<usize> {
    usize::try_from(arg).ok()
}

/// How the raw CSV file is turned into a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadOptions {
    pub header_row: Option<usize>,
    pub skip_rows: SkipRows,
    /// Keep columns that have no header name.
    pub keep_empty_columns: bool,
    /// Replacement names for every column, in order.
    pub column_names: Option<Vec<String>>,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            header_row: Some(0),
            skip_rows: SkipRows::None,
            keep_empty_columns: false,
            column_names: None,
        }
    }
}

/// Index column reference, optionally renamed on load (`name:rename`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexColumn {
    /// Column name, or its 0-based position.
    pub name: String,
    pub rename: Option<String>,
}

impl IndexColumn {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rename: None,
        }
    }
}

impl FromStr for IndexColumn {
    type Err = SlicerError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let (name, rename) = match s.split_once(':') {
            Some((name, rename)) => (name.trim(), Some(rename.trim())),
            None => (s, None),
        };
        if name.is_empty() || rename.is_some_and(str::is_empty) {
            return Err(SlicerError::config(format!("invalid index column '{}'", s)));
        }
        Ok(Self {
            name: name.to_string(),
            rename: rename.map(str::to_string),
        })
    }
}

/// `<hours>:<zone>` adjustment, e.g. `3.5:UTC` or `-6:America/Chicago`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TzAdjust {
    pub hours: f64,
    pub zone: String,
}

impl FromStr for TzAdjust {
    type Err = SlicerError;

    fn from_str(s: &str) -> Result<Self> {
        let (hours, zone) = s
            .trim()
            .split_once(':')
            .ok_or_else(|| SlicerError::config(format!("timezone adjustment '{}' is not <hours>:<zone>", s)))?;
        let hours: f64 = hours
            .trim()
            .parse()
            .ok()
            .filter(|h: &f64| h.is_finite())
            .ok_or_else(|| SlicerError::config(format!("invalid hour adjustment '{}'", hours)))?;
        let zone = zone.trim();
        Zone::parse(zone)?;

        Ok(Self {
            hours,
            zone: zone.to_string(),
        })
    }
}

/// How rows are grouped in memory. Only time-format grouping exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SliceMethod {
    Date { group_format: String },
}

impl SliceMethod {
    pub fn group_format(&self) -> &str {
        match self {
            SliceMethod::Date { group_format } => group_format,
        }
    }
}

impl Default for SliceMethod {
    fn default() -> Self {
        SliceMethod::Date {
            group_format: "%Y%m%d".to_string(),
        }
    }
}

impl FromStr for SliceMethod {
    type Err = SlicerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().split_once(':') {
            Some(("date", format)) if !format.is_empty() => Ok(SliceMethod::Date {
                group_format: format.to_string(),
            }),
            Some((method, _)) if method != "date" => Err(SlicerError::config(format!(
                "unsupported slicing method '{}'; only 'date' is available",
                method
            ))),
            _ => Err(SlicerError::config(format!(
                "slicing method '{}' is not <method>:<format>",
                s
            ))),
        }
    }
}

/// Which columns should be read as dates, and which should be combined into one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParseDates {
    /// Plain on/off switch.
    Infer(bool),
    /// Columns that must exist and hold dates.
    Columns(Vec<String>),
    /// New column name and the source columns joined (space separated) into it.
    Combine(Vec<(String, Vec<String>)>),
}

impl FromStr for ParseDates {
    type Err = SlicerError;

    /// JSON first, then a boolean literal.
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        match serde_json::from_str::<Value>(s) {
            Ok(Value::Bool(flag)) => Ok(ParseDates::Infer(flag)),
            Ok(Value::Array(items)) => parse_date_list(s, &items),
            Ok(Value::Object(map)) => map
                .iter()
                .map(|(name, cols)| Ok((name.clone(), string_list(s, cols)?)))
                .collect::<Result<Vec<_>>>()
                .map(ParseDates::Combine),
            _ => match s.to_ascii_lowercase().as_str() {
                "true" | "yes" | "1" => Ok(ParseDates::Infer(true)),
                "false" | "no" | "0" => Ok(ParseDates::Infer(false)),
                _ => Err(SlicerError::config(format!(
                    "'{}' is neither a JSON column list nor a boolean",
                    s
                ))),
            },
        }
    }
}

fn parse_date_list(raw: &str, items: &[Value]) -> Result<ParseDates> {
    if items.iter().all(Value::is_string) {
        return string_list(raw, &Value::Array(items.to_vec())).map(ParseDates::Columns);
    }
    items
        .iter()
        .map(|group| {
            let cols = string_list(raw, group)?;
            Ok((cols.join("_"), cols))
        })
        .collect::<Result<Vec<_>>>()
        .map(ParseDates::Combine)
}

fn string_list(raw: &str, value: &Value) -> Result<Vec<String>> {
    let invalid = || SlicerError::config(format!("'{}' must list column names as strings", raw));
    let items = value.as_array().ok_or_else(invalid)?;
    if items.is_empty() {
        return Err(invalid());
    }
    items
        .iter()
        .map(|item| item.as_str().map(str::to_string).ok_or_else(invalid))
        .collect()
}

/// Everything one slicing run needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SliceConfig {
    pub output_root: PathBuf,
    /// strftime pattern for the bucket file path, relative to `output_root`.
    pub path_format: String,
    pub method: SliceMethod,
    pub index_column: IndexColumn,
    /// Input timestamp format; common layouts are inferred when absent.
    pub date_format_in: Option<String>,
    /// When absent, naive input is taken to be UTC.
    pub adjust_tz: Option<TzAdjust>,
    pub date_format_out: String,
    pub drop_columns: Vec<String>,
    pub read: ReadOptions,
    /// Dedup resolution in seconds; 0 keeps full precision.
    pub floor_seconds: u32,
    pub show_progress: bool,
}

impl SliceConfig {
    pub fn new(output_root: impl Into<PathBuf>, path_format: impl Into<String>, index_column: IndexColumn) -> Self {
        Self {
            output_root: output_root.into(),
            path_format: path_format.into(),
            method: SliceMethod::default(),
            index_column,
            date_format_in: None,
            adjust_tz: None,
            date_format_out: DEFAULT_OUTPUT_FORMAT.to_string(),
            drop_columns: Vec::new(),
            read: ReadOptions::default(),
            floor_seconds: 60,
            show_progress: false,
        }
    }

    pub fn with_group_format(mut self, group_format: impl Into<String>) -> Self {
        self.method = SliceMethod::Date {
            group_format: group_format.into(),
        };
        self
    }
}
