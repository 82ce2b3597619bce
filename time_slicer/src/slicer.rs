use crate::bucket_plan::BucketPlan;
use crate::bucket_writer::{BucketWriter, WriteOptions, WriteReport};
use crate::config::SliceConfig;
use crate::error::{Result, SlicerError};
use crate::models::{validate_format, Timestamp, Zone};
use crate::normalizer::{normalize, normalize_inferred};
use crate::table::{Table, TimeTable};
use crate::timezone;
use chrono::Duration;
use log::{debug, info};
use std::path::Path;

/// Load -> condition index -> plan -> write, for one source file at a time.
pub struct Slicer {
    config: SliceConfig,
}

impl Slicer {
    /// Validates every format string and the adjustment zone before any file is touched.
    pub fn new(config: SliceConfig) -> Result<Self> {
        validate_format(&config.path_format)?;
        validate_format(config.method.group_format())?;
        validate_format(&config.date_format_out)?;
        if let Some(format) = &config.date_format_in {
            validate_format(format)?;
        }
        if let Some(adjust) = &config.adjust_tz {
            Zone::parse(&adjust.zone)?;
        }

        if let Ok(json) = serde_json::to_string_pretty(&config) {
            debug!("Slice configuration:\n{}", json);
        }
        Ok(Self { config })
    }

    pub fn config(&self) -> &SliceConfig {
        &self.config
    }

    /// Read `source` and turn its index column into zoned timestamps.
    pub fn load(&self, source: &Path) -> Result<TimeTable> {
        let mut table = Table::read_csv(source, &self.config.read)?;
        info!("Loaded {} rows from {}", table.len(), source.display());

        let column = &self.config.index_column;
        let idx = table.resolve(&column.name)?;
        let (name, raw_values) = table.remove_column(idx);
        let index_name = column.rename.clone().unwrap_or(name);

        let parsed = raw_values
            .iter()
            .enumerate()
            .map(|(row, raw)| {
                self.parse_index_value(raw)
                    .map_err(|source| SlicerError::Format { row: row + 1, source })
            })
            .collect::<Result<Vec<Timestamp>>>()?;

        let index = match &self.config.adjust_tz {
            Some(adjust) => timezone::adjust(&parsed, adjust.hours, &adjust.zone)?,
            None => timezone::assume_zone(&parsed, Zone::utc())?,
        };

        table.drop_columns(&self.config.drop_columns)?;

        Ok(TimeTable {
            index_name,
            index,
            table,
        })
    }

    pub fn plan(&self, table: &TimeTable) -> Result<BucketPlan> {
        let plan = BucketPlan::derive(
            &table.index,
            &self.config.path_format,
            self.config.method.group_format(),
            &self.config.output_root,
        )?;
        info!("{} rows map to {} buckets", table.len(), plan.len());
        Ok(plan)
    }

    pub fn writer(&self) -> BucketWriter {
        let floor = match self.config.floor_seconds {
            0 => None,
            seconds => Some(Duration::seconds(i64::from(seconds))),
        };
        BucketWriter::new(WriteOptions {
            date_format_out: self.config.date_format_out.clone(),
            floor,
        })
        .with_progress(self.config.show_progress)
    }

    /// Fatal problems (format, configuration, timezone) are returned as `Err`;
    /// per-bucket failures are inside the report.
    pub fn slice_file(&self, source: &Path) -> Result<WriteReport> {
        let table = self.load(source)?;
        let plan = self.plan(&table)?;
        Ok(self.writer().write_buckets(&table, &plan))
    }

    fn parse_index_value(&self, raw: &str) -> std::result::Result<Timestamp, crate::error::FormatError> {
        match &self.config.date_format_in {
            Some(format) => normalize(raw, format),
            None => normalize_inferred(raw),
        }
    }
}
