use crate::bucket_plan::{Bucket, BucketPlan};
use crate::error::{Result, SlicerError};
use crate::models::{Record, Timestamp, Zone, ZonedTimestamp, DEFAULT_OUTPUT_FORMAT};
use crate::normalizer::{normalize, normalize_inferred};
use crate::table::{persist_csv, TimeTable};
use chrono::{Duration, Utc};
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, error, info};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteOptions {
    /// Rendering of the index column in bucket files; also the first layout tried when reading them back.
    pub date_format_out: String,
    /// Resolution timestamps are truncated to before dedup. `None` keeps full precision.
    pub floor: Option<Duration>,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            date_format_out: DEFAULT_OUTPUT_FORMAT.to_string(),
            floor: Some(Duration::minutes(1)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketOutcome {
    pub path: PathBuf,
    pub created: bool,
    pub rows_loaded: usize,
    pub rows_new: usize,
    pub duplicates_dropped: usize,
    pub rows_written: usize,
}

#[derive(Debug)]
pub struct BucketFailure {
    pub path: PathBuf,
    pub group_key: String,
    pub error: SlicerError,
}

#[derive(Debug, Default)]
pub struct WriteReport {
    pub written: Vec<BucketOutcome>,
    pub failed: Vec<BucketFailure>,
}

impl WriteReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn rows_written(&self) -> usize {
        self.written.iter().map(|o| o.rows_written).sum()
    }

    pub fn extend(&mut self, other: WriteReport) {
        self.written.extend(other.written);
        self.failed.extend(other.failed);
    }
}

/// Contents of an existing bucket file.
struct StoredBucket {
    columns: Vec<String>,
    index: Vec<ZonedTimestamp>,
    rows: Vec<Record>,
}

/// Merges new rows into per-bucket files: load, append, floor, dedup, sort, persist.
///
/// Each file is rewritten as a whole, so two writers touching the same bucket
/// concurrently lose updates. Runs against one output directory must be serialized.
pub struct BucketWriter {
    options: WriteOptions,
    show_progress: bool,
}

impl BucketWriter {
    pub fn new(options: WriteOptions) -> Self {
        Self {
            options,
            show_progress: false,
        }
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// Write every bucket of `plan`. A failing bucket is logged and reported; the rest still run.
    pub fn write_buckets(&self, table: &TimeTable, plan: &BucketPlan) -> WriteReport {
        let pb = if self.show_progress {
            ProgressBar::new(plan.len() as u64)
        } else {
            ProgressBar::hidden()
        };
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({msg})")
        {
            pb.set_style(style);
        }

        let mut report = WriteReport::default();
        for bucket in plan.buckets() {
            pb.set_message(bucket.group_key.clone());
            match self.write_bucket(table, bucket) {
                Ok(outcome) => {
                    debug!(
                        "{}: {} loaded + {} new, {} duplicates dropped, {} written",
                        outcome.path.display(),
                        outcome.rows_loaded,
                        outcome.rows_new,
                        outcome.duplicates_dropped,
                        outcome.rows_written
                    );
                    report.written.push(outcome);
                }
                Err(e) => {
                    error!("Bucket '{}' ({}) failed: {}", bucket.group_key, bucket.path.display(), e);
                    report.failed.push(BucketFailure {
                        path: bucket.path.clone(),
                        group_key: bucket.group_key.clone(),
                        error: e,
                    });
                }
            }
            pb.inc(1);
        }
        pb.finish_with_message(format!("{} buckets written", report.written.len()));

        info!(
            "Wrote {} rows into {} buckets ({} failed)",
            report.rows_written(),
            report.written.len(),
            report.failed.len()
        );
        report
    }

    pub fn write_bucket(&self, table: &TimeTable, bucket: &Bucket) -> Result<BucketOutcome> {
        let zone = bucket
            .rows
            .first()
            .map(|&row| table.index[row].zone())
            .unwrap_or_else(Zone::utc);

        let mut columns = table.table.columns().to_vec();
        let mut entries: Vec<(ZonedTimestamp, Record)> = Vec::new();

        let created = !bucket.path.exists();
        let mut rows_loaded = 0;
        if !created {
            let stored = self.load_existing(&bucket.path, &table.index_name, zone)?;
            rows_loaded = stored.rows.len();
            columns = merged_columns(&stored.columns, &columns);
            let mapping = column_mapping(&stored.columns, &columns);
            entries.extend(
                stored
                    .index
                    .into_iter()
                    .zip(stored.rows.iter().map(|row| project(row, &mapping))),
            );
        }

        let mapping = column_mapping(table.table.columns(), &columns);
        entries.extend(
            bucket
                .rows
                .iter()
                .map(|&row| (table.index[row], project(&table.table.rows()[row], &mapping))),
        );

        if let Some(step) = self.options.floor {
            for (ts, _) in entries.iter_mut() {
                *ts = ts.floor(step)?;
            }
        }

        let before = entries.len();
        let mut seen = HashSet::with_capacity(before);
        entries.retain(|(ts, _)| seen.insert(ts.instant()));
        let duplicates_dropped = before - entries.len();

        entries.sort_by_key(|(ts, _)| ts.instant());

        let mut header = Vec::with_capacity(columns.len() + 1);
        header.push(table.index_name.clone());
        header.extend(columns.iter().cloned());

        let rows = entries
            .iter()
            .map(|(ts, record)| {
                let mut row = Vec::with_capacity(record.len() + 1);
                row.push(ts.render(&self.options.date_format_out)?);
                row.extend(record.iter().cloned());
                Ok(row)
            })
            .collect::<Result<Vec<Record>>>()?;
        let rows_written = rows.len();

        persist_csv(&bucket.path, Some(header.as_slice()), rows)?;

        Ok(BucketOutcome {
            path: bucket.path.clone(),
            created,
            rows_loaded,
            rows_new: bucket.rows.len(),
            duplicates_dropped,
            rows_written,
        })
    }

    fn load_existing(&self, path: &Path, index_name: &str, zone: Zone) -> Result<StoredBucket> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_path(path)
            .map_err(|e| SlicerError::csv(path, e))?;
        let headers: Vec<String> = reader
            .headers()
            .map_err(|e| SlicerError::csv(path, e))?
            .iter()
            .map(str::to_string)
            .collect();

        let index_pos = headers
            .iter()
            .position(|h| h == index_name)
            .ok_or_else(|| SlicerError::MissingColumn {
                column: index_name.to_string(),
                context: path.display().to_string(),
            })?;

        let mut columns = headers;
        columns.remove(index_pos);

        let mut index = Vec::new();
        let mut rows = Vec::new();
        for (i, result) in reader.records().enumerate() {
            let record = result.map_err(|e| SlicerError::csv(path, e))?;
            let raw = record.get(index_pos).unwrap_or("");
            let parsed = normalize(raw, &self.options.date_format_out)
                .or_else(|_| normalize_inferred(raw))
                .map_err(|source| SlicerError::Format { row: i + 1, source })?;
            // Offset-free output cannot tell the two passes of a DST fall-back hour apart.
            index.push(match parsed {
                Timestamp::Aware(dt) => ZonedTimestamp::new(dt.with_timezone(&Utc), zone),
                Timestamp::Naive(naive) => zone.localize_earliest(naive)?,
            });

            let mut row: Record = record.iter().map(str::to_string).collect();
            if index_pos < row.len() {
                row.remove(index_pos);
            }
            if row.len() > columns.len() && row[columns.len()..].iter().any(|cell| !cell.trim().is_empty()) {
                return Err(SlicerError::config(format!(
                    "{}: stored row {} has {} fields, header has {}",
                    path.display(),
                    i + 1,
                    record.len(),
                    columns.len() + 1
                )));
            }
            row.resize(columns.len(), String::new());
            rows.push(row);
        }

        Ok(StoredBucket { columns, index, rows })
    }
}

/// Existing columns first, then incoming ones the file did not have.
fn merged_columns(existing: &[String], incoming: &[String]) -> Vec<String> {
    let mut merged = existing.to_vec();
    merged.extend(incoming.iter().filter(|c| !existing.contains(c)).cloned());
    merged
}

fn column_mapping(from: &[String], to: &[String]) -> Vec<Option<usize>> {
    to.iter().map(|c| from.iter().position(|f| f == c)).collect()
}

fn project(row: &[String], mapping: &[Option<usize>]) -> Record {
    mapping
        .iter()
        .map(|slot| slot.and_then(|i| row.get(i).cloned()).unwrap_or_default())
        .collect()
}
