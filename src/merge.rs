use anyhow::{Context, Result};
use chrono::Local;
use clap::Args;
use glob::glob;
use log::{info, warn};
use rayon::prelude::*;
use std::cmp::Ordering;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use time_slicer::models::validate_format;
use time_slicer::{ReadOptions, Record, Table};

#[derive(Args, Debug, Clone)]
pub struct MergeArgs {
    /// Source CSV files; wildcards allowed
    #[arg(required = true)]
    pub source_files: Vec<String>,

    /// Column (name or 0-based position) whose duplicate values are dropped; moved to the front
    #[arg(short, long, default_value = "0")]
    pub column: String,

    /// Sort column (name or 0-based position) and direction, e.g. 0,ASC
    #[arg(short, long, default_value = "0,ASC")]
    pub sort: String,

    /// Output file; date fields are filled in with the current local time
    #[arg(short, long, default_value = "./merged_%Y-%m-%dT%H%M%S.csv")]
    pub output: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SortSpec {
    pub column: String,
    pub descending: bool,
}

impl FromStr for SortSpec {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let (column, direction) = match s.rsplit_once(',') {
            Some((column, direction)) => (column.trim(), direction.trim()),
            None => (s.trim(), "ASC"),
        };
        if column.is_empty() {
            anyhow::bail!("sort column is empty in '{}'", s);
        }
        let descending = match direction.to_ascii_uppercase().as_str() {
            "ASC" => false,
            "DESC" => true,
            other => anyhow::bail!("sort direction must be ASC or DESC, got '{}'", other),
        };
        Ok(Self {
            column: column.to_string(),
            descending,
        })
    }
}

pub fn run(args: &MergeArgs) -> Result<()> {
    let sort: SortSpec = args.sort.parse()?;

    let mut files = Vec::new();
    for pattern in &args.source_files {
        let matched: Vec<PathBuf> = glob(pattern.trim())
            .with_context(|| format!("Invalid source pattern '{}'", pattern))?
            .filter_map(Result::ok)
            .collect();
        if matched.is_empty() {
            warn!("No files match '{}'", pattern);
        }
        files.extend(matched);
    }
    if files.is_empty() {
        anyhow::bail!("No source files to merge");
    }

    println!("🔗 Merging {} file(s)", files.len());
    let tables = files
        .par_iter()
        .map(|file| {
            Table::read_csv(file, &ReadOptions::default()).with_context(|| format!("Failed to read {}", file.display()))
        })
        .collect::<Result<Vec<_>>>()?;

    let merged = merge_tables(&files, tables, Some(args.column.as_str()), Some(&sort))?;

    let output = expand_output(&args.output);
    merged
        .write_csv(&output)
        .with_context(|| format!("Failed to write {}", output.display()))?;
    info!("{} rows written to {}", merged.len(), output.display());
    Ok(())
}

/// Concatenate under the first table's header, then sort and de-duplicate.
fn merge_tables(files: &[PathBuf], tables: Vec<Table>, dedup: Option<&str>, sort: Option<&SortSpec>) -> Result<Table> {
    let mut tables = tables.into_iter();
    let first = tables.next().context("No tables to merge")?;
    let columns = first.columns().to_vec();
    let mut rows: Vec<Record> = first.into_rows();

    for (file, table) in files.iter().skip(1).zip(tables) {
        if table.columns().len() != columns.len() {
            anyhow::bail!(
                "{} has {} columns, expected {} like {}",
                file.display(),
                table.columns().len(),
                columns.len(),
                files[0].display()
            );
        }
        rows.extend(table.into_rows());
    }

    let mut merged = Table::new(columns, rows);

    if let Some(sort) = sort {
        let idx = merged.resolve(&sort.column)?;
        let columns = merged.columns().to_vec();
        let mut rows = merged.into_rows();
        rows.sort_by(|a, b| {
            let ordering = compare_cells(&a[idx], &b[idx]);
            if sort.descending {
                ordering.reverse()
            } else {
                ordering
            }
        });
        merged = Table::new(columns, rows);
    }

    if let Some(column) = dedup {
        let idx = merged.resolve(column)?;
        let columns = merged.columns().to_vec();
        let mut seen = HashSet::new();
        let rows: Vec<Record> = merged
            .into_rows()
            .into_iter()
            .filter(|row| seen.insert(row[idx].clone()))
            .collect();
        merged = Table::new(columns, rows);

        let (name, values) = merged.remove_column(idx);
        merged.insert_column(0, name, values)?;
    }

    Ok(merged)
}

/// Numbers compare numerically, anything else lexically.
fn compare_cells(a: &str, b: &str) -> Ordering {
    match (a.trim().parse::<f64>(), b.trim().parse::<f64>()) {
        (Ok(x), Ok(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        _ => a.cmp(b),
    }
}

fn expand_output(pattern: &str) -> PathBuf {
    let pattern = pattern.trim();
    match validate_format(pattern) {
        Ok(()) => PathBuf::from(Local::now().format(pattern).to_string()),
        Err(_) => Path::new(pattern).to_path_buf(),
    }
}
