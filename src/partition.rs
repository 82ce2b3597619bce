use anyhow::{Context, Result};
use clap::Args;
use log::info;
use regex::Regex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use time_slicer::{persist_csv, Record};

#[derive(Args, Debug, Clone)]
pub struct PartitionArgs {
    /// Source CSV file (no header row)
    pub source_file: PathBuf,

    /// 0-based position of the column to partition on
    #[arg(short, long, default_value_t = 0)]
    pub column: usize,

    /// Destination directory for the partition files
    #[arg(short, long, default_value = ".")]
    pub output: PathBuf,
}

/// Rows sharing one column value, in first-occurrence order.
#[derive(Debug, Default, PartialEq)]
struct Partitions {
    groups: Vec<(String, Vec<Record>)>,
    slots: HashMap<String, usize>,
}

impl Partitions {
    fn push(&mut self, key: &str, row: Record) {
        let slot = match self.slots.get(key) {
            Some(&slot) => slot,
            None => {
                self.groups.push((key.to_string(), Vec::new()));
                self.slots.insert(key.to_string(), self.groups.len() - 1);
                self.groups.len() - 1
            }
        };
        self.groups[slot].1.push(row);
    }
}

pub fn run(args: &PartitionArgs) -> Result<()> {
    let partitions = read_partitions(&args.source_file, args.column)?;
    println!(
        "📂 Writing {} partitions of {} to {}",
        partitions.groups.len(),
        args.source_file.display(),
        args.output.display()
    );

    let unsafe_chars = Regex::new(r#"[/\\:*?"<>|]"#)?;
    for (value, rows) in partitions.groups {
        let path = partition_path(&unsafe_chars, &args.output, &value);
        let count = rows.len();
        persist_csv(&path, None, rows).with_context(|| format!("Failed to write {}", path.display()))?;
        info!("{} rows -> {}", count, path.display());
    }
    Ok(())
}

fn read_partitions(source: &Path, column: usize) -> Result<Partitions> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(source)
        .with_context(|| format!("Failed to open {}", source.display()))?;

    let mut partitions = Partitions::default();
    for (line, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("{}: line {}", source.display(), line + 1))?;
        let key = record.get(column).with_context(|| {
            format!(
                "{}: line {} has {} fields, no column {}",
                source.display(),
                line + 1,
                record.len(),
                column
            )
        })?;
        partitions.push(key, record.iter().map(str::to_string).collect());
    }
    Ok(partitions)
}

fn partition_path(unsafe_chars: &Regex, output: &Path, value: &str) -> PathBuf {
    let name = unsafe_chars.replace_all(value.trim(), "_");
    output.join(format!("{}.csv", name))
}
