use anyhow::{Context, Result};
use clap::Parser;
use glob::glob;
use log::{error, info};
use std::path::PathBuf;
use time_slicer::config::header_row_from;
use time_slicer::{IndexColumn, ReadOptions, SkipRows, SliceConfig, SliceMethod, Slicer, TzAdjust, WriteReport};

#[derive(Parser)]
#[command(name = "time_slicer")]
#[command(about = "Slice timestamped CSV files into per-interval files, merging with existing ones")]
struct Args {
    /// Source CSV file (wildcards allowed; matches are processed one after another)
    #[arg(short, long)]
    source: String,

    /// Destination directory for output files
    #[arg(short, long, default_value = ".")]
    output: PathBuf,

    /// Output file name format with date fields, e.g. %Y/%m/data_%Y-%m-%d.csv
    #[arg(short = 'f', long)]
    filename_format: String,

    /// Timestamp column, optionally renamed: TIMESTAMP or TIMESTAMP:timestamp
    #[arg(short, long)]
    column: String,

    /// Grouping method and interval format
    #[arg(short, long, default_value = "date:%Y%m%d")]
    method: String,

    /// Row that contains column names (negative: no header row)
    #[arg(short, long, default_value_t = 0, allow_negative_numbers = true)]
    names: i64,

    /// Comma separated names assigned to the columns in order
    #[arg(short = 't', long)]
    column_names: Option<String>,

    /// Leading rows to skip, or a comma separated list of 0-based rows to skip
    #[arg(short, long)]
    data_begins: Option<String>,

    /// Input timestamp format; common layouts are inferred when omitted
    #[arg(short, long)]
    in_format: Option<String>,

    /// Hour adjustment and destination timezone, e.g. 3.5:UTC
    #[arg(short = 'z', long, allow_hyphen_values = true)]
    adjust_tz: Option<String>,

    /// Output timestamp format
    #[arg(short = 'w', long, default_value = time_slicer::DEFAULT_OUTPUT_FORMAT)]
    date_format_out: String,

    /// Comma separated columns to drop from the output
    #[arg(short = 'x', long)]
    drop_columns: Option<String>,

    /// Keep columns that have no header name
    #[arg(long)]
    keep_empty_columns: bool,

    /// Timestamps are floored to this many seconds before dedup (0 disables)
    #[arg(long, default_value_t = 60)]
    floor_seconds: u32,

    /// Hide the progress bar
    #[arg(long)]
    no_progress: bool,
}

fn split_list(value: &Option<String>) -> Vec<String> {
    value
        .as_deref()
        .map(|v| v.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect())
        .unwrap_or_default()
}

fn build_config(args: &Args) -> Result<SliceConfig> {
    let index_column: IndexColumn = args.column.parse()?;
    let method: SliceMethod = args.method.parse()?;
    let adjust_tz = args.adjust_tz.as_deref().map(str::parse::<TzAdjust>).transpose()?;
    let skip_rows = match &args.data_begins {
        Some(rows) => rows.parse::<SkipRows>()?,
        None => SkipRows::None,
    };
    let column_names = args.column_names.as_ref().map(|_| split_list(&args.column_names));

    let mut config = SliceConfig::new(&args.output, args.filename_format.trim(), index_column)
        .with_group_format(method.group_format());
    config.date_format_in = args.in_format.clone();
    config.adjust_tz = adjust_tz;
    config.date_format_out = args.date_format_out.clone();
    config.drop_columns = split_list(&args.drop_columns);
    config.read = ReadOptions {
        header_row: header_row_from(args.names),
        skip_rows,
        keep_empty_columns: args.keep_empty_columns,
        column_names,
    };
    config.floor_seconds = args.floor_seconds;
    config.show_progress = !args.no_progress;
    Ok(config)
}

/// Slice every source in turn. Sources that cannot be read are skipped and
/// returned; any other error stops the run.
fn slice_all(slicer: &Slicer, sources: &[PathBuf]) -> Result<(WriteReport, Vec<PathBuf>)> {
    let mut report = WriteReport::default();
    let mut skipped = Vec::new();
    for source in sources {
        match slicer.slice_file(source) {
            Ok(file_report) => report.extend(file_report),
            Err(e) if !e.is_fatal() => {
                error!("Skipping {}: {}", source.display(), e);
                skipped.push(source.clone());
            }
            Err(e) => return Err(e).with_context(|| format!("Failed to slice {}", source.display())),
        }
    }
    Ok((report, skipped))
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let slicer = Slicer::new(build_config(&args)?)?;

    let sources: Vec<PathBuf> = glob(args.source.trim())
        .with_context(|| format!("Invalid source pattern '{}'", args.source))?
        .filter_map(|entry| entry.ok())
        .collect();
    if sources.is_empty() {
        anyhow::bail!("No files match '{}'", args.source);
    }

    info!("Slicing {} file(s) into {}", sources.len(), args.output.display());
    let start = std::time::Instant::now();

    let (report, skipped) = slice_all(&slicer, &sources)?;

    println!(
        "✅ {} rows written to {} bucket files in {:?}",
        report.rows_written(),
        report.written.len(),
        start.elapsed()
    );

    for failure in &report.failed {
        error!("  {} ({}): {}", failure.path.display(), failure.group_key, failure.error);
    }
    if !report.is_success() || !skipped.is_empty() {
        anyhow::bail!(
            "{} of {} buckets failed, {} of {} source files skipped",
            report.failed.len(),
            report.failed.len() + report.written.len(),
            skipped.len(),
            sources.len()
        );
    }

    Ok(())
}
