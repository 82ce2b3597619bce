use anyhow::{Context, Result};
use clap::Args;
use glob::glob;
use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use time_slicer::config::header_row_from;
use time_slicer::{normalize, timezone, ParseDates, ReadOptions, SkipRows, SlicerError, Table, TzAdjust};

#[derive(Args, Debug, Clone)]
pub struct ConvertArgs {
    /// Source CSV file; wildcards select several files with the same structure
    pub source_file: String,

    /// Destination directory for output files
    #[arg(short, long, default_value = ".")]
    pub output: PathBuf,

    /// Output file name; {stem} is replaced by the source file name without extension
    #[arg(short = 'f', long, default_value = "{stem}.csv")]
    pub filename_format: String,

    /// Row that contains column names (negative: no header row)
    #[arg(short, long, default_value_t = 0, allow_negative_numbers = true)]
    pub names: i64,

    /// Leading rows to skip, or a comma separated list of 0-based rows to skip
    #[arg(short, long)]
    pub data_begins: Option<String>,

    /// true/false, a JSON list of date columns, or a JSON list of column lists to combine.
    /// false keeps the timestamp column's text as-is (only -p and -x apply)
    #[arg(short, long, default_value = "true")]
    pub timestamp: String,

    /// Name of the timestamp column
    #[arg(short, long, default_value = "timestamp")]
    pub column: String,

    /// Format of the timestamp column for parsing
    #[arg(short, long, default_value = "%Y-%m-%dT%H:%M:%S.000Z")]
    pub in_format: String,

    /// Format of the timestamp column after it has been parsed
    #[arg(short = 'w', long, default_value = "%Y-%m-%dT%H:%M:%S.000Z")]
    pub out_format: String,

    /// Position of the timestamp column in the output (-1 appends)
    #[arg(short, long, default_value_t = 0, allow_negative_numbers = true)]
    pub position: i64,

    /// Comma separated columns to drop from the output
    #[arg(short = 'x', long)]
    pub drop_columns: Option<String>,

    /// Hour adjustment and destination timezone, e.g. 3.5:UTC
    #[arg(short = 'z', long, allow_hyphen_values = true)]
    pub adjust_tz: Option<String>,
}

/// Options shared by every matched file, parsed once.
struct ConvertPlan {
    read: ReadOptions,
    parse_dates: ParseDates,
    adjust_tz: Option<TzAdjust>,
    drop_columns: Vec<String>,
}

pub fn run(args: &ConvertArgs) -> Result<()> {
    let plan = ConvertPlan {
        read: ReadOptions {
            header_row: header_row_from(args.names),
            skip_rows: match &args.data_begins {
                Some(rows) => rows.parse::<SkipRows>()?,
                None => SkipRows::None,
            },
            ..ReadOptions::default()
        },
        parse_dates: args.timestamp.parse()?,
        adjust_tz: args.adjust_tz.as_deref().map(str::parse::<TzAdjust>).transpose()?,
        drop_columns: args
            .drop_columns
            .as_deref()
            .map(|cols| cols.split(',').map(|c| c.trim().to_string()).filter(|c| !c.is_empty()).collect())
            .unwrap_or_default(),
    };

    let files: Vec<PathBuf> = glob(args.source_file.trim())
        .with_context(|| format!("Invalid source pattern '{}'", args.source_file))?
        .filter_map(Result::ok)
        .collect();
    if files.is_empty() {
        anyhow::bail!("No files match '{}'", args.source_file);
    }
    if files.len() > 1 && !args.filename_format.contains("{stem}") {
        anyhow::bail!(
            "{} files match but output name '{}' has no {{stem}}; every file would overwrite the same output",
            files.len(),
            args.filename_format
        );
    }

    println!("🕐 Converting timestamps in {} file(s)", files.len());
    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")?,
    );

    let results: Vec<(PathBuf, Result<PathBuf>)> = files
        .par_iter()
        .map(|file| {
            let result = convert_file(file, args, &plan);
            pb.inc(1);
            (file.clone(), result)
        })
        .collect();
    pb.finish_with_message("Conversion complete");

    let mut failures = 0;
    for (file, result) in results {
        match result {
            Ok(output) => info!("{} -> {}", file.display(), output.display()),
            Err(e) => {
                failures += 1;
                warn!("{}: {:#}", file.display(), e);
            }
        }
    }
    if failures > 0 {
        anyhow::bail!("{} of {} files failed to convert", failures, files.len());
    }
    Ok(())
}

fn convert_file(source: &Path, args: &ConvertArgs, plan: &ConvertPlan) -> Result<PathBuf> {
    let mut table = Table::read_csv(source, &plan.read)?;
    table.apply_parse_dates(&plan.parse_dates)?;

    let idx = table.resolve(&args.column)?;
    let (name, raw_values) = table.remove_column(idx);

    if plan.parse_dates == ParseDates::Infer(false) {
        return finish_file(table, source, args, plan, name, raw_values);
    }

    let parsed = raw_values
        .iter()
        .enumerate()
        .map(|(row, raw)| {
            normalize(raw, &args.in_format).map_err(|source| SlicerError::Format { row: row + 1, source })
        })
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("Parsing column '{}' of {}", name, source.display()))?;

    let rendered = match &plan.adjust_tz {
        Some(adjust) => timezone::adjust(&parsed, adjust.hours, &adjust.zone)?
            .iter()
            .map(|ts| ts.render(&args.out_format))
            .collect::<Result<Vec<_>, _>>()?,
        None => parsed
            .iter()
            .map(|ts| ts.render(&args.out_format))
            .collect::<Result<Vec<_>, _>>()?,
    };

    finish_file(table, source, args, plan, name, rendered)
}

/// Put the timestamp column back at `-p`, drop `-x` columns and write the file.
fn finish_file(
    mut table: Table,
    source: &Path,
    args: &ConvertArgs,
    plan: &ConvertPlan,
    name: String,
    values: Vec<String>,
) -> Result<PathBuf> {
    let position = usize::try_from(args.position).unwrap_or(usize::MAX);
    table.insert_column(position, name, values)?;
    table.drop_columns(&plan.drop_columns)?;

    let output = output_path(&args.output, &args.filename_format, source);
    table.write_csv(&output)?;
    Ok(output)
}

fn output_path(output_dir: &Path, filename_format: &str, source: &Path) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    output_dir.join(filename_format.trim().replace("{stem}", &stem))
}
