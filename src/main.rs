use anyhow::Result;
use clap::{Parser, Subcommand};

mod convert_date;
mod merge;
mod partition;

#[derive(Parser)]
#[command(name = "csv_tools")]
#[command(about = "Companion utilities for timestamped CSV files")]
struct Cli {
    /// Worker threads for multi-file conversion (defaults to all cores)
    #[arg(long, global = true)]
    threads: Option<usize>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Reformat the timestamp column of one or more CSV files
    ConvertDate(convert_date::ConvertArgs),
    /// Concatenate CSV files with a shared header, then sort and de-duplicate
    Merge(merge::MergeArgs),
    /// Split a header-less CSV file into one file per distinct column value
    Partition(partition::PartitionArgs),
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    rayon::ThreadPoolBuilder::new()
        .num_threads(cli.threads.unwrap_or_else(num_cpus::get))
        .build_global()?;
    log::debug!("Rayon thread pool configured with {} threads", rayon::current_num_threads());

    let start = std::time::Instant::now();
    match &cli.command {
        Command::ConvertDate(args) => convert_date::run(args)?,
        Command::Merge(args) => merge::run(args)?,
        Command::Partition(args) => partition::run(args)?,
    }
    println!("\n✅ Done in {:?}", start.elapsed());

    Ok(())
}
