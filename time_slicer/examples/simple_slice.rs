use std::fs;
use time_slicer::{IndexColumn, SliceConfig, Slicer, TzAdjust};

fn main() -> anyhow::Result<()> {
    let workspace = tempfile::tempdir()?;
    let source = workspace.path().join("station.csv");
    let output = workspace.path().join("daily");

    // Two days of readings in Central time, one of them with a 24:00 end-of-day stamp
    fs::write(
        &source,
        "TIMESTAMP,RECORD,temp\n\
         2024-03-09 23:00:00,1,4.5\n\
         2024-03-09 24:00:00,2,4.1\n\
         2024-03-10 01:00:00,3,3.9\n\
         2024-03-10 01:00:30,4,3.8\n",
    )?;

    let mut config = SliceConfig::new(&output, "%Y/%m/station_%Y-%m-%d.csv", IndexColumn::new("TIMESTAMP"));
    config.date_format_in = Some("%Y-%m-%d %H:%M:%S".to_string());
    config.adjust_tz = Some(TzAdjust {
        hours: 0.0,
        zone: "America/Chicago".to_string(),
    });
    config.drop_columns = vec!["RECORD".to_string()];
    config.show_progress = false;

    let slicer = Slicer::new(config)?;

    // Run twice: the second pass merges into the files from the first and changes nothing
    for pass in 1..=2 {
        let report = slicer.slice_file(&source)?;
        println!("Pass {}", pass);
        println!("======");
        for outcome in &report.written {
            println!(
                "{} ({}): {} loaded, {} new, {} duplicates dropped, {} written",
                outcome.path.strip_prefix(&output).unwrap_or(&outcome.path).display(),
                if outcome.created { "created" } else { "merged" },
                outcome.rows_loaded,
                outcome.rows_new,
                outcome.duplicates_dropped,
                outcome.rows_written
            );
        }
        println!();
    }

    let last = output.join("2024/03/station_2024-03-10.csv");
    println!("{}:", last.display());
    print!("{}", fs::read_to_string(&last)?);

    Ok(())
}
