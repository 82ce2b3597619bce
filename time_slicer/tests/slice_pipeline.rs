use std::fs;
use std::path::Path;
use tempfile::TempDir;
use time_slicer::{IndexColumn, SliceConfig, Slicer, SlicerError, TzAdjust};

fn config(root: &Path, path_format: &str) -> SliceConfig {
    let mut config = SliceConfig::new(root, path_format, IndexColumn::new("timestamp"));
    config.show_progress = false;
    config
}

fn write_source(dir: &TempDir, body: &str) -> std::path::PathBuf {
    let source = dir.path().join("source.csv");
    fs::write(&source, body).unwrap();
    source
}

#[test]
fn test_every_row_lands_in_exactly_one_bucket() {
    let input = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    let source = write_source(
        &input,
        "timestamp,value\n\
         2024-01-01 23:59:00,1\n\
         2024-01-02 00:00:00,2\n\
         2024-01-01 00:00:00,3\n\
         2024-02-10 12:00:00,4\n",
    );

    let slicer = Slicer::new(config(output.path(), "%Y/%m/data_%Y-%m-%d.csv")).unwrap();
    let report = slicer.slice_file(&source).unwrap();

    assert!(report.is_success());
    assert_eq!(report.written.len(), 3);
    assert_eq!(report.rows_written(), 4);
    assert_eq!(
        fs::read_to_string(output.path().join("2024/01/data_2024-01-01.csv")).unwrap(),
        "timestamp,value\n2024-01-01T00:00:00+00:00,3\n2024-01-01T23:59:00+00:00,1\n"
    );
    assert!(output.path().join("2024/01/data_2024-01-02.csv").exists());
    assert!(output.path().join("2024/02/data_2024-02-10.csv").exists());
}

#[test]
fn test_rerun_leaves_buckets_unchanged() {
    let input = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    let source = write_source(
        &input,
        "timestamp,value\n2024-01-01 00:00:10,1\n2024-01-01 00:05:00,2\n2024-01-01 00:00:40,3\n",
    );
    let slicer = Slicer::new(config(output.path(), "%Y%m%d.csv")).unwrap();

    slicer.slice_file(&source).unwrap();
    let bucket = output.path().join("20240101.csv");
    let first = fs::read_to_string(&bucket).unwrap();

    let report = slicer.slice_file(&source).unwrap();
    assert_eq!(fs::read_to_string(&bucket).unwrap(), first);
    assert_eq!(report.written[0].rows_loaded, 2);
    assert_eq!(report.written[0].duplicates_dropped, 3);
    assert_eq!(
        first,
        "timestamp,value\n2024-01-01T00:00:00+00:00,1\n2024-01-01T00:05:00+00:00,2\n"
    );
}

#[test]
fn test_existing_bucket_row_wins_and_new_minute_is_appended() {
    let input = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    fs::write(
        output.path().join("20240101.csv"),
        "timestamp,value\n2024-01-01T00:00:00+00:00,5\n",
    )
    .unwrap();
    let source = write_source(&input, "timestamp,value\n2024-01-01 00:00:00,9\n2024-01-01 00:01:00,7\n");

    let report = Slicer::new(config(output.path(), "%Y%m%d.csv"))
        .unwrap()
        .slice_file(&source)
        .unwrap();

    assert!(!report.written[0].created);
    assert_eq!(
        fs::read_to_string(output.path().join("20240101.csv")).unwrap(),
        "timestamp,value\n2024-01-01T00:00:00+00:00,5\n2024-01-01T00:01:00+00:00,7\n"
    );
}

#[test]
fn test_end_of_day_rollover_goes_to_next_day_bucket() {
    let input = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    let source = write_source(&input, "timestamp,value\n2024-05-01 24:00:00,1\n");

    let mut config = config(output.path(), "%Y%m%d.csv");
    config.date_format_in = Some("%Y-%m-%d %H:%M:%S".to_string());
    Slicer::new(config).unwrap().slice_file(&source).unwrap();

    assert!(!output.path().join("20240501.csv").exists());
    assert_eq!(
        fs::read_to_string(output.path().join("20240502.csv")).unwrap(),
        "timestamp,value\n2024-05-02T00:00:00+00:00,1\n"
    );
}

#[test]
fn test_hour_adjustment_shifts_naive_index() {
    let input = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    let source = write_source(&input, "timestamp,value\n2024-01-01T00:00:00,1\n");

    let mut config = config(output.path(), "%Y%m%d.csv");
    config.adjust_tz = Some(TzAdjust {
        hours: 3.5,
        zone: "UTC".to_string(),
    });
    config.floor_seconds = 0;
    Slicer::new(config).unwrap().slice_file(&source).unwrap();

    assert_eq!(
        fs::read_to_string(output.path().join("20240101.csv")).unwrap(),
        "timestamp,value\n2024-01-01T03:30:00+00:00,1\n"
    );
}

#[test]
fn test_path_coarser_than_group_is_rejected_before_writing() {
    let input = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    let source = write_source(&input, "timestamp,value\n2024-01-01 00:00:00,1\n2024-01-02 00:00:00,2\n");

    let err = Slicer::new(config(output.path(), "%Y%m.csv"))
        .unwrap()
        .slice_file(&source)
        .unwrap_err();

    assert!(matches!(err, SlicerError::Config { .. }));
    assert!(!output.path().join("202401.csv").exists());
}

#[test]
fn test_broken_bucket_is_isolated() {
    let input = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    fs::write(output.path().join("20240101.csv"), "when,value\nyesterday,5\n").unwrap();
    let source = write_source(&input, "timestamp,value\n2024-01-01 00:00:00,1\n2024-01-02 00:00:00,2\n");

    let report = Slicer::new(config(output.path(), "%Y%m%d.csv"))
        .unwrap()
        .slice_file(&source)
        .unwrap();

    assert!(!report.is_success());
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.written.len(), 1);
    assert_eq!(
        fs::read_to_string(output.path().join("20240101.csv")).unwrap(),
        "when,value\nyesterday,5\n"
    );
    assert!(output.path().join("20240102.csv").exists());
}

#[test]
fn test_offset_free_output_in_dst_zone_survives_rerun() {
    let input = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    let source = write_source(&input, "timestamp,value\n2024-11-03T06:30:00+00:00,1\n");

    let mut config = config(output.path(), "%Y%m%d.csv");
    config.adjust_tz = Some(TzAdjust {
        hours: 0.0,
        zone: "America/Chicago".to_string(),
    });
    config.date_format_out = "%Y-%m-%d %H:%M:%S".to_string();
    let slicer = Slicer::new(config).unwrap();

    assert!(slicer.slice_file(&source).unwrap().is_success());
    let bucket = output.path().join("20241103.csv");
    assert_eq!(
        fs::read_to_string(&bucket).unwrap(),
        "timestamp,value\n2024-11-03 01:30:00,1\n"
    );

    let rerun = slicer.slice_file(&source).unwrap();
    assert!(rerun.is_success());
    assert_eq!(
        fs::read_to_string(&bucket).unwrap(),
        "timestamp,value\n2024-11-03 01:30:00,1\n"
    );
}
