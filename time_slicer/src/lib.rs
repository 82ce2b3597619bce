pub mod bucket_plan;
pub mod bucket_writer;
pub mod config;
pub mod error;
pub mod models;
pub mod normalizer;
pub mod slicer;
pub mod table;
pub mod timezone;

pub use bucket_plan::{Bucket, BucketPlan};
pub use bucket_writer::{BucketFailure, BucketOutcome, BucketWriter, WriteOptions, WriteReport};
pub use config::{IndexColumn, ParseDates, ReadOptions, SkipRows, SliceConfig, SliceMethod, TzAdjust};
pub use error::{FormatError, Result, SlicerError, TimezoneError};
pub use models::{Record, Timestamp, Zone, ZonedTimestamp, DEFAULT_OUTPUT_FORMAT};
pub use normalizer::{normalize, normalize_inferred, normalize_with_fallbacks};
pub use slicer::Slicer;
pub use table::{persist_csv, Table, TimeTable};
