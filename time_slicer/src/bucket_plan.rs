//! Derives which output file and which in-memory group every row belongs to.
//!
//! Both keys are rendered independently from the row's timestamp, so the plan
//! checks that they partition the rows identically: each path pairs with
//! exactly one group key and vice versa. Anything else would route rows of one
//! group into another group's file.

use crate::error::{Result, SlicerError};
use crate::models::{validate_format, ZonedTimestamp};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Rows destined for one output file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bucket {
    pub path: PathBuf,
    pub group_key: String,
    /// Row positions in the source table, in input order.
    pub rows: Vec<usize>,
}

/// Buckets in first-occurrence order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BucketPlan {
    buckets: Vec<Bucket>,
}

impl BucketPlan {
    pub fn derive(
        index: &[ZonedTimestamp],
        path_format: &str,
        group_format: &str,
        output_root: &Path,
    ) -> Result<Self> {
        validate_format(path_format)?;
        validate_format(group_format)?;

        let mut buckets: Vec<Bucket> = Vec::new();
        let mut by_path: HashMap<PathBuf, usize> = HashMap::new();
        let mut by_key: HashMap<String, usize> = HashMap::new();

        for (row, ts) in index.iter().enumerate() {
            let relative = ts.render(path_format)?;
            if relative.trim().is_empty() {
                return Err(SlicerError::config(format!(
                    "path format '{}' renders an empty file name for row {}",
                    path_format,
                    row + 1
                )));
            }
            let path = output_root.join(relative);
            let group_key = ts.render(group_format)?;

            let slot = match (by_path.get(&path), by_key.get(&group_key)) {
                (None, None) => {
                    by_path.insert(path.clone(), buckets.len());
                    by_key.insert(group_key.clone(), buckets.len());
                    buckets.push(Bucket {
                        path,
                        group_key,
                        rows: Vec::new(),
                    });
                    buckets.len() - 1
                }
                (Some(&a), Some(&b)) if a == b => a,
                (path_slot, key_slot) => {
                    return Err(misaligned(row, &path, &group_key, path_slot, key_slot, &buckets, path_format, group_format))
                }
            };
            buckets[slot].rows.push(row);
        }

        Ok(Self { buckets })
    }

    pub fn buckets(&self) -> &[Bucket] {
        &self.buckets
    }

    /// Distinct output paths; `paths()[i]` pairs with `group_keys()[i]`.
    pub fn paths(&self) -> Vec<&Path> {
        self.buckets.iter().map(|b| b.path.as_path()).collect()
    }

    pub fn group_keys(&self) -> Vec<&str> {
        self.buckets.iter().map(|b| b.group_key.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}

#[allow(clippy::too_many_arguments)]
fn misaligned(
    row: usize,
    path: &Path,
    group_key: &str,
    path_slot: Option<&usize>,
    key_slot: Option<&usize>,
    buckets: &[Bucket],
    path_format: &str,
    group_format: &str,
) -> SlicerError {
    let conflict = match (path_slot, key_slot) {
        (Some(&slot), _) => format!(
            "file {} already holds group '{}'",
            path.display(),
            buckets[slot].group_key
        ),
        (None, Some(&slot)) => format!(
            "group '{}' already writes to {}",
            group_key,
            buckets[slot].path.display()
        ),
        (None, None) => "inconsistent bucket keys".to_string(),
    };
    SlicerError::config(format!(
        "row {} maps to file {} and group '{}', but {}; path format '{}' and group format '{}' must split rows identically",
        row + 1,
        path.display(),
        group_key,
        conflict,
        path_format,
        group_format
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Zone;
    use chrono::NaiveDateTime;

    fn index(values: &[&str]) -> Vec<ZonedTimestamp> {
        values
            .iter()
            .map(|v| {
                Zone::utc()
                    .localize(NaiveDateTime::parse_from_str(v, "%Y-%m-%d %H:%M").unwrap())
                    .unwrap()
            })
            .collect()
    }

    #[test]
    fn test_distinct_paths_and_keys_in_first_occurrence_order() {
        let idx = index(&[
            "2024-01-02 00:00",
            "2024-01-01 23:59",
            "2024-01-02 12:00",
            "2024-01-01 00:00",
        ]);
        let plan = BucketPlan::derive(&idx, "%Y/%m/data_%Y%m%d.csv", "%Y%m%d", Path::new("out")).unwrap();

        assert_eq!(
            plan.paths(),
            vec![
                Path::new("out/2024/01/data_20240102.csv"),
                Path::new("out/2024/01/data_20240101.csv")
            ]
        );
        assert_eq!(plan.group_keys(), vec!["20240102", "20240101"]);
        assert_eq!(plan.buckets()[0].rows, vec![0, 2]);
        assert_eq!(plan.buckets()[1].rows, vec![1, 3]);
    }

    #[test]
    fn test_buckets_partition_rows() {
        let idx = index(&["2024-01-01 00:00", "2024-01-01 01:00", "2024-01-02 00:00", "2024-01-01 02:00"]);
        let plan = BucketPlan::derive(&idx, "%Y%m%d.csv", "%d", Path::new(".")).unwrap();
        let mut rows: Vec<usize> = plan.buckets().iter().flat_map(|b| b.rows.clone()).collect();
        rows.sort_unstable();
        assert_eq!(rows, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_coarser_group_format_is_rejected() {
        let idx = index(&["2024-01-01 00:00", "2024-01-02 00:00"]);
        let err = BucketPlan::derive(&idx, "%Y%m%d.csv", "%Y%m", Path::new("out")).unwrap_err();
        assert!(matches!(err, SlicerError::Config { .. }));
        assert!(err.to_string().contains("row 2"));
    }

    #[test]
    fn test_finer_group_format_is_rejected() {
        let idx = index(&["2024-01-01 00:00", "2024-01-01 01:00"]);
        assert!(BucketPlan::derive(&idx, "%Y%m%d.csv", "%Y%m%d%H", Path::new("out")).is_err());
    }

    #[test]
    fn test_invalid_format_and_empty_index() {
        let idx = index(&["2024-01-01 00:00"]);
        assert!(BucketPlan::derive(&idx, "%Q.csv", "%Y", Path::new("out")).is_err());
        let plan = BucketPlan::derive(&[], "%Y.csv", "%Y", Path::new("out")).unwrap();
        assert!(plan.is_empty());
    }
}
