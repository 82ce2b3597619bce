use crate::config::{ParseDates, ReadOptions};
use crate::error::{Result, SlicerError};
use crate::models::{Record, ZonedTimestamp};
use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// Column names plus rows of equal width.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Record>,
}

impl Table {
    /// Rows shorter than the header are padded with empty cells.
    pub fn new(columns: Vec<String>, rows: Vec<Record>) -> Self {
        let width = columns.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width.max(row.len()), String::new());
                row
            })
            .collect();
        Self { columns, rows }
    }

    /// Read a CSV file honouring skip rows, header row, empty-column stripping and renames.
    pub fn read_csv(path: &Path, options: &ReadOptions) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_path(path)
            .map_err(|e| SlicerError::csv(path, e))?;

        let mut records = Vec::new();
        for (position, result) in reader.records().enumerate() {
            let record = result.map_err(|e| SlicerError::csv(path, e))?;
            if options.skip_rows.skips(position) {
                continue;
            }
            records.push(record.iter().map(str::to_string).collect::<Record>());
        }

        let (columns, rows) = match options.header_row {
            Some(header_row) => {
                if header_row >= records.len() {
                    return Err(SlicerError::config(format!(
                        "header row {} is past the end of {} ({} rows after skipping)",
                        header_row,
                        path.display(),
                        records.len()
                    )));
                }
                let mut rest = records.split_off(header_row);
                let header = rest.remove(0);
                (header, rest)
            }
            None => {
                let width = records.iter().map(Vec::len).max().unwrap_or(0);
                ((0..width).map(|i| i.to_string()).collect(), records)
            }
        };

        let width = columns.len();
        for (i, row) in rows.iter().enumerate() {
            if row.len() > width && row[width..].iter().any(|cell| !cell.trim().is_empty()) {
                return Err(SlicerError::config(format!(
                    "{}: data row {} has {} fields, header has {}",
                    path.display(),
                    i + 1,
                    row.len(),
                    width
                )));
            }
        }
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.truncate(width);
                row
            })
            .collect();

        let mut table = Table::new(columns, rows);
        if !options.keep_empty_columns {
            table.drop_unnamed_columns();
        }
        if let Some(names) = &options.column_names {
            table.set_column_names(names.clone())?;
        }
        Ok(table)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Record] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn into_rows(self) -> Vec<Record> {
        self.rows
    }

    /// Look a column up by name, then by 0-based position.
    pub fn resolve(&self, column: &str) -> Result<usize> {
        if let Some(idx) = self.columns.iter().position(|c| c == column) {
            return Ok(idx);
        }
        match column.trim().parse::<usize>() {
            Ok(idx) if idx < self.columns.len() => Ok(idx),
            _ => Err(SlicerError::MissingColumn {
                column: column.to_string(),
                context: format!("columns [{}]", self.columns.join(", ")),
            }),
        }
    }

    /// Blank headers, and pandas-style `Unnamed: N` placeholders.
    pub fn drop_unnamed_columns(&mut self) {
        let keep: Vec<bool> = self
            .columns
            .iter()
            .map(|c| !(c.trim().is_empty() || c.starts_with("Unnamed")))
            .collect();
        if keep.iter().all(|k| *k) {
            return;
        }
        self.retain_columns(&keep);
    }

    pub fn set_column_names(&mut self, names: Vec<String>) -> Result<()> {
        if names.len() != self.columns.len() {
            return Err(SlicerError::config(format!(
                "{} column names given for {} columns",
                names.len(),
                self.columns.len()
            )));
        }
        self.columns = names;
        Ok(())
    }

    /// Every named column must exist.
    pub fn drop_columns(&mut self, names: &[String]) -> Result<()> {
        let mut keep = vec![true; self.columns.len()];
        for name in names {
            keep[self.resolve(name)?] = false;
        }
        self.retain_columns(&keep);
        Ok(())
    }

    pub fn remove_column(&mut self, idx: usize) -> (String, Vec<String>) {
        let name = self.columns.remove(idx);
        let values = self.rows.iter_mut().map(|row| row.remove(idx)).collect();
        (name, values)
    }

    /// `position` past the end appends.
    pub fn insert_column(&mut self, position: usize, name: impl Into<String>, values: Vec<String>) -> Result<()> {
        if values.len() != self.rows.len() {
            return Err(SlicerError::config(format!(
                "column has {} values for {} rows",
                values.len(),
                self.rows.len()
            )));
        }
        let position = position.min(self.columns.len());
        self.columns.insert(position, name.into());
        for (row, value) in self.rows.iter_mut().zip(values) {
            row.insert(position, value);
        }
        Ok(())
    }

    /// Apply a date-column selection; combined columns are inserted at the front.
    pub fn apply_parse_dates(&mut self, parse_dates: &ParseDates) -> Result<()> {
        match parse_dates {
            ParseDates::Infer(_) => Ok(()),
            ParseDates::Columns(columns) => {
                for column in columns {
                    self.resolve(column)?;
                }
                Ok(())
            }
            ParseDates::Combine(groups) => {
                for (position, (name, sources)) in groups.iter().enumerate() {
                    let indices = sources
                        .iter()
                        .map(|source| self.resolve(source))
                        .collect::<Result<Vec<_>>>()?;
                    let values = self
                        .rows
                        .iter()
                        .map(|row| {
                            indices
                                .iter()
                                .map(|&i| row[i].as_str())
                                .collect::<Vec<_>>()
                                .join(" ")
                        })
                        .collect();
                    self.insert_column(position, name.clone(), values)?;
                }
                Ok(())
            }
        }
    }

    pub fn write_csv(&self, path: &Path) -> Result<()> {
        persist_csv(path, Some(self.columns.as_slice()), self.rows.iter().cloned())
    }

    fn retain_columns(&mut self, keep: &[bool]) {
        let filter = |cells: &mut Vec<String>| {
            let mut flags = keep.iter();
            cells.retain(|_| *flags.next().unwrap_or(&true));
        };
        filter(&mut self.columns);
        for row in &mut self.rows {
            filter(row);
        }
    }
}

/// A table whose index column has been parsed and placed in a zone.
#[derive(Debug, Clone)]
pub struct TimeTable {
    pub index_name: String,
    pub index: Vec<ZonedTimestamp>,
    /// Remaining columns, row-aligned with `index`.
    pub table: Table,
}

impl TimeTable {
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}

/// Write a CSV file through a temp file in the target directory, then rename over the target.
///
/// Missing parent directories are created. A failure at any step leaves the
/// previous file (if any) untouched.
pub fn persist_csv<I>(path: &Path, header: Option<&[String]>, rows: I) -> Result<()>
where
    I: IntoIterator<Item = Record>,
{
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).map_err(|e| SlicerError::io(parent, e))?;

    let mut tmp = NamedTempFile::new_in(parent).map_err(|e| SlicerError::io(parent, e))?;
    {
        let mut writer = csv::WriterBuilder::new()
            .flexible(true)
            .from_writer(tmp.as_file_mut());
        if let Some(header) = header {
            writer
                .write_record(header)
                .map_err(|e| SlicerError::csv(path, e))?;
        }
        for row in rows {
            writer
                .write_record(&row)
                .map_err(|e| SlicerError::csv(path, e))?;
        }
        writer.flush().map_err(|e| SlicerError::io(path, e))?;
    }
    tmp.as_file_mut()
        .flush()
        .and_then(|_| tmp.as_file().sync_all())
        .map_err(|e| SlicerError::io(path, e))?;
    tmp.persist(path).map_err(|e| SlicerError::io(path, e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SkipRows;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_read_with_header_and_blank_columns() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "a.csv", "time,,value\n2024-01-01 00:00,x,1\n2024-01-01 00:01,y,2\n");
        let table = Table::read_csv(&path, &ReadOptions::default()).unwrap();
        assert_eq!(table.columns(), &["time", "value"]);
        assert_eq!(table.rows()[1], vec!["2024-01-01 00:01", "2"]);

        let kept = Table::read_csv(
            &path,
            &ReadOptions {
                keep_empty_columns: true,
                ..ReadOptions::default()
            },
        )
        .unwrap();
        assert_eq!(kept.columns().len(), 3);
    }

    #[test]
    fn test_skip_rows_and_header_row() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "toa5.csv",
            "\"TOA5\",\"logger\"\nTIMESTAMP,RECORD,temp\nTS,RN,C\n2024-01-01 00:00:00,1,3.2\n",
        );
        let options = ReadOptions {
            skip_rows: SkipRows::Rows(vec![0, 2]),
            ..ReadOptions::default()
        };
        let table = Table::read_csv(&path, &options).unwrap();
        assert_eq!(table.columns(), &["TIMESTAMP", "RECORD", "temp"]);
        assert_eq!(table.len(), 1);

        let options = ReadOptions {
            skip_rows: SkipRows::Leading(1),
            header_row: Some(0),
            ..ReadOptions::default()
        };
        let table = Table::read_csv(&path, &options).unwrap();
        assert_eq!(table.columns()[0], "TIMESTAMP");
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_no_header_names_by_position() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "raw.csv", "a,1\nb,2,\n");
        let options = ReadOptions {
            header_row: None,
            keep_empty_columns: true,
            ..ReadOptions::default()
        };
        let table = Table::read_csv(&path, &options).unwrap();
        assert_eq!(table.columns(), &["0", "1", "2"]);
        assert_eq!(table.rows()[0], vec!["a", "1", ""]);
        assert_eq!(table.resolve("1").unwrap(), 1);
    }

    #[test]
    fn test_ragged_rows() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "ragged.csv", "a,b\n1,2,,\n3,4,5\n");
        let err = Table::read_csv(&path, &ReadOptions::default()).unwrap_err();
        assert!(err.to_string().contains("data row 2"));
    }

    #[test]
    fn test_column_operations() {
        let mut table = Table::new(
            vec!["date".into(), "time".into(), "v".into()],
            vec![vec!["2024-01-01".into(), "10:00".into(), "1".into()]],
        );
        table
            .apply_parse_dates(&ParseDates::Combine(vec![(
                "date_time".into(),
                vec!["date".into(), "time".into()],
            )]))
            .unwrap();
        assert_eq!(table.columns(), &["date_time", "date", "time", "v"]);
        assert_eq!(table.rows()[0][0], "2024-01-01 10:00");

        table.drop_columns(&["date".into(), "time".into()]).unwrap();
        assert_eq!(table.columns(), &["date_time", "v"]);
        assert!(matches!(
            table.drop_columns(&["nope".into()]),
            Err(SlicerError::MissingColumn { .. })
        ));

        let (name, values) = table.remove_column(0);
        assert_eq!(name, "date_time");
        table.insert_column(usize::MAX, name, values).unwrap();
        assert_eq!(table.columns(), &["v", "date_time"]);
        assert!(table.set_column_names(vec!["only_one".into()]).is_err());
    }

    #[test]
    fn test_persist_creates_directories_and_replaces() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/deeper/out.csv");
        let header = vec!["a".to_string(), "b".to_string()];
        persist_csv(&path, Some(header.as_slice()), vec![vec!["1".to_string(), "2".to_string()]]).unwrap();
        persist_csv(&path, Some(header.as_slice()), vec![vec!["3".to_string(), "4".to_string()]]).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "a,b\n3,4\n");

        let leftovers: Vec<_> = fs::read_dir(path.parent().unwrap()).unwrap().collect();
        assert_eq!(leftovers.len(), 1);
    }
}
