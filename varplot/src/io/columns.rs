//! Untyped column tables read from flat files.
//!
//! Every supported file format is first loaded into a [`ColumnTable`]: named
//! columns of equal length, holding either text or floating point cells. The
//! typed flux and statistics tables are built on top of this.

use std::path::Path;

use crate::error::{PlotError, Result};

/// Column data as read from disk
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    Text(Vec<String>),
    Float(Vec<f64>),
}

impl Column {
    fn len(&self) -> usize {
        match self {
            Column::Text(values) => values.len(),
            Column::Float(values) => values.len(),
        }
    }
}

/// Named, equal-length columns
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnTable {
    /// Name used in error messages, usually the file path
    name: String,
    names: Vec<String>,
    columns: Vec<Column>,
    num_rows: usize,
}

impl ColumnTable {
    pub fn new(name: impl Into<String>, names: Vec<String>, columns: Vec<Column>) -> Self {
        let num_rows = columns.iter().map(Column::len).min().unwrap_or(0);
        Self {
            name: name.into(),
            names,
            columns,
            num_rows,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn column_names(&self) -> &[String] {
        &self.names
    }

    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    /// Index of a column by exact name
    pub fn position(&self, column: &str) -> Option<usize> {
        self.names.iter().position(|n| n == column)
    }

    /// Like [`position`](Self::position) but missing columns are an error
    pub fn require(&self, column: &str) -> Result<usize> {
        self.position(column).ok_or_else(|| PlotError::MissingColumn {
            table: self.name.clone(),
            column: column.to_string(),
        })
    }

    /// Indices of all columns whose name starts with `prefix`, in column order
    pub fn family(&self, prefix: &str) -> Vec<usize> {
        self.names
            .iter()
            .enumerate()
            .filter(|(_, n)| n.starts_with(prefix))
            .map(|(i, _)| i)
            .collect()
    }

    /// Cell as text; float cells are formatted
    pub fn text(&self, column: usize, row: usize) -> String {
        match &self.columns[column] {
            Column::Text(values) => values[row].trim().to_string(),
            Column::Float(values) => values[row].to_string(),
        }
    }

    /// Cell as a float; empty and masked (`--`) text cells read as NaN
    pub fn float(&self, column: usize, row: usize) -> Result<f64> {
        match &self.columns[column] {
            Column::Float(values) => Ok(values[row]),
            Column::Text(values) => {
                let raw = values[row].trim();
                if raw.is_empty() || raw == "--" {
                    return Ok(f64::NAN);
                }
                raw.parse::<f64>().map_err(|_| PlotError::InvalidValue {
                    column: self.names[column].clone(),
                    row,
                    value: raw.to_string(),
                })
            }
        }
    }
}

/// Delimited text table with a header row
pub fn read_delimited(path: &Path, delimiter: u8) -> Result<ColumnTable> {
    let csv_err = |source| PlotError::Csv {
        path: path.to_path_buf(),
        source,
    };

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .trim(csv::Trim::All)
        .comment(Some(b'#'))
        .from_path(path)
        .map_err(csv_err)?;

    let names: Vec<String> = reader
        .headers()
        .map_err(csv_err)?
        .iter()
        .map(str::to_string)
        .collect();

    let mut cells: Vec<Vec<String>> = vec![Vec::new(); names.len()];
    for record in reader.records() {
        let record = record.map_err(csv_err)?;
        for (i, column) in cells.iter_mut().enumerate() {
            column.push(record.get(i).unwrap_or_default().to_string());
        }
    }

    let columns = cells.into_iter().map(Column::Text).collect();
    Ok(ColumnTable::new(
        path.display().to_string(),
        names,
        columns,
    ))
}

/// Load a table, choosing the reader from the file extension
///
/// `.tsv`/`.tab` are tab separated, `.fits`/`.fit`/`.fts` are FITS binary
/// tables, everything else is treated as comma separated.
pub fn read_table(path: &Path) -> Result<ColumnTable> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    match extension.as_str() {
        "tsv" | "tab" => read_delimited(path, b'\t'),
        "fits" | "fit" | "fts" => read_fits(path),
        _ => read_delimited(path, b','),
    }
}

#[cfg(feature = "fits")]
fn read_fits(path: &Path) -> Result<ColumnTable> {
    super::fits::read_fits_table(path)
}

#[cfg(not(feature = "fits"))]
fn read_fits(path: &Path) -> Result<ColumnTable> {
    Err(PlotError::Fits {
        path: path.to_path_buf(),
        message: "FITS support not compiled in (enable the `fits` feature)".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, contents: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_read_csv_columns_and_families() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "flux.csv",
            "uuid,peak_flux_1,peak_flux_2,err_peak_flux_1,err_peak_flux_2\n\
             a,1.0,2.0,0.1,0.2\n\
             b,3.0,,0.3,0.4\n",
        );

        let table = read_table(&path).unwrap();
        assert_eq!(table.num_rows(), 2);
        assert_eq!(table.family("peak_flux"), vec![1, 2]);
        assert_eq!(table.family("err_peak_flux"), vec![3, 4]);
        assert_eq!(table.text(0, 1), "b");
        assert_eq!(table.float(1, 0).unwrap(), 1.0);
        assert!(table.float(2, 1).unwrap().is_nan());
    }

    #[test]
    fn test_read_tsv_by_extension() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "stats.tsv", "uuid\tmd\nx\t0.25\n");

        let table = read_table(&path).unwrap();
        assert_eq!(table.column_names(), &["uuid".to_string(), "md".to_string()]);
        assert_eq!(table.float(1, 0).unwrap(), 0.25);
    }

    #[test]
    fn test_comment_lines_ignored() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "stats.csv", "uuid,md\n# generated upstream\nx,0.5\n");
        assert_eq!(read_table(&path).unwrap().num_rows(), 1);
    }

    #[test]
    fn test_masked_and_invalid_cells() {
        let table = ColumnTable::new(
            "t",
            vec!["v".to_string()],
            vec![Column::Text(vec!["--".to_string(), "abc".to_string()])],
        );
        assert!(table.float(0, 0).unwrap().is_nan());
        match table.float(0, 1) {
            Err(PlotError::InvalidValue { column, row, value }) => {
                assert_eq!(column, "v");
                assert_eq!(row, 1);
                assert_eq!(value, "abc");
            }
            other => panic!("expected InvalidValue, got {other:?}"),
        }
    }

    #[test]
    fn test_require_reports_table_and_column() {
        let table = ColumnTable::new("stats.csv", vec!["uuid".to_string()], vec![
            Column::Text(vec![]),
        ]);
        match table.require("md") {
            Err(PlotError::MissingColumn { table, column }) => {
                assert_eq!(table, "stats.csv");
                assert_eq!(column, "md");
            }
            other => panic!("expected MissingColumn, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_file_is_csv_error() {
        let dir = TempDir::new().unwrap();
        let result = read_table(&dir.path().join("absent.csv"));
        assert!(matches!(result, Err(PlotError::Csv { .. })));
    }
}
