//! CSV export discovery and loading.
//!
//! Timing exports are flat tables whose rows interleave driver header lines
//! with lap lines. This module only turns a file into a [`RawTable`] of string
//! cells; interpreting the rows is the parser's job.

use std::io::Read;
use std::path::{Path, PathBuf};

use serde::Serialize;
use timing_core::error::{Result, TimingError};
use tracing::{debug, warn};

// ── RawTable ──────────────────────────────────────────────────────────────────

/// A header row plus data rows of trimmed string cells.
///
/// Every row is padded (or truncated) to the header width so cell access by
/// column index never goes out of bounds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        let width = headers.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, String::new());
                row
            })
            .collect();
        Self { headers, rows }
    }

    /// Index of the first column named `name` (exact match after trimming).
    pub fn column_index(&self, name: &str) -> Option<usize> {
        let name = name.trim();
        self.headers.iter().position(|h| h == name)
    }

    /// Index of the first column matching any of `names`, in preference order.
    pub fn find_column<S: AsRef<str>>(&self, names: &[S]) -> Option<usize> {
        names.iter().find_map(|n| self.column_index(n.as_ref()))
    }

    pub fn cell(&self, row: usize, column: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|r| r.get(column))
            .map(String::as_str)
            .unwrap_or("")
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Find all `.csv` files recursively under `data_path`, sorted by path.
pub fn find_csv_files(data_path: &Path) -> Vec<PathBuf> {
    if !data_path.exists() {
        warn!("Data path does not exist: {}", data_path.display());
        return Vec::new();
    }

    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(data_path)
        .follow_links(true)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            entry.file_type().is_file()
                && entry
                    .path()
                    .extension()
                    .map(|ext| ext.eq_ignore_ascii_case("csv"))
                    .unwrap_or(false)
        })
        .map(|entry| entry.into_path())
        .collect();

    files.sort();
    files
}

/// Read an export file into a [`RawTable`].
pub fn read_table(path: &Path) -> Result<RawTable> {
    let bytes = std::fs::read(path).map_err(|source| TimingError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;
    let table = read_table_from(bytes.as_slice())?;
    debug!(
        "Read {} rows x {} columns from {}",
        table.rows.len(),
        table.headers.len(),
        path.display()
    );
    Ok(table)
}

/// Read CSV content from any reader.
///
/// The delimiter is sniffed from the header line: exports written with a
/// locale decimal comma use `;` between fields.
pub fn read_table_from<R: Read>(mut input: R) -> Result<RawTable> {
    let mut content = String::new();
    input.read_to_string(&mut content)?;
    let content = content.strip_prefix('\u{feff}').unwrap_or(&content);

    let delimiter = sniff_delimiter(content);
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(record.iter().map(str::to_string).collect());
    }

    Ok(RawTable::new(headers, rows))
}

// ── Internal helpers ──────────────────────────────────────────────────────────

fn sniff_delimiter(content: &str) -> u8 {
    let header = content.lines().next().unwrap_or("");
    let semicolons = header.matches(';').count();
    let commas = header.matches(',').count();
    if semicolons > commas {
        b';'
    } else {
        b','
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    // ── Helpers ───────────────────────────────────────────────────────────────

    fn write_file(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, content).unwrap();
        path
    }

    // ── find_csv_files ────────────────────────────────────────────────────────

    #[test]
    fn test_find_csv_files_recursive_sorted() {
        let tmp = TempDir::new().unwrap();
        write_file(tmp.path(), "b.csv", "x\n");
        write_file(tmp.path(), "sub/a.CSV", "x\n");
        write_file(tmp.path(), "notes.txt", "x\n");

        let files = find_csv_files(tmp.path());
        assert_eq!(files.len(), 2);
        assert!(files.windows(2).all(|w| w[0] <= w[1]));
        assert!(files.iter().all(|f| f.extension().is_some()));
    }

    #[test]
    fn test_find_csv_files_nonexistent_path() {
        assert!(find_csv_files(Path::new("/tmp/definitely-not-here-timing")).is_empty());
    }

    // ── read_table ────────────────────────────────────────────────────────────

    #[test]
    fn test_read_table_comma_delimited() {
        let tmp = TempDir::new().unwrap();
        let path = write_file(
            tmp.path(),
            "q2.csv",
            "Time of Day,Lap,Lap Tm\n12 - Jane Doe - Cat,,\n 10:01:02 ,1, 1:30.500 \n",
        );

        let table = read_table(&path).unwrap();
        assert_eq!(table.headers, vec!["Time of Day", "Lap", "Lap Tm"]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.cell(1, 0), "10:01:02");
        assert_eq!(table.cell(1, 2), "1:30.500");
    }

    #[test]
    fn test_read_table_semicolon_and_bom() {
        let content = "\u{feff}Time of Day;Lap Tm;S1 Tm\n10:01:02;1:30,500;28,200\n";
        let table = read_table_from(content.as_bytes()).unwrap();
        assert_eq!(table.headers[0], "Time of Day");
        assert_eq!(table.cell(0, 1), "1:30,500");
        assert_eq!(table.cell(0, 2), "28,200");
    }

    #[test]
    fn test_read_table_pads_short_rows() {
        let table = read_table_from("A,B,C\n1\n1,2,3,4\n".as_bytes()).unwrap();
        assert_eq!(table.rows[0], vec!["1", "", ""]);
        assert_eq!(table.rows[1].len(), 3);
    }

    #[test]
    fn test_read_table_missing_file() {
        let err = read_table(Path::new("/tmp/no-such-export.csv")).unwrap_err();
        assert!(matches!(err, TimingError::FileRead { .. }));
    }

    // ── RawTable ──────────────────────────────────────────────────────────────

    #[test]
    fn test_find_column_preference_order() {
        let table = RawTable::new(
            vec!["Lap Time".into(), "Lap Tm".into()],
            vec![vec!["1".into(), "2".into()]],
        );
        assert_eq!(table.find_column(&["Lap Tm", "Lap Time"]), Some(1));
        assert_eq!(table.find_column(&["Nope"]), None);
        assert_eq!(table.cell(0, 9), "");
        assert_eq!(table.cell(5, 0), "");
    }
}
