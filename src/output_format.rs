// src/output_format.rs - CSV extract and summary JSON writers
use crate::error::{FunnelError, Result};
use crate::pipeline::context::Row;
use crate::pipeline::fields::cell_text;
use serde_json::Value;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::info;

/// Create the parent directory of `path` if it does not exist yet.
pub fn ensure_parent_dir(path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            fs::create_dir_all(parent).map_err(|source| FunnelError::Write {
                path: parent.to_path_buf(),
                source,
            })
        }
        _ => Ok(()),
    }
}

/// Write rows as CSV with a fixed header; missing columns become empty cells.
/// Records end in CRLF.
pub fn write_rows<W: Write>(writer: W, columns: &[&str], rows: &[Row]) -> Result<()> {
    let mut csv = csv::WriterBuilder::new()
        .terminator(csv::Terminator::CRLF)
        .from_writer(writer);
    csv.write_record(columns)?;

    for row in rows {
        csv.write_record(
            columns
                .iter()
                .map(|column| row.get(*column).map(cell_text).unwrap_or_default()),
        )?;
    }

    csv.flush().map_err(csv::Error::from)?;
    Ok(())
}

pub fn write_csv(path: &Path, columns: &[&str], rows: &[Row]) -> Result<()> {
    ensure_parent_dir(path)?;
    let file = File::create(path).map_err(|source| FunnelError::Write {
        path: path.to_path_buf(),
        source,
    })?;

    write_rows(BufWriter::new(file), columns, rows)?;
    info!(path = %path.display(), rows = rows.len(), "wrote CSV");
    Ok(())
}

/// Pretty-printed summary text, two-space indented.
pub fn render_summary(summary: &Value) -> Result<String> {
    Ok(serde_json::to_string_pretty(summary)?)
}

pub fn write_summary(path: &Path, summary: &Value) -> Result<()> {
    ensure_parent_dir(path)?;
    let text = render_summary(summary)?;
    fs::write(path, text).map_err(|source| FunnelError::Write {
        path: path.to_path_buf(),
        source,
    })?;

    info!(path = %path.display(), "wrote summary");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> Row {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_header_and_column_order() {
        let rows = vec![row(json!({"b": "2", "a": "1", "ignored": "x"}))];
        let mut out = Vec::new();
        write_rows(&mut out, &["a", "b", "missing"], &rows).unwrap();

        assert_eq!(String::from_utf8(out).unwrap(), "a,b,missing\r\n1,2,\r\n");
    }

    #[test]
    fn test_cells_are_quoted_and_stringified() {
        let rows = vec![row(json!({
            "name": "Smith, \"Jo\"",
            "flag": true,
            "n": 12,
            "none": null,
            "nested": {"k": 1}
        }))];
        let mut out = Vec::new();
        write_rows(&mut out, &["name", "flag", "n", "none", "nested"], &rows).unwrap();

        assert_eq!(
            String::from_utf8(out).unwrap(),
            "name,flag,n,none,nested\r\n\"Smith, \"\"Jo\"\"\",True,12,,\"{\"\"k\"\":1}\"\r\n"
        );
    }

    #[test]
    fn test_empty_rows_still_write_header() {
        let mut out = Vec::new();
        write_rows(&mut out, &["user_id", "tm"], &[]).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "user_id,tm\r\n");
    }

    #[test]
    fn test_write_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let csv_path = dir.path().join("nested/deeper/out.csv");
        let summary_path = dir.path().join("other/summary.json");

        write_csv(&csv_path, &["a"], &[]).unwrap();
        write_summary(&summary_path, &json!({"k": "é"})).unwrap();

        assert!(csv_path.exists());
        let text = fs::read_to_string(&summary_path).unwrap();
        assert_eq!(text, "{\n  \"k\": \"é\"\n}");
    }

    #[test]
    fn test_bare_filename_needs_no_parent() {
        assert!(ensure_parent_dir(Path::new("out.csv")).is_ok());
    }
}
