//! Output writer: lays test case records out in a fresh `.xlsx` workbook.
//!
//! The destination is validated when the [`OutputTarget`] is built, so a bad path
//! fails before any AI request and before anything touches the disk.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, TimeZone};
use rust_xlsxwriter::{Format, FormatAlign, FormatBorder, Workbook, XlsxError};
use tracing::info;
use unicode_width::UnicodeWidthStr;

use crate::diagnostics::{Result, StorycaseError};
use crate::records::{TestCaseRecord, CASE_LEVEL_COLUMNS, OUTPUT_HEADERS};

pub const OUTPUT_EXTENSION: &str = "xlsx";
pub const SHEET_NAME: &str = "Test Cases";

const MIN_COLUMN_WIDTH: usize = 15;
const COLUMN_PADDING: usize = 5;
/// Data rows available below the header on one worksheet.
const MAX_DATA_ROWS: usize = 1_048_575;

/// Where the workbook will be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputTarget {
    path: PathBuf,
}

/// What [`OutputTarget::write`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    Written { path: PathBuf, rows: usize },
    /// No records, so no file was created.
    NothingToWrite,
}

impl OutputTarget {
    /// Accepts `path` if it ends in `.xlsx` (any case).
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let valid = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case(OUTPUT_EXTENSION));
        if !valid {
            return Err(StorycaseError::InvalidPath { path });
        }
        Ok(Self { path })
    }

    /// `Test_Cases_<DDMMYYYYHHmmss>.xlsx` in the working directory, stamped now.
    pub fn timestamped() -> Self {
        Self::timestamped_at(&Local::now())
    }

    pub fn timestamped_at<Tz: TimeZone>(now: &DateTime<Tz>) -> Self
    where
        Tz::Offset: std::fmt::Display,
    {
        Self {
            path: PathBuf::from(default_file_name(now)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Checks that the directory the workbook will be saved in exists, so a bad
    /// destination is reported before any test cases are generated.
    pub fn check_directory(&self) -> Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        if dir.is_dir() {
            Ok(())
        } else {
            Err(self.output_error(format!("directory '{}' does not exist", dir.display())))
        }
    }

    /// Writes `records` to a new workbook, replacing any file at the path.
    pub fn write(&self, records: &[TestCaseRecord]) -> Result<WriteOutcome> {
        if records.is_empty() {
            return Ok(WriteOutcome::NothingToWrite);
        }
        if records.len() > MAX_DATA_ROWS {
            return Err(self.output_error(format!(
                "{} rows exceed the worksheet limit of {MAX_DATA_ROWS}",
                records.len()
            )));
        }

        let mut workbook = build_workbook(records).map_err(|e| self.output_error(e.to_string()))?;
        workbook
            .save(&self.path)
            .map_err(|e| self.output_error(e.to_string()))?;

        info!(path = %self.path.display(), rows = records.len(), "workbook saved");
        Ok(WriteOutcome::Written {
            path: self.path.clone(),
            rows: records.len(),
        })
    }

    fn output_error(&self, message: String) -> StorycaseError {
        StorycaseError::Output {
            path: self.path.clone(),
            message,
        }
    }
}

pub fn default_file_name<Tz: TimeZone>(now: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!("Test_Cases_{}.{OUTPUT_EXTENSION}", now.format("%d%m%Y%H%M%S"))
}

/// Column width for a header: its display width plus padding, never below the minimum.
pub fn column_width(header: &str) -> usize {
    MIN_COLUMN_WIDTH.max(header.width() + COLUMN_PADDING)
}

/// Row spans `[first, last]` (indices into `records`) of each test case.
fn case_spans(records: &[TestCaseRecord]) -> Vec<(usize, usize)> {
    let mut spans: Vec<(usize, usize)> = Vec::new();
    for (index, record) in records.iter().enumerate() {
        match spans.last_mut() {
            Some(span) if !record.opens_case => span.1 = index,
            _ => spans.push((index, index)),
        }
    }
    spans
}

fn build_workbook(records: &[TestCaseRecord]) -> std::result::Result<Workbook, XlsxError> {
    let mut workbook = Workbook::new();
    let header_format = Format::new().set_bold().set_border(FormatBorder::Thin);
    let merge_format = Format::new()
        .set_align(FormatAlign::Center)
        .set_align(FormatAlign::VerticalCenter)
        .set_text_wrap();

    let sheet = workbook.add_worksheet();
    sheet.set_name(SHEET_NAME)?;

    for (col, header) in OUTPUT_HEADERS.iter().enumerate() {
        let col = col as u16;
        sheet.write_string_with_format(0, col, *header, &header_format)?;
        sheet.set_column_width(col, column_width(header) as f64)?;
    }

    for (first, last) in case_spans(records) {
        for (index, record) in records.iter().enumerate().take(last + 1).skip(first) {
            let row = index as u32 + 1;
            for (col, value) in record.cells().iter().enumerate() {
                let merged = last > first && CASE_LEVEL_COLUMNS.contains(&col);
                if !merged && !value.is_empty() {
                    sheet.write_string(row, col as u16, *value)?;
                }
            }
        }
        if last > first {
            let opening = records[first].cells();
            for col in CASE_LEVEL_COLUMNS {
                sheet.merge_range(
                    first as u32 + 1,
                    col as u16,
                    last as u32 + 1,
                    col as u16,
                    opening[col],
                    &merge_format,
                )?;
            }
        }
    }

    Ok(workbook)
}

#[cfg(test)]
mod tests {
    use calamine::{open_workbook_auto, Data, Reader};
    use chrono::{FixedOffset, TimeZone};

    use super::*;
    use crate::diagnostics::ErrorKind;

    fn step(story: &str, name: &str, description: &str, opens_case: bool) -> TestCaseRecord {
        TestCaseRecord {
            source_story_id: story.into(),
            name: name.into(),
            objective: format!("{name} objective"),
            precondition: "None".into(),
            description: description.into(),
            test_data: "-".into(),
            expected_result: format!("{description} ok"),
            status: "Draft".into(),
            opens_case,
        }
    }

    #[test]
    fn test_extension_is_checked_case_insensitively() {
        assert!(OutputTarget::new("out/Cases.XLSX").is_ok());
        for bad in ["cases.csv", "cases", "cases.xlsx.bak", "cases.xls"] {
            let err = OutputTarget::new(bad).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidPath, "{bad}");
        }
    }

    #[test]
    fn test_missing_directory_is_caught_before_writing() {
        let dir = tempfile::tempdir().unwrap();
        let target = OutputTarget::new(dir.path().join("absent/cases.xlsx")).unwrap();
        let err = target.check_directory().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Output);
        assert!(err.to_string().contains("does not exist"));

        assert!(OutputTarget::new(dir.path().join("cases.xlsx")).unwrap().check_directory().is_ok());
        assert!(OutputTarget::new("cases.xlsx").unwrap().check_directory().is_ok());
    }

    #[test]
    fn test_default_name_uses_day_first_timestamp() {
        let now = FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(2025, 3, 7, 9, 5, 2)
            .unwrap();
        assert_eq!(default_file_name(&now), "Test_Cases_07032025090502.xlsx");
        assert_eq!(
            OutputTarget::timestamped_at(&now).path(),
            Path::new("Test_Cases_07032025090502.xlsx")
        );
    }

    #[test]
    fn test_column_widths() {
        assert_eq!(column_width("Name"), 15);
        assert_eq!(column_width("Test Script (Step-by-Step) - Step"), 38);
    }

    #[test]
    fn test_case_spans_group_continuation_rows() {
        let records = vec![
            step("A", "one", "1", true),
            step("A", "one", "2", false),
            step("A", "one", "3", false),
            step("B", "two", "1", true),
        ];
        assert_eq!(case_spans(&records), vec![(0, 2), (3, 3)]);
    }

    #[test]
    fn test_empty_records_write_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let target = OutputTarget::new(dir.path().join("none.xlsx")).unwrap();
        assert_eq!(target.write(&[]).unwrap(), WriteOutcome::NothingToWrite);
        assert!(!target.path().exists());
    }

    #[test]
    fn test_missing_directory_is_output_error() {
        let dir = tempfile::tempdir().unwrap();
        let target = OutputTarget::new(dir.path().join("no/such/dir/out.xlsx")).unwrap();
        let err = target.write(&[step("A", "one", "1", true)]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Output);
    }

    #[test]
    fn test_written_workbook_layout() {
        let dir = tempfile::tempdir().unwrap();
        let target = OutputTarget::new(dir.path().join("cases.xlsx")).unwrap();
        let records = vec![
            step("ABC-123", "Submit", "1. Open", true),
            step("ABC-123", "Submit", "2. Send", false),
            step("XYZ-456", "Approve", "1. Approve", true),
        ];

        let outcome = target.write(&records).unwrap();
        assert_eq!(
            outcome,
            WriteOutcome::Written {
                path: target.path().to_path_buf(),
                rows: 3
            }
        );

        let mut workbook = open_workbook_auto(target.path()).unwrap();
        let range = workbook.worksheet_range(SHEET_NAME).unwrap();
        let rows: Vec<Vec<String>> = range
            .rows()
            .map(|row| {
                row.iter()
                    .map(|cell| match cell {
                        Data::String(s) => s.clone(),
                        _ => String::new(),
                    })
                    .collect()
            })
            .collect();

        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0], OUTPUT_HEADERS.map(String::from).to_vec());
        assert_eq!(rows[1][0], "Submit");
        assert_eq!(rows[1][6], "ABC-123");
        assert_eq!(rows[2][0], "");
        assert_eq!(rows[2][3], "2. Send");
        assert_eq!(rows[3][6], "XYZ-456");
    }
}
