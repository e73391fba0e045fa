//! Input reader: loads user stories from a spreadsheet.
//!
//! [`StoryTable::open`] validates the file and its header row up front, so every
//! structural problem surfaces before the first AI request. The stories themselves are
//! produced lazily by [`StoryTable::stories`], which can be called any number of times.

use std::iter::Skip;
use std::path::{Path, PathBuf};

use calamine::{open_workbook_auto, Data, Range, Reader, Rows};
use tracing::debug;

use crate::diagnostics::{Result, StorycaseError};
use crate::records::UserStoryRecord;

pub const STORY_ID_HEADER: &str = "User Story ID";
pub const STORY_HEADER: &str = "User Story";

/// A validated input sheet.
#[derive(Debug)]
pub struct StoryTable {
    source: PathBuf,
    range: Range<Data>,
    id_col: usize,
    story_col: usize,
}

impl StoryTable {
    /// Opens the first worksheet of the workbook at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_sheet(path, None)
    }

    /// Opens the named worksheet, or the first one when `sheet` is `None`.
    pub fn open_sheet(path: impl AsRef<Path>, sheet: Option<&str>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(StorycaseError::InputNotFound {
                path: path.to_path_buf(),
            });
        }

        let invalid = |reason: String| StorycaseError::InvalidFormat {
            path: path.to_path_buf(),
            reason,
        };

        let mut workbook = open_workbook_auto(path).map_err(|e| invalid(e.to_string()))?;
        let range = match sheet {
            Some(name) => {
                if !workbook.sheet_names().iter().any(|s| s == name) {
                    return Err(invalid(format!("worksheet '{name}' does not exist")));
                }
                workbook.worksheet_range(name).map_err(|e| invalid(e.to_string()))?
            }
            None => workbook
                .worksheet_range_at(0)
                .ok_or_else(|| invalid("workbook has no worksheets".to_string()))?
                .map_err(|e| invalid(e.to_string()))?,
        };

        Self::from_range(path, range)
    }

    /// Validates the header row of an already loaded range.
    pub fn from_range(source: &Path, range: Range<Data>) -> Result<Self> {
        let header: Vec<String> = range
            .rows()
            .next()
            .map(|row| row.iter().map(|cell| cell_text(cell).trim().to_string()).collect())
            .unwrap_or_default();

        let position = |name: &str| header.iter().position(|h| h == name);
        let (id_col, story_col) = match (position(STORY_ID_HEADER), position(STORY_HEADER)) {
            (Some(id_col), Some(story_col)) => (id_col, story_col),
            (id_col, story_col) => {
                let missing = [(STORY_ID_HEADER, id_col), (STORY_HEADER, story_col)]
                    .into_iter()
                    .filter(|(_, col)| col.is_none())
                    .map(|(name, _)| name.to_string())
                    .collect();
                return Err(StorycaseError::MissingColumns {
                    missing,
                    found: header.into_iter().filter(|h| !h.is_empty()).collect(),
                });
            }
        };

        debug!(
            source = %source.display(),
            id_col,
            story_col,
            height = range.height(),
            "input sheet validated"
        );

        Ok(Self {
            source: source.to_path_buf(),
            range,
            id_col,
            story_col,
        })
    }

    /// The stories in row order. Each call starts again from the first data row.
    pub fn stories(&self) -> Stories<'_> {
        Stories {
            rows: self.range.rows().skip(1),
            id_col: self.id_col,
            story_col: self.story_col,
        }
    }

    /// Number of data rows.
    pub fn len(&self) -> usize {
        self.stories().count()
    }

    pub fn is_empty(&self) -> bool {
        self.stories().next().is_none()
    }

    pub fn source(&self) -> &Path {
        &self.source
    }
}

/// Lazy iterator over the stories of a [`StoryTable`].
pub struct Stories<'a> {
    rows: Skip<Rows<'a, Data>>,
    id_col: usize,
    story_col: usize,
}

impl Iterator for Stories<'_> {
    type Item = UserStoryRecord;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let row = self.rows.next()?;
            let id = row.get(self.id_col).map(cell_text).unwrap_or_default();
            let narrative = row.get(self.story_col).map(cell_text).unwrap_or_default();
            let (id, narrative) = (id.trim(), narrative.trim());
            // Blank rows inside the used range are layout, not data.
            if id.is_empty() && narrative.is_empty() {
                continue;
            }
            return Some(UserStoryRecord::new(id, narrative));
        }
    }
}

/// Renders a cell as text. Integral numbers lose their fractional part so an id typed
/// as `123` reads back as `123`.
pub fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
        Data::Float(f) => f.to_string(),
        Data::Int(i) => i.to_string(),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => dt.as_f64().to_string(),
        Data::Error(e) => e.to_string(),
    }
}
