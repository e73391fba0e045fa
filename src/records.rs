//! Records flowing through the pipeline.

/// Column headers of the generated workbook, in order.
pub const OUTPUT_HEADERS: [&str; 8] = [
    "Name",
    "Objective",
    "Precondition",
    "Test Script (Step-by-Step) - Step",
    "Test Script (Step-by-Step) - Test Data",
    "Test Script (Step-by-Step) - Expected Result",
    "Coverage (Issues)",
    "Status",
];

/// Columns that describe the whole test case rather than one step.
/// They are only filled on the row that opens a case.
pub const CASE_LEVEL_COLUMNS: [usize; 5] = [0, 1, 2, 6, 7];

/// One user story read from the input sheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserStoryRecord {
    pub id: String,
    pub narrative: String,
}

impl UserStoryRecord {
    pub fn new(id: impl Into<String>, narrative: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            narrative: narrative.into(),
        }
    }
}

/// One output row: a single step of a drafted test case.
///
/// The case-level fields are repeated on every step so a record is self-contained;
/// [`TestCaseRecord::cells`] blanks them on rows that continue a case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestCaseRecord {
    pub source_story_id: String,
    pub name: String,
    pub objective: String,
    pub precondition: String,
    pub description: String,
    pub test_data: String,
    pub expected_result: String,
    pub status: String,
    /// True for the first step of a test case.
    pub opens_case: bool,
}

impl TestCaseRecord {
    /// The row as laid out under [`OUTPUT_HEADERS`].
    pub fn cells(&self) -> [&str; 8] {
        let opens = self.opens_case;
        [
            case_level(opens, &self.name),
            case_level(opens, &self.objective),
            case_level(opens, &self.precondition),
            self.description.as_str(),
            self.test_data.as_str(),
            self.expected_result.as_str(),
            case_level(opens, &self.source_story_id),
            case_level(opens, &self.status),
        ]
    }
}

fn case_level(opens_case: bool, value: &str) -> &str {
    if opens_case {
        value
    } else {
        ""
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(opens_case: bool) -> TestCaseRecord {
        TestCaseRecord {
            source_story_id: "ABC-123".into(),
            name: "Submit expense".into(),
            objective: "Verify submission".into(),
            precondition: "Logged in".into(),
            description: "1. Open form".into(),
            test_data: "Amount: 10".into(),
            expected_result: "Form opens".into(),
            status: "Draft".into(),
            opens_case,
        }
    }

    #[test]
    fn opening_row_carries_case_columns() {
        let opening = record(true);
        let cells = opening.cells();
        assert_eq!(cells[0], "Submit expense");
        assert_eq!(cells[6], "ABC-123");
        assert_eq!(cells[7], "Draft");
    }

    #[test]
    fn continuation_row_blanks_case_columns() {
        let continuation = record(false);
        let cells = continuation.cells();
        for col in CASE_LEVEL_COLUMNS {
            assert_eq!(cells[col], "", "column {} should be blank", OUTPUT_HEADERS[col]);
        }
        assert_eq!(cells[3], "1. Open form");
        assert_eq!(cells[5], "Form opens");
    }
}
