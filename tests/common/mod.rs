//! Shared fixtures for the Storycase integration tests.
//!
//! Input workbooks are built with `rust_xlsxwriter`; the AI service is replaced by
//! [`ScriptedClient`], which answers from a table keyed by story narrative.

#![allow(dead_code)]

use std::cell::RefCell;
use std::path::{Path, PathBuf};

use calamine::{open_workbook_auto, Data, Reader};
use rust_xlsxwriter::Workbook;
use storycase::generator::CompletionClient;
use storycase::{Result, StorycaseError};

pub const HEADERS: [&str; 2] = ["User Story ID", "User Story"];

pub const ABC_NARRATIVE: &str = "As an employee, I want to submit...";
pub const XYZ_NARRATIVE: &str = "As an admin, I want to approve...";

/// Writes a one-sheet workbook with `headers` in the first row.
pub fn write_workbook(dir: &Path, name: &str, headers: &[&str], rows: &[&[&str]]) -> PathBuf {
    let path = dir.join(name);
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    for (col, header) in headers.iter().enumerate() {
        sheet.write_string(0, col as u16, *header).unwrap();
    }
    for (r, row) in rows.iter().enumerate() {
        for (col, value) in row.iter().enumerate() {
            if !value.is_empty() {
                sheet.write_string(r as u32 + 1, col as u16, *value).unwrap();
            }
        }
    }
    workbook.save(&path).unwrap();
    path
}

/// The two-story input used throughout the tests.
pub fn example_stories(dir: &Path) -> PathBuf {
    write_workbook(
        dir,
        "stories.xlsx",
        &HEADERS,
        &[&["ABC-123", ABC_NARRATIVE], &["XYZ-456", XYZ_NARRATIVE]],
    )
}

/// JSON for one test case with `steps` steps.
pub fn case_json(title: &str, steps: usize) -> String {
    let steps: Vec<String> = (1..=steps)
        .map(|n| {
            format!(r#"{{"Step": "{n}. do {title}", "Test Data": "data {n}", "Expected Result": "result {n}"}}"#)
        })
        .collect();
    format!(
        r#"{{"Title": "{title}", "Objective": "check {title}", "Precondition": "none", "Test steps": [{}], "Status": "Draft"}}"#,
        steps.join(", ")
    )
}

/// `cases` single-step test cases as a JSON array.
pub fn cases_json(prefix: &str, cases: usize) -> String {
    let cases: Vec<String> = (1..=cases).map(|n| case_json(&format!("{prefix} {n}"), 1)).collect();
    format!("[{}]", cases.join(", "))
}

#[derive(Clone)]
enum Scripted {
    Text(String),
    Status(u16),
    InvalidKey,
}

/// Answers each prompt with the reply registered for the narrative it contains.
#[derive(Default)]
pub struct ScriptedClient {
    replies: Vec<(String, Scripted)>,
    pub calls: RefCell<usize>,
}

impl ScriptedClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(mut self, narrative: &str, text: impl Into<String>) -> Self {
        self.replies.push((narrative.to_string(), Scripted::Text(text.into())));
        self
    }

    pub fn fail(mut self, narrative: &str, status: u16) -> Self {
        self.replies.push((narrative.to_string(), Scripted::Status(status)));
        self
    }

    /// Fails like Gemini does for a bad key: HTTP 400 flagged `API_KEY_INVALID`.
    pub fn reject_key(mut self, narrative: &str) -> Self {
        self.replies.push((narrative.to_string(), Scripted::InvalidKey));
        self
    }
}

impl CompletionClient for ScriptedClient {
    fn complete(&self, prompt: &str) -> Result<String> {
        *self.calls.borrow_mut() += 1;
        let scripted = self
            .replies
            .iter()
            .find(|(narrative, _)| prompt.contains(narrative.as_str()))
            .map(|(_, reply)| reply.clone());
        match scripted {
            Some(Scripted::Text(text)) => Ok(text),
            Some(Scripted::Status(status)) => Err(StorycaseError::service(format!("HTTP {status}"), Some(status))),
            Some(Scripted::InvalidKey) => Err(StorycaseError::rejected_credential(
                "HTTP 400 Bad Request: API key not valid",
                Some(400),
            )),
            None => Ok("[]".to_string()),
        }
    }
}

/// Reads the `Test Cases` sheet of an output workbook as text rows, header included.
pub fn read_output(path: &Path) -> Vec<Vec<String>> {
    let mut workbook = open_workbook_auto(path).unwrap();
    let range = workbook.worksheet_range("Test Cases").unwrap();
    range
        .rows()
        .map(|row| {
            row.iter()
                .map(|cell| match cell {
                    Data::String(s) => s.clone(),
                    Data::Empty => String::new(),
                    other => format!("{other:?}"),
                })
                .collect()
        })
        .collect()
}
