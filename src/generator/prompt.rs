//! Prompt construction.

use std::fs;
use std::path::Path;

use tracing::warn;

/// Context text used when no system-info file is supplied.
pub const NO_SYSTEM_CONTEXT: &str = "No additional system context provided.";

/// Optional background about the system under test, added to every prompt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SystemContext(Option<String>);

impl SystemContext {
    pub fn none() -> Self {
        Self(None)
    }

    pub fn from_text(text: impl Into<String>) -> Self {
        let text = text.into();
        if text.trim().is_empty() {
            Self(None)
        } else {
            Self(Some(text.trim().to_string()))
        }
    }

    /// Reads the context file. A missing or unreadable file is logged and ignored,
    /// since the context only refines the prompt.
    pub fn load(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::none();
        };
        match fs::read_to_string(path) {
            Ok(text) => Self::from_text(text),
            Err(e) => {
                warn!(path = %path.display(), "cannot read system information file: {e}");
                Self::none()
            }
        }
    }

    pub fn as_prompt_text(&self) -> &str {
        self.0.as_deref().unwrap_or(NO_SYSTEM_CONTEXT)
    }
}

/// Builds the request text for one user story.
pub fn build_prompt(narrative: &str, context: &SystemContext) -> String {
    format!(
        r#"Generate detailed test cases for the following user story:
{narrative}
Please return the output in **strict JSON format**, with no extra text, using the structure below:
Output the test cases in the following structured format:

{{
    "Title": "Verify Login Functionality",
    "Objective": "Verify that a user can log in with valid credentials",
    "Precondition": "User must be registered and have valid credentials",
    "Test steps": [
        {{
            "Step": "1. Enter valid username and password",
            "Test Data": "Username: testuser, Password: testpass",
            "Expected Result": "User is logged in successfully"
        }},
        {{
            "Step": "2. Enter invalid username and password",
            "Test Data": "Username: invaliduser, Password: invalidpass",
            "Expected Result": "Error message is displayed"
        }}
    ],
    "Coverage": "Requirement ID: LOGIN-001",
    "Status": "Draft"
}}
Return a JSON array when there is more than one test case.
Ensure that the response is **valid JSON**, without any markdown formatting, explanations, or additional text.
Use the following additional information as an aid to write the steps in the test cases and not the full test cases.
Additional System Context:
{context}"#,
        context = context.as_prompt_text(),
    )
}
