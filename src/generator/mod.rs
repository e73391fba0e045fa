//! Test-case generator: one AI request per user story.
//!
//! [`TestCaseGenerator`] owns a [`CompletionClient`] and the prompt context. For each
//! story it renders the prompt, sends it, and turns the reply into
//! [`TestCaseRecord`]s. Replies that cannot be read as test cases become
//! `MalformedResponse` errors carrying the raw text.

use tracing::{debug, info};

use crate::diagnostics::{Result, StorycaseError};
use crate::records::{TestCaseRecord, UserStoryRecord};

pub mod gemini;
pub mod prompt;
pub mod reply;

pub use gemini::GeminiClient;
pub use prompt::{build_prompt, SystemContext};
pub use reply::{parse_reply, DraftCase, DraftStep, ParsedReply};

/// A text completion service.
pub trait CompletionClient {
    /// Sends `prompt` and returns the generated text.
    fn complete(&self, prompt: &str) -> Result<String>;
}

/// Drafts test cases for user stories.
#[derive(Debug)]
pub struct TestCaseGenerator<C> {
    client: C,
    context: SystemContext,
}

impl<C: CompletionClient> TestCaseGenerator<C> {
    pub fn new(client: C, context: SystemContext) -> Self {
        Self { client, context }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Requests test cases for one story. Returns one record per test step, in the
    /// order the service listed them.
    pub fn generate(&self, story: &UserStoryRecord) -> Result<Vec<TestCaseRecord>> {
        let prompt = build_prompt(&story.narrative, &self.context);
        debug!(story = %story.id, prompt_bytes = prompt.len(), "requesting test cases");

        let reply = self
            .client
            .complete(&prompt)
            .map_err(|e| e.with_story(&story.id))?;

        match parse_reply(&reply) {
            ParsedReply::Cases(cases) => {
                let case_count = cases.len();
                let records: Vec<_> = cases
                    .into_iter()
                    .flat_map(|case| case.into_records(&story.id))
                    .collect();
                info!(story = %story.id, cases = case_count, rows = records.len(), "test cases drafted");
                Ok(records)
            }
            ParsedReply::Unparseable { raw, reason } => Err(StorycaseError::MalformedResponse {
                story_id: Some(story.id.clone()),
                reason,
                raw,
            }),
        }
    }
}
