//! The story-to-workbook pipeline.
//!
//! Stories are processed strictly in order, one blocking request at a time, and their
//! records are appended to a single list, which keeps the output in input order.
//! What happens when one story fails is decided by [`FailurePolicy`].

use tracing::{error, info, warn};

use crate::diagnostics::{Result, StorycaseError};
use crate::generator::{CompletionClient, TestCaseGenerator};
use crate::records::{TestCaseRecord, UserStoryRecord};
use crate::writer::{OutputTarget, WriteOutcome};

/// What to do when generation fails for one story.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Stop the run and report the error.
    #[default]
    Abort,
    /// Log the failure, record the story as skipped, and continue. Credential
    /// rejections still abort.
    Skip,
}

/// Receives progress events while the pipeline runs.
pub trait ProgressSink {
    fn story_started(&mut self, position: usize, story: &UserStoryRecord);
    fn story_completed(&mut self, story: &UserStoryRecord, rows: usize);
    fn story_skipped(&mut self, story: &UserStoryRecord, error: &StorycaseError);
}

/// A story left out of the output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedStory {
    pub story_id: String,
    pub reason: String,
}

/// Records accumulated by a run, in input order.
#[derive(Debug, Default)]
pub struct RunOutcome {
    pub records: Vec<TestCaseRecord>,
    pub stories_processed: usize,
    pub skipped: Vec<SkippedStory>,
}

impl RunOutcome {
    /// True when there were stories and every one of them was skipped.
    pub fn all_skipped(&self) -> bool {
        self.stories_processed > 0 && self.skipped.len() == self.stories_processed
    }
}

/// Result of [`run_to_workbook`].
#[derive(Debug)]
pub struct RunReport {
    pub outcome: RunOutcome,
    pub written: WriteOutcome,
}

impl RunReport {
    /// A run that skipped every story produced nothing and counts as failed.
    pub fn succeeded(&self) -> bool {
        !self.outcome.all_skipped()
    }
}

/// Generates test cases for every story.
pub fn generate_all<I, C>(
    stories: I,
    generator: &TestCaseGenerator<C>,
    policy: FailurePolicy,
    sink: &mut dyn ProgressSink,
) -> Result<RunOutcome>
where
    I: IntoIterator<Item = UserStoryRecord>,
    C: CompletionClient,
{
    let mut outcome = RunOutcome::default();

    for (index, story) in stories.into_iter().enumerate() {
        sink.story_started(index + 1, &story);
        outcome.stories_processed += 1;

        match generator.generate(&story) {
            Ok(records) => {
                sink.story_completed(&story, records.len());
                outcome.records.extend(records);
            }
            Err(e) if policy == FailurePolicy::Skip && e.is_row_recoverable() => {
                warn!(story = %story.id, "skipping story: {e}");
                if let Some(raw) = e.raw_reply() {
                    warn!(story = %story.id, "raw reply: {raw}");
                }
                sink.story_skipped(&story, &e);
                outcome.skipped.push(SkippedStory {
                    story_id: story.id.clone(),
                    reason: e.to_string(),
                });
            }
            Err(e) => {
                error!(story = %story.id, "aborting run: {e}");
                if let Some(raw) = e.raw_reply() {
                    error!(story = %story.id, "raw reply: {raw}");
                }
                return Err(e);
            }
        }
    }

    info!(
        stories = outcome.stories_processed,
        rows = outcome.records.len(),
        skipped = outcome.skipped.len(),
        "generation finished"
    );
    Ok(outcome)
}

/// Generates test cases for every story and writes them to `target`.
pub fn run_to_workbook<I, C>(
    stories: I,
    generator: &TestCaseGenerator<C>,
    policy: FailurePolicy,
    target: &OutputTarget,
    sink: &mut dyn ProgressSink,
) -> Result<RunReport>
where
    I: IntoIterator<Item = UserStoryRecord>,
    C: CompletionClient,
{
    let outcome = generate_all(stories, generator, policy, sink)?;
    let written = target.write(&outcome.records)?;
    if written == WriteOutcome::NothingToWrite {
        warn!(path = %target.path().display(), "no test cases generated, workbook not created");
    }
    Ok(RunReport { outcome, written })
}
