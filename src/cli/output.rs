//! Handles all user-facing output for the CLI.
//!
//! Progress goes through the [`ProgressSink`] trait: [`ConsoleProgress`] prints
//! coloured lines to stdout, [`ProgressLog`] collects plain lines for tests and
//! programmatic capture. Diagnostic logging is separate and goes through `tracing`.

use std::io::Write;

use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

use crate::diagnostics::StorycaseError;
use crate::pipeline::{ProgressSink, RunReport};
use crate::records::UserStoryRecord;
use crate::writer::WriteOutcome;

// ============================================================================
// PROGRESS SINKS: ProgressLog and ConsoleProgress implementations
// ============================================================================

/// ProgressLog: collects progress events as short text lines.
#[derive(Debug, Default)]
pub struct ProgressLog {
    lines: Vec<String>,
}

impl ProgressLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }
}

impl ProgressSink for ProgressLog {
    fn story_started(&mut self, position: usize, story: &UserStoryRecord) {
        self.lines.push(format!("start {position} {}", story.id));
    }

    fn story_completed(&mut self, story: &UserStoryRecord, rows: usize) {
        self.lines.push(format!("done {} {rows}", story.id));
    }

    fn story_skipped(&mut self, story: &UserStoryRecord, _error: &StorycaseError) {
        self.lines.push(format!("skip {}", story.id));
    }
}

/// ConsoleProgress: writes coloured progress lines to stdout.
pub struct ConsoleProgress {
    stdout: StandardStream,
    total: usize,
}

impl ConsoleProgress {
    pub fn new(total: usize) -> Self {
        Self {
            stdout: StandardStream::stdout(ColorChoice::Auto),
            total,
        }
    }

    fn line(&mut self, color: Color, marker: &str, text: &str) {
        let _ = self.stdout.set_color(ColorSpec::new().set_fg(Some(color)).set_bold(true));
        let _ = write!(self.stdout, "{marker}");
        let _ = self.stdout.reset();
        let _ = writeln!(self.stdout, " {text}");
    }
}

impl ProgressSink for ConsoleProgress {
    fn story_started(&mut self, position: usize, story: &UserStoryRecord) {
        let text = format!("[{position}/{}] Generating test cases for {}", self.total, story.id);
        self.line(Color::Blue, "→", &text);
    }

    fn story_completed(&mut self, story: &UserStoryRecord, rows: usize) {
        let text = format!("{}: {rows} step(s)", story.id);
        self.line(Color::Green, "✓", &text);
    }

    fn story_skipped(&mut self, story: &UserStoryRecord, error: &StorycaseError) {
        let text = format!("{} skipped: {error}", story.id);
        self.line(Color::Yellow, "✗", &text);
    }
}

// ============================================================================
// SUMMARY
// ============================================================================

/// Prints the end-of-run summary.
pub fn print_report(report: &RunReport) {
    let mut stdout = StandardStream::stdout(ColorChoice::Auto);
    let outcome = &report.outcome;

    let _ = writeln!(stdout);
    match &report.written {
        WriteOutcome::Written { path, rows } => {
            let _ = stdout.set_color(ColorSpec::new().set_fg(Some(Color::Green)).set_bold(true));
            let _ = writeln!(stdout, "Test cases saved to {} ({rows} rows)", path.display());
        }
        WriteOutcome::NothingToWrite => {
            let _ = stdout.set_color(ColorSpec::new().set_fg(Some(Color::Yellow)).set_bold(true));
            let _ = writeln!(stdout, "No test cases generated; no workbook was created.");
        }
    }
    let _ = stdout.reset();

    let _ = writeln!(
        stdout,
        "Stories processed: {}, skipped: {}",
        outcome.stories_processed,
        outcome.skipped.len()
    );
    for skipped in &outcome.skipped {
        let _ = writeln!(stdout, "  • {}: {}", skipped.story_id, skipped.reason);
    }
    if outcome.all_skipped() {
        let _ = stdout.set_color(ColorSpec::new().set_fg(Some(Color::Red)).set_bold(true));
        let _ = writeln!(stdout, "Every story failed; the run is reported as an error.");
        let _ = stdout.reset();
    }
}
