//! Defines the command-line arguments for the Storycase CLI.
//!
//! This module uses the `clap` crate with its "derive" feature to create a
//! declarative and type-safe argument parsing structure.

use clap::Parser;
use std::path::PathBuf;

use crate::config::Settings;

/// The main CLI argument structure.
#[derive(Debug, Parser)]
#[command(
    name = "storycase",
    version,
    about = "Drafts test cases for spreadsheet user stories with a generative AI service."
)]
pub struct StorycaseArgs {
    /// Spreadsheet with "User Story ID" and "User Story" columns.
    #[arg(required = true)]
    pub input: PathBuf,

    /// Output workbook; must end in .xlsx. Defaults to Test_Cases_<DDMMYYYYHHmmss>.xlsx.
    pub output: Option<PathBuf>,

    /// Text file with system context added to every prompt.
    pub system_info: Option<PathBuf>,

    /// Settings file (YAML). Defaults to storycase.yaml when present.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Key-value file searched for the API key when it is not in the environment.
    #[arg(long, value_name = "PATH")]
    pub env_file: Option<PathBuf>,

    /// Model to request test cases from.
    #[arg(long)]
    pub model: Option<String>,

    /// Worksheet to read instead of the first one.
    #[arg(long)]
    pub sheet: Option<String>,

    /// Skip stories whose generation fails instead of aborting the run.
    #[arg(long)]
    pub keep_going: bool,

    /// Log debug details to stderr.
    #[arg(short, long)]
    pub verbose: bool,
}

impl StorycaseArgs {
    /// Layers the flags over settings loaded from file.
    pub fn apply_to(&self, mut settings: Settings) -> Settings {
        if let Some(model) = &self.model {
            settings = settings.with_model(model.clone());
        }
        if let Some(sheet) = &self.sheet {
            settings = settings.with_sheet(sheet.clone());
        }
        if let Some(env_file) = &self.env_file {
            settings = settings.with_env_file(env_file.clone());
        }
        if let Some(system_info) = &self.system_info {
            settings = settings.with_system_info(system_info.clone());
        }
        if self.keep_going {
            settings = settings.with_continue_on_error(true);
        }
        settings
    }
}
