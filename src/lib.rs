//! Storycase: drafts test cases for spreadsheet user stories.
//!
//! The pipeline is linear: [`reader`] loads the stories, [`generator`] asks the AI
//! service for test cases one story at a time, and [`writer`] lays the results out in
//! a fresh workbook. [`pipeline`] ties the three together.

pub use crate::diagnostics::{ErrorKind, Result, StorycaseError};

pub mod cli;
pub mod config;
pub mod diagnostics;
pub mod generator;
pub mod pipeline;
pub mod reader;
pub mod records;
pub mod writer;
