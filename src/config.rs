//! Run settings and credential resolution.
//!
//! Settings are layered: built-in defaults, then an optional YAML file, then CLI
//! flags. The API key is resolved once at startup, from the process environment or a
//! `KEY=VALUE` file, and handed to the service client as an [`ApiKey`] value. The
//! process environment is never modified.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::diagnostics::{Result, StorycaseError};
use crate::generator::gemini::{DEFAULT_API_BASE, DEFAULT_MODEL};
use crate::pipeline::FailurePolicy;

/// Settings file picked up from the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "storycase.yaml";

/// Environment variable holding the API key.
pub const DEFAULT_API_KEY_VAR: &str = "GEMINI_API_KEY";

/// Key-value file consulted when the variable is not set.
pub const DEFAULT_ENV_FILE: &str = ".env";

/// Run settings
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Model used for every request
    pub model: String,
    /// Base URL of the generative language API
    pub api_base: String,
    /// Name of the credential variable
    pub api_key_var: String,
    /// Key-value file searched for the credential
    pub env_file: PathBuf,
    /// Worksheet to read; the first one when unset
    pub sheet: Option<String>,
    /// Skip stories whose generation fails instead of aborting
    pub continue_on_error: bool,
    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,
    /// Ask the service for a JSON response body
    pub json_mode: bool,
    /// Text file with extra context for every prompt
    pub system_info: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
            api_key_var: DEFAULT_API_KEY_VAR.to_string(),
            env_file: PathBuf::from(DEFAULT_ENV_FILE),
            sheet: None,
            continue_on_error: false,
            request_timeout_secs: 120,
            json_mode: true,
            system_info: None,
        }
    }
}

impl Settings {
    /// Loads settings from `explicit`, or from [`DEFAULT_CONFIG_FILE`] when it exists,
    /// or falls back to the defaults.
    ///
    /// An explicitly named file that cannot be read is an error; a missing default
    /// file is not.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => {
                let default = PathBuf::from(DEFAULT_CONFIG_FILE);
                if !default.is_file() {
                    debug!("no {DEFAULT_CONFIG_FILE} found, using default settings");
                    return Ok(Self::default());
                }
                default
            }
        };

        let text = fs::read_to_string(&path).map_err(|e| StorycaseError::Config {
            path: path.clone(),
            message: format!("cannot read file: {e}"),
        })?;
        debug!(path = %path.display(), "loading settings");
        Self::from_yaml_str(&text, &path)
    }

    /// Parses settings from YAML text. `origin` is only used in error messages.
    pub fn from_yaml_str(text: &str, origin: &Path) -> Result<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        let settings: Self = serde_yaml::from_str(text).map_err(|e| StorycaseError::Config {
            path: origin.to_path_buf(),
            message: e.to_string(),
        })?;
        settings.validate(origin)?;
        Ok(settings)
    }

    fn validate(&self, origin: &Path) -> Result<()> {
        let invalid = |message: &str| StorycaseError::Config {
            path: origin.to_path_buf(),
            message: message.to_string(),
        };
        if self.model.trim().is_empty() {
            return Err(invalid("`model` must not be empty"));
        }
        if self.api_key_var.trim().is_empty() {
            return Err(invalid("`api_key_var` must not be empty"));
        }
        if self.request_timeout_secs == 0 {
            return Err(invalid("`request_timeout_secs` must be at least 1"));
        }
        Ok(())
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_sheet(mut self, sheet: impl Into<String>) -> Self {
        self.sheet = Some(sheet.into());
        self
    }

    pub fn with_env_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.env_file = path.into();
        self
    }

    pub fn with_system_info(mut self, path: impl Into<PathBuf>) -> Self {
        self.system_info = Some(path.into());
        self
    }

    pub fn with_continue_on_error(mut self, keep_going: bool) -> Self {
        self.continue_on_error = keep_going;
        self
    }

    pub fn failure_policy(&self) -> FailurePolicy {
        if self.continue_on_error {
            FailurePolicy::Skip
        } else {
            FailurePolicy::Abort
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

// ============================================================================
// CREDENTIAL
// ============================================================================

/// The AI service credential. Its `Debug` output never shows the key.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(<redacted>)")
    }
}

/// Resolves the credential named `var` from the process environment, then from
/// `env_file`.
pub fn resolve_api_key(var: &str, env_file: &Path) -> Result<ApiKey> {
    resolve_api_key_from(std::env::var(var).ok(), var, env_file)
}

/// Resolution with the environment lookup already done; blank values count as unset.
pub fn resolve_api_key_from(env_value: Option<String>, var: &str, env_file: &Path) -> Result<ApiKey> {
    let from_env = env_value.filter(|value| !value.trim().is_empty());
    if let Some(key) = from_env {
        debug!(var, "credential taken from the environment");
        return Ok(ApiKey::new(key.trim()));
    }

    match lookup_env_file(env_file, var) {
        Some(key) => {
            debug!(var, file = %env_file.display(), "credential taken from key-value file");
            Ok(ApiKey::new(key))
        }
        None => Err(StorycaseError::MissingCredential {
            name: var.to_string(),
        }),
    }
}

fn lookup_env_file(path: &Path, var: &str) -> Option<String> {
    if !path.is_file() {
        return None;
    }
    let entries = match dotenvy::from_path_iter(path) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(file = %path.display(), "cannot read key-value file: {e}");
            return None;
        }
    };
    for entry in entries {
        match entry {
            Ok((key, value)) if key == var => {
                let value = value.trim().to_string();
                return (!value.is_empty()).then_some(value);
            }
            Ok(_) => {}
            Err(e) => warn!(file = %path.display(), "skipping malformed line: {e}"),
        }
    }
    None
}
