//! Error classification
//!
//! Maps any `AppError` onto a category, a severity and a retry decision.
//! Typed failures are recognised first at their position in the table below,
//! then the rendered message is matched against known failure signatures:
//!
//! | order | condition                                   | category         | retryable |
//! |-------|---------------------------------------------|------------------|-----------|
//! | 1     | network error or transport signature        | network          | yes       |
//! | 2     | validation error                            | validation       | no        |
//! | 3     | GitHub API error                            | forge_api        | transient |
//! | 4     | file system error or OS file signature      | file_system      | no        |
//! | 5     | external command error or devbox signature  | external_command | no        |
//! | 6     | configuration error or config signature     | configuration    | no        |
//! | 7     | anything else                               | unknown          | no        |

use crate::error::AppError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::LazyLock;
use tracing::{error, info, warn};

/// Default budget for serialized error context
pub const DEFAULT_MAX_CONTEXT_BYTES: usize = 2048;

static NETWORK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)ECONNRESET|ETIMEDOUT|ENOTFOUND|ECONNREFUSED|fetch failed|network error|connection error")
        .unwrap()
});
static FORGE_TRANSIENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)rate limit|server error|service unavailable|timeout").unwrap()
});
static FILE_SYSTEM_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)ENOENT|EACCES|EPERM|ENOSPC|no such file|permission denied|access denied")
        .unwrap()
});
static COMMAND_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)devbox.*(not found|failed)|command not found|command failed|lock regeneration failed")
        .unwrap()
});
static CONFIG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)missing.*token|invalid.*configuration|required.*parameter|environment.*variable")
        .unwrap()
});

/// Free-form diagnostic payload attached to a classification
pub type ErrorContext = Map<String, Value>;

/// Broad failure family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Network,
    Validation,
    ForgeApi,
    FileSystem,
    ExternalCommand,
    Configuration,
    Unknown,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorCategory::Network => "network",
            ErrorCategory::Validation => "validation",
            ErrorCategory::ForgeApi => "forge_api",
            ErrorCategory::FileSystem => "file_system",
            ErrorCategory::ExternalCommand => "external_command",
            ErrorCategory::Configuration => "configuration",
            ErrorCategory::Unknown => "unknown",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorSeverity::Low => "low",
            ErrorSeverity::Medium => "medium",
            ErrorSeverity::High => "high",
            ErrorSeverity::Critical => "critical",
        };
        write!(f, "{}", name)
    }
}

/// Result of classifying one failure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub category: ErrorCategory,
    pub severity: ErrorSeverity,
    pub message: String,
    pub code: String,
    pub context: ErrorContext,
    pub retryable: bool,
    pub suggestions: Vec<String>,
}

impl ErrorInfo {
    /// Plain-language message for the workflow log and the `error-message` output
    pub fn user_message(&self) -> String {
        let mut out = self.message.clone();
        if !self.suggestions.is_empty() {
            out.push_str("\n\nSuggestions:");
            for suggestion in &self.suggestions {
                out.push_str(&format!("\n• {}", suggestion));
            }
        }
        if self.retryable {
            out.push_str("\n\nThis error may be temporary. Re-running the workflow may succeed.");
        }
        out
    }
}

/// Classifies failures and logs each classification.
///
/// `classify` is total: every error yields an `ErrorInfo`.
#[derive(Debug, Clone)]
pub struct ErrorClassifier {
    max_context_bytes: usize,
}

impl ErrorClassifier {
    /// Create a classifier with the default context budget
    pub fn new() -> Self {
        Self::with_max_context_bytes(DEFAULT_MAX_CONTEXT_BYTES)
    }

    /// Create a classifier with a custom context budget
    pub fn with_max_context_bytes(max_context_bytes: usize) -> Self {
        Self { max_context_bytes }
    }

    /// Classify an error and log the outcome
    pub fn classify(&self, err: &AppError, context: ErrorContext) -> ErrorInfo {
        let message = err.to_string();
        let (category, severity, retryable) = categorize(err, &message);

        let info = ErrorInfo {
            category,
            severity,
            code: err.code().to_string(),
            message,
            context: self.limit_context(context),
            retryable,
            suggestions: suggestions_for(category),
        };
        log_classification(&info);
        info
    }

    fn limit_context(&self, context: ErrorContext) -> ErrorContext {
        let serialized = Value::Object(context.clone()).to_string();
        if serialized.len() <= self.max_context_bytes {
            return context;
        }

        let mut cut = self.max_context_bytes;
        while !serialized.is_char_boundary(cut) {
            cut -= 1;
        }

        let mut truncated = Map::new();
        truncated.insert("_truncated".to_string(), Value::Bool(true));
        truncated.insert("_original_size".to_string(), Value::from(serialized.len()));
        truncated.insert(
            "preview".to_string(),
            Value::String(serialized[..cut].to_string()),
        );
        truncated
    }
}

impl Default for ErrorClassifier {
    fn default() -> Self {
        Self::new()
    }
}

fn categorize(err: &AppError, message: &str) -> (ErrorCategory, ErrorSeverity, bool) {
    if matches!(err, AppError::Network(_)) || NETWORK_RE.is_match(message) {
        return (ErrorCategory::Network, ErrorSeverity::Medium, true);
    }
    if matches!(err, AppError::Validation(_)) {
        return (ErrorCategory::Validation, ErrorSeverity::High, false);
    }
    if matches!(err, AppError::Forge(_)) {
        let retryable = FORGE_TRANSIENT_RE.is_match(message);
        return (ErrorCategory::ForgeApi, ErrorSeverity::High, retryable);
    }
    if matches!(err, AppError::FileSystem(_)) || FILE_SYSTEM_RE.is_match(message) {
        return (ErrorCategory::FileSystem, ErrorSeverity::High, false);
    }
    if matches!(err, AppError::Command(_)) || COMMAND_RE.is_match(message) {
        return (ErrorCategory::ExternalCommand, ErrorSeverity::High, false);
    }
    if matches!(err, AppError::Config(_)) || CONFIG_RE.is_match(message) {
        return (ErrorCategory::Configuration, ErrorSeverity::Critical, false);
    }
    (ErrorCategory::Unknown, ErrorSeverity::Medium, false)
}

fn suggestions_for(category: ErrorCategory) -> Vec<String> {
    let suggestions: &[&str] = match category {
        ErrorCategory::Network => &[
            "Check network connectivity to search.devbox.sh",
            "Transient network failures usually clear up on a re-run",
        ],
        ErrorCategory::Validation => &[
            "Check that devbox.json is valid JSON",
            "Ensure 'packages' is a non-empty array of package strings",
        ],
        ErrorCategory::ForgeApi => &[
            "Verify the token has 'contents: write' and 'pull-requests: write' permissions",
            "If the API rate limit was hit, wait before re-running",
        ],
        ErrorCategory::FileSystem => &[
            "Check file permissions in the workspace",
            "Ensure the manifest path points at an existing devbox.json",
        ],
        ErrorCategory::ExternalCommand => &[
            "Make sure the devbox CLI is installed before this step runs",
            "Run 'devbox install' locally to reproduce the failure",
        ],
        ErrorCategory::Configuration => &[
            "Provide the 'token' input, e.g. token: ${{ secrets.GITHUB_TOKEN }}",
            "Check that max-retries is between 0 and 10 and branch-prefix is not empty",
        ],
        ErrorCategory::Unknown => &["Re-run with RUST_LOG=debug for more detail"],
    };
    suggestions.iter().map(|s| s.to_string()).collect()
}

fn log_classification(info: &ErrorInfo) {
    match info.severity {
        ErrorSeverity::Critical | ErrorSeverity::High => error!(
            category = %info.category,
            severity = %info.severity,
            code = %info.code,
            retryable = info.retryable,
            "{}",
            info.message
        ),
        ErrorSeverity::Medium => warn!(
            category = %info.category,
            severity = %info.severity,
            code = %info.code,
            retryable = info.retryable,
            "{}",
            info.message
        ),
        ErrorSeverity::Low => info!(
            category = %info.category,
            code = %info.code,
            retryable = info.retryable,
            "{}",
            info.message
        ),
    }
    for suggestion in &info.suggestions {
        info!("  suggestion: {}", suggestion);
    }
}
