//! Action input parsing for devbox-updater
//!
//! Every input can be passed as a long flag or through the environment
//! variable GitHub Actions sets for it (`INPUT_<NAME>`, name uppercased).

use crate::error::ConfigError;
use crate::forge::DEFAULT_API_URL;
use crate::manifest::MANIFEST_FILENAME;
use crate::pull_request::ConflictStrategy;
use crate::registry::DEVBOX_SEARCH_URL;
use crate::retry::RetryConfig;
use clap::builder::BoolishValueParser;
use clap::{ArgAction, Parser};
use std::path::PathBuf;

/// Largest accepted value of `max-retries`
pub const MAX_RETRIES_LIMIT: u32 = 10;

/// Keep Devbox packages up to date through a single pull request
#[derive(Parser, Debug, Clone)]
#[command(name = "devbox-updater", version, about = "Update Devbox packages and open a pull request")]
pub struct ActionInputs {
    /// GitHub token used for the REST API
    #[arg(long, env = "INPUT_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Devbox CLI version expected on the runner
    #[arg(long, env = "INPUT_DEVBOX-VERSION", default_value = "latest")]
    pub devbox_version: String,

    /// Prefix for update branches
    #[arg(long, env = "INPUT_BRANCH-PREFIX", default_value = "devbox-updates")]
    pub branch_prefix: String,

    /// Heading used in pull request bodies
    #[arg(long, env = "INPUT_PR-TITLE", default_value = "Update Devbox packages")]
    pub pr_title: String,

    /// Retries for transient failures (0-10)
    #[arg(long, env = "INPUT_MAX-RETRIES", default_value_t = 3)]
    pub max_retries: u32,

    /// Also refresh packages pinned to `latest`
    #[arg(long, env = "INPUT_UPDATE-LATEST")]
    pub update_latest: bool,

    /// Path to devbox.json
    #[arg(long, env = "INPUT_MANIFEST-PATH", default_value = MANIFEST_FILENAME)]
    pub manifest_path: PathBuf,

    /// How to treat an already open update PR
    #[arg(long, env = "INPUT_CONFLICT-STRATEGY", value_enum, default_value_t = ConflictStrategy::Merge)]
    pub conflict_strategy: ConflictStrategy,

    /// Keep the existing PR body when merging
    #[arg(
        long,
        env = "INPUT_PRESERVE-EXISTING",
        action = ArgAction::Set,
        default_value_t = true,
        value_parser = BoolishValueParser::new()
    )]
    pub preserve_existing: bool,

    /// Enable debug logging
    #[arg(long, env = "INPUT_VERBOSE")]
    pub verbose: bool,

    /// Repository in owner/name form
    #[arg(long, env = "GITHUB_REPOSITORY")]
    pub repository: Option<String>,

    /// GitHub REST API root
    #[arg(long, env = "GITHUB_API_URL", default_value = DEFAULT_API_URL)]
    pub api_url: String,

    /// Devbox search API root
    #[arg(long, env = "INPUT_REGISTRY-URL", default_value = DEVBOX_SEARCH_URL)]
    pub registry_url: String,
}

/// Inputs that passed validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedInputs {
    pub token: String,
    pub repository: String,
}

impl ActionInputs {
    /// Check the inputs a run cannot start without
    pub fn validate(&self) -> Result<ValidatedInputs, ConfigError> {
        let token = self
            .token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(ConfigError::MissingToken)?;

        if self.max_retries > MAX_RETRIES_LIMIT {
            return Err(ConfigError::InvalidMaxRetries {
                value: self.max_retries,
            });
        }

        if self.branch_prefix.trim().is_empty() {
            return Err(ConfigError::EmptyBranchPrefix);
        }

        let repository = self
            .repository
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .ok_or_else(|| ConfigError::MissingEnvironment {
                name: "GITHUB_REPOSITORY".to_string(),
            })?;
        if !is_repository_slug(repository) {
            return Err(ConfigError::InvalidRepository {
                value: repository.to_string(),
            });
        }

        Ok(ValidatedInputs {
            token: token.to_string(),
            repository: repository.to_string(),
        })
    }

    /// Retry policy for forge calls and the scan
    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig::default().with_max_retries(self.max_retries)
    }

    /// Branch prefix without surrounding whitespace or trailing slashes
    pub fn normalized_branch_prefix(&self) -> String {
        self.branch_prefix.trim().trim_end_matches('/').to_string()
    }
}

fn is_repository_slug(value: &str) -> bool {
    match value.split_once('/') {
        Some((owner, name)) => !owner.is_empty() && !name.is_empty() && !name.contains('/'),
        None => false,
    }
}

/// Configuration error for input values the parser rejected: the first
/// line of clap's message without its `error: ` prefix
pub fn input_error(err: &clap::Error) -> ConfigError {
    let rendered = err.to_string();
    let line = rendered.lines().next().unwrap_or_default();
    ConfigError::InvalidInput {
        message: line.trim_start_matches("error: ").trim().to_string(),
    }
}
