//! Application error types using thiserror
//!
//! Error hierarchy:
//! - NetworkError: Transport failures talking to the package registry
//! - ValidationError: Bad input data (versions, manifest, registry payloads)
//! - ForgeError: Failures from the GitHub REST API
//! - FileSystemError: Manifest, lock and backup file operations
//! - CommandError: External commands (devbox, git)
//! - ConfigError: Invalid action inputs

use std::path::PathBuf;
use thiserror::Error;

/// Application-level error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Registry transport errors
    #[error(transparent)]
    Network(#[from] NetworkError),

    /// Input and payload validation errors
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// GitHub API errors
    #[error(transparent)]
    Forge(#[from] ForgeError),

    /// File system errors
    #[error(transparent)]
    FileSystem(#[from] FileSystemError),

    /// External command errors
    #[error(transparent)]
    Command(#[from] CommandError),

    /// Configuration errors
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Anything that did not originate from a typed failure
    #[error("{0}")]
    Unexpected(String),
}

/// Errors related to registry transport
#[derive(Error, Debug)]
pub enum NetworkError {
    /// The request could not be sent or the connection broke
    #[error("network error while requesting {url}: {message}")]
    Request { url: String, message: String },

    /// The request did not complete within the configured timeout
    #[error("request to {url} timed out (ETIMEDOUT)")]
    Timeout { url: String },

    /// The registry answered with an unexpected status code
    #[error("registry responded with HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    /// The HTTP client itself could not be built
    #[error("failed to create HTTP client: {message}")]
    Client { message: String },
}

/// Errors related to invalid data
#[derive(Error, Debug)]
pub enum ValidationError {
    /// Version string was empty or whitespace only
    #[error("version string must not be empty")]
    EmptyVersion,

    /// No versions were supplied where at least one is required
    #[error("cannot determine the latest version of an empty list")]
    EmptyVersionList,

    /// Manifest file does not exist
    #[error("manifest file not found: {path}")]
    ManifestNotFound { path: PathBuf },

    /// Manifest file is not valid JSON
    #[error("failed to parse JSON in {path}: {message}")]
    InvalidJson { path: PathBuf, message: String },

    /// Manifest JSON does not match the expected schema
    #[error("invalid manifest {path}: {}", problems.join("; "))]
    InvalidManifest { path: PathBuf, problems: Vec<String> },

    /// Registry response did not carry a version
    #[error("registry response for '{package}' is missing a version field")]
    MissingVersionField { package: String },

    /// Registry does not know the package
    #[error("package '{package}' not found in the Devbox registry")]
    PackageNotFound { package: String },

    /// Nothing in the candidate list can be applied
    #[error("no valid updates to apply ({skipped} candidate(s) skipped)")]
    NoValidUpdates { skipped: usize },

    /// Regenerated lock file is not well-formed
    #[error("regenerated lock file {path} is not valid JSON: {message}")]
    InvalidLockFile { path: PathBuf, message: String },
}

/// Errors returned by the GitHub REST API
#[derive(Error, Debug)]
pub enum ForgeError {
    /// Generic API failure
    #[error("GitHub API error during {operation}: {message}")]
    Api {
        operation: String,
        status: Option<u16>,
        message: String,
    },

    /// A git reference with this name already exists
    #[error("GitHub API error: reference '{reference}' already exists")]
    AlreadyExists { reference: String },

    /// The conflict strategy forbids touching an existing pull request
    #[error("GitHub API error: pull request #{number} already exists and conflict strategy is 'fail'")]
    Conflict { number: u64 },
}

/// Errors related to file system operations
#[derive(Error, Debug)]
pub enum FileSystemError {
    /// Failed to read a file
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to write a file
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to snapshot the manifest before mutation
    #[error("failed to back up {path} to {backup}: {source}")]
    Backup {
        path: PathBuf,
        backup: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to restore the manifest from its snapshot
    #[error("failed to restore {path} from {backup}: {source}")]
    Restore {
        path: PathBuf,
        backup: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to delete a file
    #[error("failed to remove {path}: {source}")]
    Remove {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors related to external commands
#[derive(Error, Debug)]
pub enum CommandError {
    /// Binary is not installed
    #[error("{program} command not found")]
    NotFound { program: String },

    /// Binary could not be spawned for another reason
    #[error("{program} command failed to start: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// Command exited with a non-zero status
    #[error("{program} command failed with exit code {code:?}: {stderr}")]
    Failed {
        program: String,
        code: Option<i32>,
        stderr: String,
    },

    /// Command did not finish in time
    #[error("{program} command failed: timed out after {seconds}s")]
    Timeout { program: String, seconds: u64 },

    /// Lock regeneration finished but produced no lock file
    #[error("lock regeneration failed: {path} was not created")]
    LockNotGenerated { path: PathBuf },
}

/// Errors related to configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    /// GitHub token not supplied
    #[error("missing GitHub token: set the 'token' input")]
    MissingToken,

    /// max-retries outside the accepted range
    #[error("invalid configuration: max-retries must be between 0 and 10 (got {value})")]
    InvalidMaxRetries { value: u32 },

    /// Branch prefix is blank
    #[error("invalid configuration: branch-prefix must not be empty")]
    EmptyBranchPrefix,

    /// Repository slug is not owner/name
    #[error("invalid configuration: repository '{value}' must be in 'owner/name' form")]
    InvalidRepository { value: String },

    /// Required environment variable absent
    #[error("required environment variable {name} is not set")]
    MissingEnvironment { name: String },

    /// An input value the argument parser rejected
    #[error("invalid configuration: {message}")]
    InvalidInput { message: String },
}

impl AppError {
    /// Stable machine-readable code for this error
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Network(e) => match e {
                NetworkError::Request { .. } => "NETWORK_REQUEST_FAILED",
                NetworkError::Timeout { .. } => "NETWORK_TIMEOUT",
                NetworkError::Status { .. } => "NETWORK_BAD_STATUS",
                NetworkError::Client { .. } => "NETWORK_CLIENT_ERROR",
            },
            AppError::Validation(e) => match e {
                ValidationError::EmptyVersion => "VALIDATION_EMPTY_VERSION",
                ValidationError::EmptyVersionList => "VALIDATION_EMPTY_VERSION_LIST",
                ValidationError::ManifestNotFound { .. } => "VALIDATION_MANIFEST_NOT_FOUND",
                ValidationError::InvalidJson { .. } => "VALIDATION_INVALID_JSON",
                ValidationError::InvalidManifest { .. } => "VALIDATION_INVALID_MANIFEST",
                ValidationError::MissingVersionField { .. } => "VALIDATION_MISSING_VERSION",
                ValidationError::PackageNotFound { .. } => "VALIDATION_PACKAGE_NOT_FOUND",
                ValidationError::NoValidUpdates { .. } => "VALIDATION_NO_VALID_UPDATES",
                ValidationError::InvalidLockFile { .. } => "VALIDATION_INVALID_LOCK_FILE",
            },
            AppError::Forge(e) => match e {
                ForgeError::Api { .. } => "FORGE_API_ERROR",
                ForgeError::AlreadyExists { .. } => "FORGE_REFERENCE_EXISTS",
                ForgeError::Conflict { .. } => "FORGE_PR_CONFLICT",
            },
            AppError::FileSystem(_) => "FILE_SYSTEM_ERROR",
            AppError::Command(_) => "EXTERNAL_COMMAND_ERROR",
            AppError::Config(_) => "CONFIGURATION_ERROR",
            AppError::Unexpected(_) => "UNKNOWN_ERROR",
        }
    }
}

impl NetworkError {
    /// Creates a new Request error
    pub fn request(url: impl Into<String>, message: impl Into<String>) -> Self {
        NetworkError::Request {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Creates a new Timeout error
    pub fn timeout(url: impl Into<String>) -> Self {
        NetworkError::Timeout { url: url.into() }
    }
}

impl ValidationError {
    /// Creates a new InvalidManifest error
    pub fn invalid_manifest(path: impl Into<PathBuf>, problems: Vec<String>) -> Self {
        ValidationError::InvalidManifest {
            path: path.into(),
            problems,
        }
    }

    /// Creates a new InvalidJson error
    pub fn invalid_json(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        ValidationError::InvalidJson {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl ForgeError {
    /// Creates a new Api error
    pub fn api(operation: impl Into<String>, status: Option<u16>, message: impl Into<String>) -> Self {
        ForgeError::Api {
            operation: operation.into(),
            status,
            message: message.into(),
        }
    }

    /// HTTP status attached to the failure, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            ForgeError::Api { status, .. } => *status,
            ForgeError::AlreadyExists { .. } => Some(422),
            ForgeError::Conflict { .. } => None,
        }
    }
}

impl FileSystemError {
    /// Creates a new Read error
    pub fn read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        FileSystemError::Read {
            path: path.into(),
            source,
        }
    }

    /// Creates a new Write error
    pub fn write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        FileSystemError::Write {
            path: path.into(),
            source,
        }
    }
}

impl CommandError {
    /// Creates a spawn failure, mapping a missing binary to NotFound
    pub fn from_spawn(program: impl Into<String>, source: std::io::Error) -> Self {
        let program = program.into();
        if source.kind() == std::io::ErrorKind::NotFound {
            CommandError::NotFound { program }
        } else {
            CommandError::Spawn { program, source }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_invalid_manifest() {
        let err = ValidationError::invalid_manifest(
            "/repo/devbox.json",
            vec![
                "'packages' must be an array".to_string(),
                "'shell' must be an object".to_string(),
            ],
        );
        let msg = err.to_string();
        assert!(msg.contains("invalid manifest"));
        assert!(msg.contains("'packages' must be an array; 'shell' must be an object"));
    }

    #[test]
    fn test_network_error_timeout_mentions_etimedout() {
        let err = NetworkError::timeout("https://search.devbox.sh/v2/resolve");
        assert!(err.to_string().contains("ETIMEDOUT"));
    }

    #[test]
    fn test_forge_error_status() {
        assert_eq!(ForgeError::api("list pulls", Some(502), "server error").status(), Some(502));
        assert_eq!(
            ForgeError::AlreadyExists {
                reference: "devbox/x".to_string()
            }
            .status(),
            Some(422)
        );
        assert_eq!(ForgeError::Conflict { number: 3 }.status(), None);
    }

    #[test]
    fn test_command_error_from_spawn_not_found() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err = CommandError::from_spawn("devbox", io);
        assert!(matches!(err, CommandError::NotFound { .. }));
        assert_eq!(err.to_string(), "devbox command not found");
    }

    #[test]
    fn test_command_error_from_spawn_other() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = CommandError::from_spawn("git", io);
        assert!(matches!(err, CommandError::Spawn { .. }));
    }

    #[test]
    fn test_config_error_messages() {
        assert!(ConfigError::MissingToken.to_string().contains("missing GitHub token"));
        assert!(ConfigError::InvalidMaxRetries { value: 11 }
            .to_string()
            .contains("invalid configuration"));
        assert!(ConfigError::MissingEnvironment {
            name: "GITHUB_REPOSITORY".to_string()
        }
        .to_string()
        .contains("environment variable"));
    }

    #[test]
    fn test_app_error_codes() {
        let err: AppError = NetworkError::timeout("u").into();
        assert_eq!(err.code(), "NETWORK_TIMEOUT");

        let err: AppError = ValidationError::NoValidUpdates { skipped: 2 }.into();
        assert_eq!(err.code(), "VALIDATION_NO_VALID_UPDATES");

        let err: AppError = ConfigError::EmptyBranchPrefix.into();
        assert_eq!(err.code(), "CONFIGURATION_ERROR");

        let err = AppError::Unexpected("boom".to_string());
        assert_eq!(err.code(), "UNKNOWN_ERROR");
    }

    #[test]
    fn test_app_error_transparent_display() {
        let err: AppError = ValidationError::PackageNotFound {
            package: "nodejs".to_string(),
        }
        .into();
        assert_eq!(
            err.to_string(),
            "package 'nodejs' not found in the Devbox registry"
        );
    }

    #[test]
    fn test_error_debug_trait() {
        let err = ValidationError::EmptyVersion;
        let debug = format!("{:?}", err);
        assert!(debug.contains("EmptyVersion"));
    }
}
