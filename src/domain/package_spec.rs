//! Devbox package specifications (`name[@version]`)

use serde::{Deserialize, Serialize};
use std::fmt;

/// A manifest package entry split into name and optional version
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedPackage {
    /// Package name, including any namespace (e.g., `github:owner/repo`)
    pub name: String,
    /// Pinned version, if any
    pub version: Option<String>,
    /// The entry exactly as it appears in the manifest
    pub full_spec: String,
}

impl ParsedPackage {
    /// Returns true if the entry pins the `latest` sentinel
    pub fn is_latest(&self) -> bool {
        self.version.as_deref() == Some(crate::domain::LATEST_VERSION)
    }
}

impl fmt::Display for ParsedPackage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.full_spec)
    }
}

/// Split a package spec on its last `@`.
///
/// An `@` at index 0 belongs to the name. Namespaced names (`a/b@1.0`) need no
/// special handling: everything before the split point is the name.
pub fn parse_spec(spec: &str) -> ParsedPackage {
    let (name, version) = match spec.rfind('@') {
        Some(idx) if idx > 0 => (&spec[..idx], Some(spec[idx + 1..].to_string())),
        _ => (spec, None),
    };

    ParsedPackage {
        name: name.to_string(),
        version,
        full_spec: spec.to_string(),
    }
}

/// Build a package spec, omitting `@version` when there is no version
pub fn build_spec(name: &str, version: Option<&str>) -> String {
    match version {
        Some(v) => format!("{}@{}", name, v),
        None => name.to_string(),
    }
}
