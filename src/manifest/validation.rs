//! Schema validation for devbox.json
//!
//! Checks:
//! - root is an object
//! - `packages` is a non-empty array of non-empty strings
//! - `shell`, when present, has a string-array `init_hook` and a `scripts`
//!   object whose values are strings or string arrays
//! - `nixpkgs`, when present, is an object with a string `commit`

use serde_json::Value;

/// Validate a parsed manifest document.
///
/// Returns every problem found; an empty list means the document is valid.
pub fn validate_manifest(document: &Value) -> Vec<String> {
    let mut problems = Vec::new();

    let Some(root) = document.as_object() else {
        problems.push("manifest root must be a JSON object".to_string());
        return problems;
    };

    match root.get("packages") {
        None => problems.push("'packages' is required".to_string()),
        Some(Value::Array(packages)) => {
            if packages.is_empty() {
                problems.push("'packages' must not be empty".to_string());
            }
            for (index, entry) in packages.iter().enumerate() {
                match entry {
                    Value::String(s) if s.trim().is_empty() => {
                        problems.push(format!("packages[{}] must not be empty", index))
                    }
                    Value::String(_) => {}
                    _ => problems.push(format!("packages[{}] must be a string", index)),
                }
            }
        }
        Some(_) => problems.push("'packages' must be an array".to_string()),
    }

    if let Some(shell) = root.get("shell") {
        validate_shell(shell, &mut problems);
    }

    if let Some(nixpkgs) = root.get("nixpkgs") {
        match nixpkgs.as_object() {
            None => problems.push("'nixpkgs' must be an object".to_string()),
            Some(nixpkgs) => {
                if !matches!(nixpkgs.get("commit"), Some(Value::String(_))) {
                    problems.push("'nixpkgs.commit' must be a string".to_string());
                }
            }
        }
    }

    problems
}

fn validate_shell(shell: &Value, problems: &mut Vec<String>) {
    let Some(shell) = shell.as_object() else {
        problems.push("'shell' must be an object".to_string());
        return;
    };

    if let Some(init_hook) = shell.get("init_hook") {
        if !is_string_array(init_hook) {
            problems.push("'shell.init_hook' must be an array of strings".to_string());
        }
    }

    if let Some(scripts) = shell.get("scripts") {
        match scripts.as_object() {
            None => problems.push("'shell.scripts' must be an object".to_string()),
            Some(scripts) => {
                for (name, script) in scripts {
                    if !script.is_string() && !is_string_array(script) {
                        problems.push(format!(
                            "'shell.scripts.{}' must be a string or an array of strings",
                            name
                        ));
                    }
                }
            }
        }
    }
}

fn is_string_array(value: &Value) -> bool {
    value
        .as_array()
        .map(|items| items.iter().all(Value::is_string))
        .unwrap_or(false)
}
