//! GitHub Actions output file and workflow commands

use super::ActionOutputs;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::Path;

/// Render outputs in the multi-line `name<<delimiter` format
pub fn render_outputs(outputs: &ActionOutputs, delimiter: &str) -> String {
    outputs
        .entries()
        .into_iter()
        .map(|(name, value)| format!("{}<<{}\n{}\n{}\n", name, delimiter, value, delimiter))
        .collect()
}

fn delimiter_for(outputs: &ActionOutputs) -> String {
    let values: Vec<String> = outputs.entries().into_iter().map(|(_, v)| v).collect();
    loop {
        let delimiter = format!("ghadelimiter_{:016x}", fastrand::u64(..));
        if values.iter().all(|v| !v.contains(&delimiter)) {
            return delimiter;
        }
    }
}

/// Append outputs to the file named by `GITHUB_OUTPUT`, or to `fallback`
/// when the variable is not set
pub fn write_outputs(
    outputs: &ActionOutputs,
    output_file: Option<&Path>,
    fallback: &mut dyn Write,
) -> io::Result<()> {
    let rendered = render_outputs(outputs, &delimiter_for(outputs));
    match output_file {
        Some(path) => {
            let mut file = OpenOptions::new().create(true).append(true).open(path)?;
            file.write_all(rendered.as_bytes())
        }
        None => fallback.write_all(rendered.as_bytes()),
    }
}

/// Escape a value for use in a workflow command
pub fn escape_command_value(value: &str) -> String {
    value
        .replace('%', "%25")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}

/// `::error::` workflow command annotating the run
pub fn error_command(message: &str) -> String {
    format!("::error::{}", escape_command_value(message))
}
