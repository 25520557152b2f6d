use owo_colors::OwoColorize;
use serde::Serialize;

use crate::args::OutputFormat;
use crate::error::Error;

/// Render a successful result in the requested format. JSON mode always
/// emits a single object; plain mode uses the caller-supplied human text.
pub fn emit_success<T: Serialize>(format: OutputFormat, value: &T, plain: impl FnOnce() -> String) {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string()));
        }
        OutputFormat::Plain => {
            println!("{}", plain());
        }
    }
}

/// Print `Error: <kind>: <message>` (or the §7 JSON error envelope) and
/// return the process exit code for this error kind.
pub fn emit_error(format: OutputFormat, err: &Error) -> i32 {
    match format {
        OutputFormat::Json => {
            let body = serde_json::json!({ "error": err.as_json_fields() });
            eprintln!("{}", serde_json::to_string_pretty(&body).unwrap_or_else(|_| "{}".to_string()));
        }
        OutputFormat::Plain => {
            eprintln!("{}: {}", "Error".red().bold(), err);
        }
    }
    err.exit_code()
}
