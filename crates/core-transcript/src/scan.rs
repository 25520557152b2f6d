use std::io::{BufRead, BufReader};
use std::path::Path;

use core_types::{pricing_for_model, TokenUsage};

use crate::schema::TranscriptLine;
use crate::Result;

/// Lines longer than this are assumed corrupt (a truncated write, a binary
/// blob accidentally appended) and skipped rather than buffered in full.
const MAX_LINE_BYTES: usize = 10 * 1024 * 1024;

/// Usage rolled up across every `assistant` line in a transcript.
#[derive(Debug, Clone, Default)]
pub struct UsageReport {
    pub usage: TokenUsage,
    pub cost: f64,
    pub assistant_lines: u64,
    pub skipped_lines: u64,
}

/// Read `path` line by line and aggregate token usage and cost across every
/// `assistant` entry, pricing each line by its own `model` field. Malformed
/// or oversized lines are counted and skipped rather than failing the scan.
pub fn scan_usage(path: &Path) -> Result<UsageReport> {
    let file = std::fs::File::open(path)?;
    let mut reader = BufReader::new(file);
    let mut report = UsageReport::default();
    let mut line = String::new();

    loop {
        line.clear();
        let read = reader.read_line(&mut line)?;
        if read == 0 {
            break;
        }
        if line.len() > MAX_LINE_BYTES {
            report.skipped_lines += 1;
            continue;
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        match serde_json::from_str::<TranscriptLine>(trimmed) {
            Ok(TranscriptLine::Assistant(assistant)) => {
                let Some(raw) = assistant.message.usage else {
                    continue;
                };
                let usage = TokenUsage {
                    input_tokens: raw.input_tokens,
                    output_tokens: raw.output_tokens,
                    cache_read_tokens: raw.cache_read_input_tokens,
                    cache_creation_tokens: raw.cache_creation_input_tokens,
                };
                let model = assistant.message.model.as_deref().unwrap_or("");
                let pricing = pricing_for_model(model);

                report.usage.input_tokens += usage.input_tokens;
                report.usage.output_tokens += usage.output_tokens;
                report.usage.cache_read_tokens += usage.cache_read_tokens;
                report.usage.cache_creation_tokens += usage.cache_creation_tokens;
                report.cost += pricing.cost(usage);
                report.assistant_lines += 1;
            }
            Ok(_) => {}
            Err(_) => report.skipped_lines += 1,
        }
    }

    Ok(report)
}

/// The text of the first `human` entry in `path`, in file order.
pub fn first_user_message(path: &Path) -> Result<Option<String>> {
    Ok(user_messages(path, Some(1))?.into_iter().next())
}

/// The text of up to `limit` `human` entries in `path`, in file order.
/// `limit = None` returns every human message in the file.
pub fn user_messages(path: &Path, limit: Option<usize>) -> Result<Vec<String>> {
    let file = std::fs::File::open(path)?;
    let mut reader = BufReader::new(file);
    let mut out = Vec::new();
    let mut line = String::new();

    loop {
        if let Some(limit) = limit {
            if out.len() >= limit {
                break;
            }
        }

        line.clear();
        let read = reader.read_line(&mut line)?;
        if read == 0 {
            break;
        }
        if line.len() > MAX_LINE_BYTES {
            continue;
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        if let Ok(TranscriptLine::Human(human)) = serde_json::from_str::<TranscriptLine>(trimmed) {
            out.push(human.message.content.as_text());
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_fixture(lines: &[&str]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        for line in lines {
            writeln!(file, "{line}").unwrap();
        }
        file
    }

    #[test]
    fn aggregates_usage_across_assistant_lines() {
        let file = write_fixture(&[
            r#"{"type":"assistant","message":{"model":"claude-opus-4-20250101","usage":{"input_tokens":100,"output_tokens":50}}}"#,
            r#"{"type":"assistant","message":{"model":"claude-opus-4-20250101","usage":{"input_tokens":10,"output_tokens":5}}}"#,
            "not json at all",
        ]);

        let report = scan_usage(file.path()).unwrap();
        assert_eq!(report.usage.input_tokens, 110);
        assert_eq!(report.usage.output_tokens, 55);
        assert_eq!(report.assistant_lines, 2);
        assert_eq!(report.skipped_lines, 1);
        assert!(report.cost > 0.0);
    }

    #[test]
    fn unknown_model_still_prices_via_fallback() {
        let file = write_fixture(&[
            r#"{"type":"assistant","message":{"model":"some-new-model","usage":{"input_tokens":1000,"output_tokens":0}}}"#,
        ]);
        let report = scan_usage(file.path()).unwrap();
        assert!(report.cost > 0.0);
    }

    #[test]
    fn first_user_message_returns_earliest_human_entry() {
        let file = write_fixture(&[
            r#"{"type":"human","message":{"content":"first question"}}"#,
            r#"{"type":"assistant","message":{}}"#,
            r#"{"type":"human","message":{"content":"second question"}}"#,
        ]);

        let first = first_user_message(file.path()).unwrap();
        assert_eq!(first, Some("first question".to_string()));

        let all = user_messages(file.path(), None).unwrap();
        assert_eq!(all, vec!["first question", "second question"]);
    }
}
