use serde::Deserialize;

use crate::error::Diagnostic;

#[derive(Deserialize)]
struct RustcMessage {
    #[serde(rename = "$message_type")]
    message_type: Option<String>,
    message: String,
    level: String,
    #[serde(default)]
    spans: Vec<RustcSpan>,
}

#[derive(Deserialize)]
struct RustcSpan {
    file_name: String,
    line_start: usize,
    column_start: usize,
    is_primary: bool,
}

/// Error-level diagnostics from rustc's `--error-format=json` output.
pub(super) fn from_rustc(stderr: &str) -> Vec<Diagnostic> {
    stderr
        .lines()
        .filter_map(|line| serde_json::from_str::<RustcMessage>(line).ok())
        .filter(|m| m.message_type.as_deref().map_or(true, |t| t == "diagnostic"))
        .filter(|m| m.level.starts_with("error"))
        .filter(|m| !(m.spans.is_empty() && m.message.starts_with("aborting due to")))
        .map(|m| {
            let span = m.spans.iter().find(|s| s.is_primary).or(m.spans.first());
            Diagnostic {
                file: span.map(|s| s.file_name.clone()).unwrap_or_default(),
                line: span.map_or(0, |s| s.line_start),
                column: span.map_or(0, |s| s.column_start),
                message: m.message,
            }
        })
        .collect()
}

/// Diagnostics for a unit that does not even parse.
pub(super) fn from_syn(error: &syn::Error, file: &str) -> Vec<Diagnostic> {
    error
        .into_iter()
        .map(|e| {
            let start = e.span().start();
            Diagnostic {
                file: file.to_string(),
                line: start.line,
                column: start.column + 1,
                message: e.to_string(),
            }
        })
        .collect()
}
