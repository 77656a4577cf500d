use super::diagnostic::Diagnostic;
use std::fs;
use std::path::Path;

fn header(diag: &Diagnostic) -> String {
    format!(
        "{}:{}:{}: {}: {}",
        diag.location.file.display(),
        diag.location.line,
        diag.location.column,
        diag.level.as_str(),
        diag.message
    )
}

/// Format diagnostics one per line
///
/// Example output:
/// ```text
/// lifetimes.deriv:4:1: error: unknown variable `K`
/// ```
pub fn format_diagnostics(diagnostics: &[Diagnostic]) -> String {
    diagnostics
        .iter()
        .map(header)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Format diagnostics with code snippet
///
/// Example output:
/// ```text
/// lifetimes.deriv:4:13: error: expected a term, found end of line
///    relate I <=
///                ^
/// ```
pub fn format_diagnostics_with_source(diagnostics: &[Diagnostic], source_code: &str) -> String {
    let lines: Vec<&str> = source_code.lines().collect();

    diagnostics
        .iter()
        .map(|diag| {
            let mut output = header(diag);

            // Add code snippet
            if diag.location.line > 0 && diag.location.line <= lines.len() {
                let source_line = lines[diag.location.line - 1];

                output.push('\n');
                output.push_str("   ");
                output.push_str(source_line);
                output.push('\n');

                let column = diag.location.column.saturating_sub(1);
                let width = diag.location.length.unwrap_or(1).max(1);
                output.push_str("   ");
                output.push_str(&" ".repeat(column));
                output.push_str(&"^".repeat(width));
            }

            output
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Read source file and format diagnostics with code snippet
pub fn format_diagnostics_with_file(diagnostics: &[Diagnostic], file_path: &Path) -> String {
    match fs::read_to_string(file_path) {
        Ok(source) => format_diagnostics_with_source(diagnostics, &source),
        Err(_) => format_diagnostics(diagnostics), // Fallback to simple format
    }
}

/// Format diagnostics with their codes
pub fn format_diagnostics_detailed(diagnostics: &[Diagnostic]) -> String {
    diagnostics
        .iter()
        .map(|diag| {
            let mut output = header(diag);
            if let Some(code) = &diag.code {
                output.push_str(&format!(" [{}]", code));
            }
            output
        })
        .collect::<Vec<_>>()
        .join("\n")
}
