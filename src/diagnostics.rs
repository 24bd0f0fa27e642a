use std::path::Path;

use lsp_types::{Diagnostic, DiagnosticSeverity, NumberOrString, Position, Range};

use crate::config::Settings;
use crate::index::{Index, IndexResolver};
use crate::lint::{self, Issue, Severity};

pub const SOURCE: &str = "mdsite";

fn severity(severity: Severity) -> DiagnosticSeverity {
    match severity {
        Severity::Error => DiagnosticSeverity::ERROR,
        Severity::Warning => DiagnosticSeverity::WARNING,
        Severity::Info => DiagnosticSeverity::INFORMATION,
    }
}

pub fn to_diagnostic(issue: Issue) -> Diagnostic {
    let line = issue.range.line as u32;

    Diagnostic {
        range: Range {
            start: Position {
                line,
                character: issue.range.start as u32,
            },
            end: Position {
                line,
                character: issue.range.end as u32,
            },
        },
        severity: Some(severity(issue.severity)),
        code: Some(NumberOrString::String(issue.code.to_string())),
        source: Some(SOURCE.into()),
        message: issue.message,
        ..Default::default()
    }
}

/// Lint diagnostics for one document, checked against the index. Empty when
/// diagnostics are disabled.
pub fn diagnostics(index: &Index, settings: &Settings, path: &Path, text: &str) -> Vec<Diagnostic> {
    if !settings.diagnostics {
        return Vec::new();
    }

    lint::check(path, text, &IndexResolver(index))
        .into_iter()
        .map(to_diagnostic)
        .collect()
}
