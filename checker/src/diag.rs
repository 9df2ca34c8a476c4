// diag.rs — Legality-failure diagnostics.
//
// A failed check surfaces as a single `LegalityError` naming the
// user-facing scheduling directive that requested the rewrite, a
// one-line message, the source spans involved, and any pretty-printed
// diagnostic blobs (effect traces, commutativity conditions) indented
// under the message. The error serializes to JSON for tooling.
//
// Preconditions: the directive name is the snake_case identifier of the
//   public scheduling operation, passed down explicitly by the caller.
// Postconditions: building an error performs no I/O.
// Failure modes: none.
// Side effects: none.

use std::fmt;

use serde::Serialize;

use crate::ir::{span_str, Span};

#[derive(Debug, Clone, Serialize)]
pub struct LegalityError {
    pub directive: String,
    pub message: String,
    spans: Vec<(String, String)>,
    details: Vec<(String, String)>,
}

impl LegalityError {
    pub fn new(directive: &str, message: impl Into<String>) -> LegalityError {
        LegalityError {
            directive: directive.to_string(),
            message: message.into(),
            spans: Vec::new(),
            details: Vec::new(),
        }
    }

    pub fn with_span(mut self, label: &str, span: Span) -> LegalityError {
        self.spans.push((label.to_string(), span_str(span)));
        self
    }

    /// Attach a pretty-printed diagnostic blob, indented under the
    /// message when displayed.
    pub fn with_detail(mut self, label: &str, blob: impl fmt::Display) -> LegalityError {
        self.details.push((label.to_string(), blob.to_string()));
        self
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

impl fmt::Display for LegalityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", title_case(&self.directive), self.message)?;
        for (label, span) in &self.spans {
            write!(f, "\n  at {label}: {span}")?;
        }
        for (label, blob) in &self.details {
            write!(f, "\n  {label}:")?;
            for line in blob.lines() {
                write!(f, "\n    {line}")?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for LegalityError {}

/// `reorder_stmts` becomes `Reorder Stmts`.
fn title_case(s: &str) -> String {
    s.split('_')
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut cs = w.chars();
            match cs.next() {
                Some(first) => first.to_uppercase().chain(cs).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
