use once_cell::sync::Lazy;
use regex::Regex;

use super::{Completer, Completion, CompletionKind, Context};

/// Dialect names after `###` at the start of a line.
pub struct MarkerCompleter<'a> {
    partial: &'a str,
    context: Context<'a>,
}

impl<'a> Completer<'a> for MarkerCompleter<'a> {
    fn construct(context: Context<'a>) -> Option<Self> {
        static PARTIAL_MARKER: Lazy<Regex> =
            Lazy::new(|| Regex::new(r"^###(?<partial>[A-Za-z0-9_]*)$").unwrap());

        let captures = PARTIAL_MARKER.captures(context.line_prefix)?;

        Some(MarkerCompleter {
            partial: captures.name("partial")?.as_str(),
            context,
        })
    }

    fn completions(&self) -> Vec<Completion> {
        self.context
            .snapshot
            .extensions()
            .dialects
            .names()
            .filter(|name| name.starts_with(self.partial))
            .map(|name| Completion {
                label: name.to_string(),
                insert_text: name.to_string(),
                kind: CompletionKind::Dialect,
                detail: Some("dialect section".to_string()),
            })
            .collect()
    }
}
