//! Splitting a document into dialect sections.
//!
//! A marker is a whole line `###<Dialect>`, optionally followed by spaces or
//! tabs. Every marker starts a section that runs up to the next marker line or
//! the end of the text. Text before the first marker is part of the first
//! section's span but not of its content. A text without markers is one
//! section of the default dialect.

use std::ops::Range;

use once_cell::sync::Lazy;
use regex::Regex;

static MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^###([A-Za-z][A-Za-z0-9_]*)[ \t]*$").unwrap());

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionSpan {
    pub dialect: String,
    /// Whole section, header included. Spans of one text are contiguous and
    /// together cover it.
    pub span: Range<usize>,
    /// The marker line without its line break.
    pub header: Option<Range<usize>>,
    /// What the handler parses.
    pub content: Range<usize>,
}

pub fn partition(text: &str, default_dialect: &str) -> Vec<SectionSpan> {
    let mut sections: Vec<SectionSpan> = Vec::new();

    for line in lines(text) {
        let Some(captures) = MARKER.captures(&text[line.text.clone()]) else {
            continue;
        };

        let start = match sections.last_mut() {
            Some(previous) => {
                previous.span.end = line.text.start;
                previous.content.end = line.text.start;
                line.text.start
            }
            None => 0,
        };

        sections.push(SectionSpan {
            dialect: captures[1].to_string(),
            span: start..text.len(),
            header: Some(line.text.clone()),
            content: line.next..text.len(),
        });
    }

    if sections.is_empty() {
        sections.push(SectionSpan {
            dialect: default_dialect.to_string(),
            span: 0..text.len(),
            header: None,
            content: 0..text.len(),
        });
    }

    sections
}

/// Text before the first marker, when there is one.
pub fn preamble<'a>(text: &'a str, sections: &[SectionSpan]) -> Option<(Range<usize>, &'a str)> {
    let header = sections.first()?.header.as_ref()?;
    let range = 0..header.start;
    (!range.is_empty()).then(|| (range.clone(), &text[range]))
}

struct Line {
    /// Without the line break.
    text: Range<usize>,
    /// Start of the following line.
    next: usize,
}

/// Lines of `text`, splitting on `\n`, `\r\n` and a lone `\r`.
fn lines(text: &str) -> impl Iterator<Item = Line> + '_ {
    let bytes = text.as_bytes();
    let mut start = 0;
    let mut done = false;

    std::iter::from_fn(move || {
        if done {
            return None;
        }

        let mut i = start;
        while i < bytes.len() && bytes[i] != b'\n' && bytes[i] != b'\r' {
            i += 1;
        }

        let next = match bytes.get(i) {
            Some(b'\r') if bytes.get(i + 1) == Some(&b'\n') => i + 2,
            Some(_) => i + 1,
            None => {
                done = true;
                i
            }
        };

        let line = Line {
            text: start..i,
            next,
        };
        start = next;
        Some(line)
    })
}
