use itertools::Itertools;

use super::{util, Completer, Completion, CompletionKind, Context};
use crate::element::ElementKind;

/// Paths of declared elements where the dialect expects a pointer.
pub struct PathCompleter<'a> {
    kinds: &'static [ElementKind],
    partial: &'a str,
    context: Context<'a>,
}

impl<'a> Completer<'a> for PathCompleter<'a> {
    fn construct(context: Context<'a>) -> Option<Self> {
        let producer = context.section.handler()?.completion_producer()?;
        let (before, partial) = util::split_word(context.line_prefix, util::is_path_char);
        let kinds = producer.path_trigger(before)?;

        Some(PathCompleter {
            kinds,
            partial,
            context,
        })
    }

    fn completions(&self) -> Vec<Completion> {
        self.context
            .snapshot
            .declarations_of(self.kinds)
            .filter(|(_, path, _)| path.starts_with(self.partial))
            .map(|(kind, path, declaration)| Completion {
                label: path.to_string(),
                insert_text: path.to_string(),
                kind: CompletionKind::Element(kind),
                detail: Some(format!(
                    "{} in {}",
                    declaration.classifier, declaration.location.document
                )),
            })
            .sorted_by(|a, b| a.label.cmp(&b.label))
            .collect()
    }
}

