use super::{Completer, Completion, CompletionProducer, Context};

/// Dialect snippets when the cursor is at the start of a section.
pub struct BoilerplateCompleter<'a> {
    producer: &'a dyn CompletionProducer,
}

impl<'a> Completer<'a> for BoilerplateCompleter<'a> {
    fn construct(context: Context<'a>) -> Option<Self> {
        if !context.settings.boilerplate_completions {
            return None;
        }

        let content = context.section.content_span();
        let before_cursor = context
            .document
            .text()
            .get(content.start..context.offset)?;
        if !before_cursor.trim().is_empty() {
            return None;
        }

        let producer = context.section.handler()?.completion_producer()?;
        Some(BoilerplateCompleter { producer })
    }

    fn completions(&self) -> Vec<Completion> {
        self.producer.boilerplate()
    }
}
