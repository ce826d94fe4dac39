use super::{util, Completer, Completion, Context};

/// Keywords of the section's dialect starting with the word before the
/// cursor. Case-sensitive; in the order the dialect declares them.
pub struct KeywordCompleter<'a> {
    keywords: &'static [&'static str],
    prefix: &'a str,
}

impl<'a> Completer<'a> for KeywordCompleter<'a> {
    fn construct(context: Context<'a>) -> Option<Self> {
        let handler = context.section.handler()?;
        let (_, prefix) = util::split_word(context.line_prefix, util::is_identifier_char);

        Some(KeywordCompleter {
            keywords: handler.keywords(),
            prefix,
        })
    }

    fn completions(&self) -> Vec<Completion> {
        self.keywords
            .iter()
            .filter(|keyword| keyword.starts_with(self.prefix))
            .map(|keyword| Completion::keyword(keyword))
            .collect()
    }
}
