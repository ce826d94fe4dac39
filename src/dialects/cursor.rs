use std::ops::Range;

use logos::Logos;

use super::lexer::Token;
use crate::{
    diagnostics::RawDiagnostic,
    element::ElementPointer,
    extension::SectionSource,
};

/// Recursive-descent helper over the tokens of a section (or of a slice of
/// it). Spans are section-relative, whatever slice the cursor was built on.
pub struct TokenCursor<'a> {
    text: &'a str,
    base: usize,
    tokens: Vec<(Token, Range<usize>)>,
    index: usize,
}

impl<'a> TokenCursor<'a> {
    pub fn new(text: &'a str) -> TokenCursor<'a> {
        TokenCursor::with_base(text, 0)
    }

    /// `text` starts at byte `base` of the section.
    pub fn with_base(text: &'a str, base: usize) -> TokenCursor<'a> {
        let tokens = Token::lexer(text)
            .spanned()
            .map(|(token, span)| {
                (
                    token.unwrap_or(Token::Unknown),
                    base + span.start..base + span.end,
                )
            })
            .collect();

        TokenCursor {
            text,
            base,
            tokens,
            index: 0,
        }
    }

    pub fn is_at_end(&self) -> bool {
        self.index >= self.tokens.len()
    }

    pub fn peek(&self) -> Option<Token> {
        self.peek_nth(0)
    }

    pub fn peek_nth(&self, n: usize) -> Option<Token> {
        self.tokens.get(self.index + n).map(|(token, _)| *token)
    }

    pub fn peek_text(&self) -> Option<&'a str> {
        let (_, span) = self.tokens.get(self.index)?;
        Some(self.text(span))
    }

    pub fn at(&self, token: Token) -> bool {
        self.peek() == Some(token)
    }

    pub fn at_keyword(&self, keyword: &str) -> bool {
        self.at(Token::Path) && self.peek_text() == Some(keyword)
    }

    pub fn at_any_keyword(&self, keywords: &[&str]) -> bool {
        self.at(Token::Path) && self.peek_text().is_some_and(|text| keywords.contains(&text))
    }

    pub fn bump(&mut self) -> Option<(Token, Range<usize>)> {
        let token = self.tokens.get(self.index).cloned();
        if token.is_some() {
            self.index += 1;
        }
        token
    }

    pub fn eat(&mut self, token: Token) -> Option<Range<usize>> {
        if !self.at(token) {
            return None;
        }
        self.bump().map(|(_, span)| span)
    }

    pub fn eat_keyword(&mut self, keyword: &str) -> Option<Range<usize>> {
        if !self.at_keyword(keyword) {
            return None;
        }
        self.bump().map(|(_, span)| span)
    }

    pub fn expect(&mut self, token: Token) -> Result<Range<usize>, RawDiagnostic> {
        self.eat(token)
            .ok_or_else(|| self.unexpected(token.describe()))
    }

    pub fn expect_keyword(&mut self, keyword: &str) -> Result<Range<usize>, RawDiagnostic> {
        self.eat_keyword(keyword)
            .ok_or_else(|| self.unexpected(&format!("'{keyword}'")))
    }

    /// A name or path, returned with its span.
    pub fn expect_path(&mut self, expected: &str) -> Result<(&'a str, Range<usize>), RawDiagnostic> {
        let span = self
            .eat(Token::Path)
            .ok_or_else(|| self.unexpected(expected))?;
        Ok((self.text(&span), span))
    }

    pub fn expect_pointer(
        &mut self,
        source: &SectionSource<'_>,
        expected: &str,
    ) -> Result<ElementPointer, RawDiagnostic> {
        let (path, span) = self.expect_path(expected)?;
        Ok(ElementPointer {
            path: path.to_string(),
            location: source.location(span),
        })
    }

    /// A `'quoted'` string without its quotes.
    pub fn expect_string(&mut self) -> Result<&'a str, RawDiagnostic> {
        let span = self
            .eat(Token::String)
            .ok_or_else(|| self.unexpected("a string"))?;
        let quoted = self.text(&span);
        Ok(&quoted[1..quoted.len() - 1])
    }

    /// Text of a section-relative span produced by this cursor.
    pub fn text(&self, span: &Range<usize>) -> &'a str {
        &self.text[span.start - self.base..span.end - self.base]
    }

    /// Section-relative offset just past the last consumed token.
    pub fn previous_end(&self) -> usize {
        self.index
            .checked_sub(1)
            .and_then(|i| self.tokens.get(i))
            .map(|(_, span)| span.end)
            .unwrap_or(self.base)
    }

    pub fn end(&self) -> usize {
        self.base + self.text.len()
    }

    /// An error on the current token, or at the end of the text.
    pub fn unexpected(&self, expected: &str) -> RawDiagnostic {
        match self.tokens.get(self.index) {
            Some((_, span)) => RawDiagnostic::parser_error(
                span.clone(),
                format!("Unexpected '{}', expected {expected}", self.text(span)),
            ),
            None => RawDiagnostic::parser_error(
                self.end()..self.end(),
                format!("Unexpected end of section, expected {expected}"),
            ),
        }
    }

    /// Skips at least one token, then up to the next of `keywords`.
    pub fn recover(&mut self, keywords: &[&str]) {
        self.bump();
        while !self.is_at_end() && !self.at_any_keyword(keywords) {
            self.bump();
        }
    }

    /// Consumes everything up to and including the `close` that balances an
    /// already consumed `open`.
    pub fn skip_balanced(&mut self, open: Token, close: Token) -> Result<Range<usize>, RawDiagnostic> {
        let mut depth = 1;
        while let Some((token, span)) = self.bump() {
            if token == open {
                depth += 1;
            } else if token == close {
                depth -= 1;
                if depth == 0 {
                    return Ok(span);
                }
            }
        }
        Err(self.unexpected(close.describe()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spans_are_shifted_by_base() {
        let mut cursor = TokenCursor::with_base("a::B c", 10);

        let (path, span) = cursor.expect_path("a path").unwrap();

        assert_eq!(path, "a::B");
        assert_eq!(span, 10..14);
        assert_eq!(cursor.peek_text(), Some("c"));
    }

    #[test]
    fn error_at_end_points_past_text() {
        let mut cursor = TokenCursor::new("Mapping");
        cursor.bump();

        let error = cursor.expect(Token::LParen).unwrap_err();

        assert_eq!(error.span, Some(7..7));
        assert_eq!(error.message, "Unexpected end of section, expected '('");
    }

    #[test]
    fn error_on_token_names_it() {
        let mut cursor = TokenCursor::new("; x");

        let error = cursor.expect_path("a class path").unwrap_err();

        assert_eq!(error.span, Some(0..1));
        assert_eq!(error.message, "Unexpected ';', expected a class path");
    }

    #[test]
    fn balanced_skipping_counts_nesting() {
        let mut cursor = TokenCursor::new("{ a { b } c } d");
        cursor.bump();

        let close = cursor.skip_balanced(Token::LBrace, Token::RBrace).unwrap();

        assert_eq!(close, 12..13);
        assert_eq!(cursor.peek_text(), Some("d"));
    }

    #[test]
    fn recovery_stops_at_keyword() {
        let mut cursor = TokenCursor::new("Class x y ; Enum z");

        cursor.recover(&["Class", "Enum"]);

        assert_eq!(cursor.peek_text(), Some("Enum"));
    }

    #[test]
    fn strings_lose_their_quotes() {
        let mut cursor = TokenCursor::new("'http://x'");
        assert_eq!(cursor.expect_string().unwrap(), "http://x");
    }
}
