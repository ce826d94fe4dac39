//! Tokens shared by the built-in dialects.
//!
//! Keywords are not separate tokens: every dialect reads them as [`Token::Path`]
//! and compares the text, so `Class` is a keyword in one dialect and a plain
//! name in another.

use logos::Logos;

#[derive(Logos, Debug, PartialEq, Eq, Clone, Copy)]
#[logos(skip r"[ \t\r\n\f]+")]
#[logos(skip r"//[^\r\n]*")]
#[logos(skip r"/\*([^*]|\*+[^*/])*\*+/")]
pub enum Token {
    /// An identifier or a `::`-separated path
    #[regex(r"[A-Za-z_][A-Za-z0-9_]*(::[A-Za-z_][A-Za-z0-9_]*)*", priority = 3)]
    Path,

    #[regex(r"[0-9]+", priority = 3)]
    Number,

    #[regex(r"'([^'\\]|\\.)*'")]
    String,

    // Islands: `#{`, `#>{`, ... up to `}#`
    #[regex(r"#[^{\s#]*\{")]
    IslandOpen,
    #[token("}#")]
    IslandClose,

    #[token("<<")]
    StereotypeOpen,
    #[token(">>")]
    StereotypeClose,

    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,

    #[token("::")]
    DoubleColon,
    #[token(":")]
    Colon,
    #[token(";")]
    Semicolon,
    #[token(",")]
    Comma,
    #[token("..")]
    DotDot,
    #[token(".")]
    Dot,
    #[token("=")]
    Equals,
    #[token("~")]
    Tilde,
    #[token("*")]
    Star,

    /// Anything else, e.g. operators inside function bodies
    #[regex(r"[^\s]", priority = 1)]
    Unknown,
}

impl Token {
    pub fn describe(self) -> &'static str {
        match self {
            Token::Path => "a name",
            Token::Number => "a number",
            Token::String => "a string",
            Token::IslandOpen => "'#{'",
            Token::IslandClose => "'}#'",
            Token::StereotypeOpen => "'<<'",
            Token::StereotypeClose => "'>>'",
            Token::LBrace => "'{'",
            Token::RBrace => "'}'",
            Token::LParen => "'('",
            Token::RParen => "')'",
            Token::LBracket => "'['",
            Token::RBracket => "']'",
            Token::DoubleColon => "'::'",
            Token::Colon => "':'",
            Token::Semicolon => "';'",
            Token::Comma => "','",
            Token::DotDot => "'..'",
            Token::Dot => "'.'",
            Token::Equals => "'='",
            Token::Tilde => "'~'",
            Token::Star => "'*'",
            Token::Unknown => "a symbol",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(source: &str) -> Vec<(Token, &str)> {
        Token::lexer(source)
            .spanned()
            .map(|(token, span)| (token.unwrap_or(Token::Unknown), &source[span]))
            .collect()
    }

    #[test]
    fn paths_are_single_tokens() {
        assert_eq!(
            tokens("a::b::C extends D"),
            vec![
                (Token::Path, "a::b::C"),
                (Token::Path, "extends"),
                (Token::Path, "D")
            ]
        );
    }

    #[test]
    fn multiplicity_ranges() {
        assert_eq!(
            tokens("[0..1]"),
            vec![
                (Token::LBracket, "["),
                (Token::Number, "0"),
                (Token::DotDot, ".."),
                (Token::Number, "1"),
                (Token::RBracket, "]")
            ]
        );
    }

    #[test]
    fn island_delimiters() {
        assert_eq!(
            tokens("#{ a::C {name}}# #>{a::db.t}#"),
            vec![
                (Token::IslandOpen, "#{"),
                (Token::Path, "a::C"),
                (Token::LBrace, "{"),
                (Token::Path, "name"),
                (Token::RBrace, "}"),
                (Token::IslandClose, "}#"),
                (Token::IslandOpen, "#>{"),
                (Token::Path, "a::db"),
                (Token::Dot, "."),
                (Token::Path, "t"),
                (Token::IslandClose, "}#"),
            ]
        );
    }

    #[test]
    fn comments_and_strings() {
        assert_eq!(
            tokens("url: 'it\\'s'; // trailing\n/* block */ x"),
            vec![
                (Token::Path, "url"),
                (Token::Colon, ":"),
                (Token::String, "'it\\'s'"),
                (Token::Semicolon, ";"),
                (Token::Path, "x")
            ]
        );
    }

    #[test]
    fn punctuation_wins_over_unknown() {
        assert_eq!(
            tokens("{}()[]:;,.=~*"),
            vec![
                (Token::LBrace, "{"),
                (Token::RBrace, "}"),
                (Token::LParen, "("),
                (Token::RParen, ")"),
                (Token::LBracket, "["),
                (Token::RBracket, "]"),
                (Token::Colon, ":"),
                (Token::Semicolon, ";"),
                (Token::Comma, ","),
                (Token::Dot, "."),
                (Token::Equals, "="),
                (Token::Tilde, "~"),
                (Token::Star, "*"),
            ]
        );
        assert_eq!(
            tokens("a::B[*]=>c"),
            vec![
                (Token::Path, "a::B"),
                (Token::LBracket, "["),
                (Token::Star, "*"),
                (Token::RBracket, "]"),
                (Token::Equals, "="),
                (Token::Unknown, ">"),
                (Token::Path, "c"),
            ]
        );
    }

    #[test]
    fn unknown_symbols_do_not_stop_lexing() {
        assert_eq!(
            tokens("$x -> y"),
            vec![
                (Token::Unknown, "$"),
                (Token::Path, "x"),
                (Token::Unknown, "-"),
                (Token::Unknown, ">"),
                (Token::Path, "y")
            ]
        );
    }
}
