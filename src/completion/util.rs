/// The word ending at the end of `line_prefix`, made of the characters
/// `is_word` accepts, and the text before it.
pub fn split_word(line_prefix: &str, is_word: impl Fn(char) -> bool) -> (&str, &str) {
    let start = line_prefix
        .char_indices()
        .rev()
        .take_while(|&(_, c)| is_word(c))
        .last()
        .map(|(i, _)| i)
        .unwrap_or(line_prefix.len());

    line_prefix.split_at(start)
}

pub fn is_identifier_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

pub fn is_path_char(c: char) -> bool {
    is_identifier_char(c) || c == ':'
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn word_at_end_of_line() {
        assert_eq!(split_word("  class: a::Pe", is_path_char), ("  class: ", "a::Pe"));
        assert_eq!(split_word("  class: a::Pe", is_identifier_char), ("  class: a::", "Pe"));
        assert_eq!(split_word("x: ", is_path_char), ("x: ", ""));
        assert_eq!(split_word("", is_path_char), ("", ""));
    }
}
