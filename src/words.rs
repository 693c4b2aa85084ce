/// Number of whitespace-delimited words in `text`.
///
/// Every caller (progress display, goal checks, session records) goes through
/// this one function so the numbers always agree.
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_word_count_empty() {
        assert_eq!(word_count(""), 0);
        assert_eq!(word_count("   \n\t  "), 0);
    }

    #[test]
    fn test_word_count_collapses_runs() {
        assert_eq!(word_count("  a   b  "), 2);
        assert_eq!(word_count("one\ntwo\n\nthree\tfour"), 4);
    }

    #[test]
    fn test_word_count_ignores_surrounding_whitespace() {
        let text = "the quick brown fox";
        assert_eq!(word_count(text), word_count(&format!("\n  {text}  \n")));
    }

    #[test]
    fn test_word_count_punctuation_stays_attached() {
        assert_eq!(word_count("Hello, world! -- yes."), 4);
    }
}
