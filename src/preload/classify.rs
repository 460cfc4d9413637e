//! Per-language word validation. A word that fails its target language's
//! character pattern never reaches the network; it is marked invalid at
//! classification time.

use std::collections::HashMap;

use regex::Regex;

/// Inline translation shown for a word that failed validation. Terminal for
/// the load; only a new explicit load retries it.
pub const INVALID_WORD_TEXT: &str = "invalid characters for target language";

/// Translation shown when the backend reports a word as unverifiable.
pub const NOT_FOUND_TEXT: &str = "not in dictionary, define it yourself";

/// Character-set patterns per target language, compiled once.
pub struct WordValidator {
    patterns: HashMap<&'static str, Regex>,
    max_word_length: usize,
}

impl WordValidator {
    pub fn new(max_word_length: usize) -> Self {
        let sources: [(&'static str, &'static str); 5] = [
            ("en", r"^[a-zA-Z\s\-']+$"),
            (
                "ja",
                r"^[\u{3040}-\u{309F}\u{30A0}-\u{30FF}\u{4E00}-\u{9FAF}\u{3000}-\u{303F}\s]+$",
            ),
            ("ko", r"^[\u{AC00}-\u{D7AF}\u{1100}-\u{11FF}\s]+$"),
            ("fr", r"^[a-zA-Z\u{00C0}-\u{00FF}\s\-']+$"),
            ("zh", r"^[\u{4E00}-\u{9FFF}\s]+$"),
        ];
        let patterns = sources
            .into_iter()
            .map(|(lang, src)| (lang, Regex::new(src).expect("invalid language pattern")))
            .collect();
        Self {
            patterns,
            max_word_length,
        }
    }

    /// Validate a word against the target language's character set.
    /// Unknown languages fall back to the English pattern.
    pub fn is_valid(&self, word: &str, lang: &str) -> bool {
        if word.is_empty() || word.chars().count() > self.max_word_length {
            return false;
        }
        let pattern = self
            .patterns
            .get(lang)
            .unwrap_or_else(|| &self.patterns["en"]);
        pattern.is_match(word)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validator() -> WordValidator {
        WordValidator::new(100)
    }

    #[test]
    fn english_accepts_letters_hyphens_apostrophes() {
        let v = validator();
        assert!(v.is_valid("apple", "en"));
        assert!(v.is_valid("mother-in-law", "en"));
        assert!(v.is_valid("don't", "en"));
        assert!(v.is_valid("ice cream", "en"));
    }

    #[test]
    fn english_rejects_cjk_and_digits() {
        let v = validator();
        assert!(!v.is_valid("猫咪", "en"));
        assert!(!v.is_valid("apple1", "en"));
        assert!(!v.is_valid("", "en"));
    }

    #[test]
    fn chinese_accepts_han_only() {
        let v = validator();
        assert!(v.is_valid("猫咪", "zh"));
        assert!(!v.is_valid("apple", "zh"));
    }

    #[test]
    fn japanese_accepts_kana_and_kanji() {
        let v = validator();
        assert!(v.is_valid("こんにちは", "ja"));
        assert!(v.is_valid("学校", "ja"));
        assert!(!v.is_valid("hello", "ja"));
    }

    #[test]
    fn french_accepts_accented_letters() {
        let v = validator();
        assert!(v.is_valid("déjà", "fr"));
        assert!(v.is_valid("l'école", "fr"));
        assert!(!v.is_valid("안녕", "fr"));
    }

    #[test]
    fn unknown_language_falls_back_to_english() {
        let v = validator();
        assert!(v.is_valid("hund", "de"));
        assert!(!v.is_valid("犬", "de"));
    }

    #[test]
    fn over_long_words_rejected() {
        let v = WordValidator::new(5);
        assert!(v.is_valid("apple", "en"));
        assert!(!v.is_valid("apples", "en"));
    }
}
