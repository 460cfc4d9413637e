//! Target-language auto-detection for pasted word lists.
//! Used when the caller does not pin a target language explicitly.

/// Languages the drilling client supports.
pub const SUPPORTED_LANGS: [&str; 5] = ["en", "ja", "ko", "fr", "zh"];

/// Detect the dominant supported language of a word list. Joins the words
/// into one sample so short entries still give whatlang enough signal.
/// Returns None when detection is unreliable or outside the supported set.
pub fn detect_target_lang<S: AsRef<str>>(words: &[S]) -> Option<&'static str> {
    if words.is_empty() {
        return None;
    }
    let sample = words
        .iter()
        .map(|w| w.as_ref())
        .collect::<Vec<_>>()
        .join(" ");
    // Script check first: whatlang confuses ja/zh on short kana-free input.
    if let Some(lang) = detect_by_script(&sample) {
        return Some(lang);
    }
    let info = whatlang::detect(&sample)?;
    if !info.is_reliable() {
        return None;
    }
    match info.lang() {
        whatlang::Lang::Eng => Some("en"),
        whatlang::Lang::Jpn => Some("ja"),
        whatlang::Lang::Kor => Some("ko"),
        whatlang::Lang::Fra => Some("fr"),
        whatlang::Lang::Cmn => Some("zh"),
        _ => None,
    }
}

/// Unambiguous script ranges short-circuit statistical detection.
fn detect_by_script(text: &str) -> Option<&'static str> {
    let mut has_kana = false;
    let mut has_hangul = false;
    let mut has_han = false;
    for c in text.chars() {
        match c {
            '\u{3040}'..='\u{30FF}' => has_kana = true,
            '\u{AC00}'..='\u{D7AF}' | '\u{1100}'..='\u{11FF}' => has_hangul = true,
            '\u{4E00}'..='\u{9FFF}' => has_han = true,
            _ => {}
        }
    }
    if has_kana {
        Some("ja")
    } else if has_hangul {
        Some("ko")
    } else if has_han {
        Some("zh")
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_chinese_from_han_script() {
        assert_eq!(detect_target_lang(&["猫咪", "苹果"]), Some("zh"));
    }

    #[test]
    fn kana_wins_over_shared_han_characters() {
        assert_eq!(detect_target_lang(&["こんにちは", "学校"]), Some("ja"));
    }

    #[test]
    fn detects_korean() {
        assert_eq!(detect_target_lang(&["안녕하세요", "학교"]), Some("ko"));
    }

    #[test]
    fn detects_english_sentence_sample() {
        let words = ["the quick brown fox jumps over the lazy dog"];
        assert_eq!(detect_target_lang(&words), Some("en"));
    }

    #[test]
    fn empty_input_yields_none() {
        assert_eq!(detect_target_lang::<&str>(&[]), None);
    }
}
