use std::collections::HashSet;

const QUESTION_WORDS: &[&str] = &[
    "who", "whom", "whose", "what", "when", "where", "which", "why", "how",
];

pub fn normalize(text: &str) -> String {
    text.split_whitespace()
        .map(|w| w.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Polynomial rolling hash (base 31) over the characters of `text`.
pub fn rolling_hash(text: &str) -> u32 {
    text.chars()
        .fold(0u32, |h, c| h.wrapping_mul(31).wrapping_add(c as u32))
}

pub fn significant_tokens(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() > 3)
        .map(|t| t.to_lowercase())
        .collect()
}

/// Coarse question type: the first interrogative word in the text, if any.
pub fn question_kind(text: &str) -> Option<&'static str> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .find_map(|t| {
            let lower = t.to_lowercase();
            QUESTION_WORDS.iter().copied().find(|w| *w == lower)
        })
}

pub fn book_of(reference: &str) -> &str {
    let trimmed = reference.trim();
    match trimmed.rsplit_once(' ') {
        Some((book, locator)) if locator.contains(':') || locator.chars().all(|c| c.is_ascii_digit()) => {
            book.trim()
        }
        _ => trimmed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_collapses_case_and_spacing() {
        assert_eq!(normalize("  Who   built\tthe ARK? "), "who built the ark?");
    }

    #[test]
    fn rolling_hash_is_stable_and_sensitive() {
        assert_eq!(rolling_hash("abc"), rolling_hash("abc"));
        assert_ne!(rolling_hash("abc"), rolling_hash("acb"));
        assert_eq!(rolling_hash(""), 0);
    }

    #[test]
    fn tokens_skip_short_words() {
        let tokens = significant_tokens("Who led the people out of Egypt?");
        assert!(tokens.contains("people"));
        assert!(tokens.contains("egypt"));
        assert!(!tokens.contains("who"));
        assert!(!tokens.contains("led"));
    }

    #[test]
    fn question_kind_finds_first_interrogative() {
        assert_eq!(question_kind("Who anointed David?"), Some("who"));
        assert_eq!(question_kind("In Genesis 1, what was made first?"), Some("what"));
        assert_eq!(question_kind("Name the prophet swallowed by a fish."), None);
    }

    #[test]
    fn book_of_handles_numbered_books() {
        assert_eq!(book_of("1 Samuel 17:49"), "1 Samuel");
        assert_eq!(book_of("Song of Solomon 2:4"), "Song of Solomon");
        assert_eq!(book_of("Obadiah 1"), "Obadiah");
        assert_eq!(book_of("Genesis"), "Genesis");
    }
}
