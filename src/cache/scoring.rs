//! Fuzzy matching between a free-text query and a cached song title.
//!
//! The weights below decide whether a query reuses an existing download, so
//! they are fixed: changing them changes which songs get fetched again.

use std::collections::HashSet;

/// Minimum combined score for a cached title to count as a match.
pub const ACCEPT_THRESHOLD: f64 = 0.55;

/// Bonus when the whole query appears inside the title.
pub const QUERY_IN_TITLE_BONUS: f64 = 0.5;
/// Bonus when the title (cut at its first dash) appears inside the query.
pub const CLEAN_TITLE_IN_QUERY_BONUS: f64 = 0.3;
/// Bonus when one of the first title words is also a query word.
pub const LEADING_WORD_BONUS: f64 = 0.1;

const LEADING_WORDS: usize = 3;
const MIN_TOKEN_CHARS: usize = 3;
const NOISE_WORDS: [&str; 6] = ["the", "and", "official", "audio", "video", "lyrics"];
const DASHES: [char; 3] = ['-', '–', '—'];

/// Trims surrounding whitespace and lower-cases.
pub fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

/// Splits on whitespace, dropping short tokens and noise words.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split_whitespace()
        .map(str::to_lowercase)
        .filter(|word| word.chars().count() >= MIN_TOKEN_CHARS)
        .filter(|word| !NOISE_WORDS.contains(&word.as_str()))
        .collect()
}

/// Intersection over union of the two token sets; 0 when both are empty.
pub fn jaccard(a: &[String], b: &[String]) -> f64 {
    let set_a: HashSet<&str> = a.iter().map(String::as_str).collect();
    let set_b: HashSet<&str> = b.iter().map(String::as_str).collect();

    let intersection = set_a.intersection(&set_b).count();
    let union = set_a.len() + set_b.len() - intersection;

    if union == 0 {
        0.0
    } else {
        intersection as f64 / union as f64
    }
}

/// Title with everything from the first dash-like separator removed.
pub fn clean_title(title_lower: &str) -> &str {
    match title_lower.find(DASHES) {
        Some(pos) => title_lower[..pos].trim(),
        None => title_lower.trim(),
    }
}

/// A query prepared once and scored against many titles.
#[derive(Debug, Clone)]
pub struct QueryMatcher {
    normalized: String,
    tokens: Vec<String>,
}

impl QueryMatcher {
    pub fn new(query: &str) -> Self {
        let normalized = normalize(query);
        let tokens = tokenize(&normalized);
        Self { normalized, tokens }
    }

    pub fn normalized(&self) -> &str {
        &self.normalized
    }

    /// Jaccard base score plus at most one bonus.
    pub fn score(&self, title: &str) -> f64 {
        let title_lower = normalize(title);
        let title_tokens = tokenize(&title_lower);

        let base = jaccard(&self.tokens, &title_tokens);
        base + self.bonus(&title_lower, &title_tokens)
    }

    fn bonus(&self, title_lower: &str, title_tokens: &[String]) -> f64 {
        if title_lower.contains(self.normalized.as_str()) {
            return QUERY_IN_TITLE_BONUS;
        }

        let clean = clean_title(title_lower);
        if !clean.is_empty() && self.normalized.contains(clean) {
            return CLEAN_TITLE_IN_QUERY_BONUS;
        }

        let leading_hit = title_tokens
            .iter()
            .take(LEADING_WORDS)
            .any(|word| self.tokens.contains(word));
        if leading_hit {
            LEADING_WORD_BONUS
        } else {
            0.0
        }
    }

    pub fn accepts(score: f64) -> bool {
        score >= ACCEPT_THRESHOLD
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_tokenize_drops_short_and_noise_words() {
        let tokens = tokenize("The Official Music Video of an ABBA song - Lyrics");
        assert_eq!(tokens, vec!["music", "abba", "song"]);
    }

    #[test]
    fn test_jaccard_empty_sets() {
        assert_eq!(jaccard(&[], &[]), 0.0);
        assert_eq!(jaccard(&["abc".to_string()], &[]), 0.0);
    }

    #[test]
    fn test_jaccard_ignores_duplicates() {
        let a = tokenize("echo echo delta");
        let b = tokenize("echo delta");
        assert!(approx(jaccard(&a, &b), 1.0));
    }

    #[test]
    fn test_clean_title_cuts_at_any_dash() {
        assert_eq!(clean_title("rick astley - never gonna"), "rick astley");
        assert_eq!(clean_title("daft punk – one more time"), "daft punk");
        assert_eq!(clean_title("artist — track"), "artist");
        assert_eq!(clean_title("no separator here"), "no separator here");
        assert_eq!(clean_title("- leading dash"), "");
    }

    #[test]
    fn test_rick_astley_matches() {
        let matcher = QueryMatcher::new("Never Gonna Give You Up");
        let score = matcher.score("Rick Astley - Never Gonna Give You Up (Official Video)");

        // {never, gonna, give, you} sobre 8 tokens del título, más el bonus de 0.5
        assert!(approx(score, 1.0), "score was {score}");
        assert!(QueryMatcher::accepts(score));
    }

    #[test]
    fn test_unrelated_title_does_not_match() {
        let matcher = QueryMatcher::new("lofi beats");
        let score = matcher.score("Totally Unrelated Song Title");

        assert!(approx(score, 0.0), "score was {score}");
        assert!(!QueryMatcher::accepts(score));
    }

    #[test]
    fn test_clean_title_bonus() {
        // el query no está contenido en el título, pero "daft punk" sí está en el query
        let matcher = QueryMatcher::new("daft punk around the world live");
        let score = matcher.score("Daft Punk - Around The World");

        let base = jaccard(
            &tokenize("daft punk around the world live"),
            &tokenize("daft punk - around the world"),
        );
        assert!(approx(score, base + CLEAN_TITLE_IN_QUERY_BONUS));
    }

    #[test]
    fn test_leading_word_bonus() {
        let matcher = QueryMatcher::new("bohemian remastered");
        let score = matcher.score("Bohemian Rhapsody");

        // jaccard = 1/3, bonus por "bohemian" en las primeras palabras
        assert!(approx(score, 1.0 / 3.0 + LEADING_WORD_BONUS));
    }

    #[test]
    fn test_bonuses_are_exclusive() {
        // query dentro del título (+0.5) y también palabra inicial compartida
        let matcher = QueryMatcher::new("bohemian");
        let score = matcher.score("Bohemian Rhapsody");
        assert!(approx(score, 0.5 + QUERY_IN_TITLE_BONUS));
    }
}
