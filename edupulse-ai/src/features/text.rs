//! Lexicon-based text features
//!
//! Produces a fixed 20-wide vector from free text: lexicon hit ratios for
//! positive/negative/stress/engagement vocabulary, shape statistics, and
//! punctuation/casing flags. All ratios are normalized by token count so the
//! vector is length-invariant.

use super::{unit, TEXT_FEATURE_DIM};

const POSITIVE_WORDS: &[&str] = &[
    "good", "great", "excellent", "love", "amazing", "wonderful", "happy", "fantastic", "awesome",
    "best", "fun", "cool", "nice", "excited", "proud", "easy", "like", "enjoy", "yay", "win",
];

const NEGATIVE_WORDS: &[&str] = &[
    "bad", "terrible", "awful", "hate", "horrible", "worst", "sad", "angry", "disappointed",
    "poor", "boring", "hard", "wrong", "lost", "cry", "ugly", "stupid", "annoying", "unfair",
    "quit",
];

const STRESS_WORDS: &[&str] = &[
    "stress", "stressed", "anxious", "anxiety", "worried", "worry", "scared", "afraid", "panic",
    "nervous", "overwhelmed", "pressure", "tired", "exhausted", "confused", "stuck", "help",
];

const ENGAGEMENT_WORDS: &[&str] = &[
    "interesting", "curious", "learn", "learning", "understand", "question", "why", "how",
    "discover", "explore", "try", "practice", "again", "more", "challenge", "solve",
];

const NEGATION_WORDS: &[&str] = &["not", "no", "never", "dont", "don't", "cant", "can't", "wont", "won't"];

const INTENSIFIER_WORDS: &[&str] = &["very", "really", "so", "extremely", "totally", "super", "too"];

const FIRST_PERSON_WORDS: &[&str] = &["i", "me", "my", "mine", "myself", "im", "i'm"];

/// Extract the fixed-width text feature vector.
///
/// Empty or whitespace-only text yields the zero vector, never an error.
pub fn extract(text: &str) -> [f32; TEXT_FEATURE_DIM] {
    let mut features = [0.0f32; TEXT_FEATURE_DIM];

    let tokens: Vec<String> = text
        .split_whitespace()
        .map(|t| {
            t.trim_matches(|c: char| !c.is_alphanumeric() && c != '\'')
                .to_lowercase()
        })
        .filter(|t| !t.is_empty())
        .collect();

    if tokens.is_empty() {
        return features;
    }
    let token_count = tokens.len() as f32;

    let count_hits = |lexicon: &[&str]| -> f32 {
        tokens
            .iter()
            .filter(|t| lexicon.contains(&t.as_str()))
            .count() as f32
    };

    let positive = count_hits(POSITIVE_WORDS);
    let negative = count_hits(NEGATIVE_WORDS);
    let stress = count_hits(STRESS_WORDS);
    let engagement = count_hits(ENGAGEMENT_WORDS);

    features[0] = positive / token_count;
    features[1] = negative / token_count;
    features[2] = stress / token_count;
    features[3] = engagement / token_count;
    // Net sentiment ratio: direction of the lexicon balance, 0 with no hits
    features[4] = if positive + negative > 0.0 {
        (positive - negative) / (positive + negative)
    } else {
        0.0
    };
    features[5] = unit(token_count / 50.0);
    features[6] = unit(text.chars().count() as f32 / 400.0);

    let total_word_chars: usize = tokens.iter().map(|t| t.chars().count()).sum();
    features[7] = unit(total_word_chars as f32 / token_count / 12.0);

    features[8] = if text.contains('!') { 1.0 } else { 0.0 };
    features[9] = if text.contains('?') { 1.0 } else { 0.0 };
    features[10] = if text.contains("...") || text.contains('…') {
        1.0
    } else {
        0.0
    };

    let alpha_chars = text.chars().filter(|c| c.is_alphabetic()).count();
    let upper_chars = text.chars().filter(|c| c.is_uppercase()).count();
    features[11] = if alpha_chars > 0 {
        upper_chars as f32 / alpha_chars as f32
    } else {
        0.0
    };

    features[12] = count_hits(FIRST_PERSON_WORDS) / token_count;
    features[13] = count_hits(NEGATION_WORDS) / token_count;
    features[14] = count_hits(INTENSIFIER_WORDS) / token_count;

    let mut unique = tokens.clone();
    unique.sort();
    unique.dedup();
    features[15] = unique.len() as f32 / token_count;

    let long_words = tokens.iter().filter(|t| t.chars().count() > 6).count();
    features[16] = long_words as f32 / token_count;

    features[17] = if text.chars().any(|c| c.is_ascii_digit()) {
        1.0
    } else {
        0.0
    };
    features[18] = unit((positive + negative + stress + engagement) / token_count);
    features[19] = if text.contains("!!") || text.contains("??") {
        1.0
    } else {
        0.0
    };

    features
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_text_yields_zero_vector() {
        assert_eq!(extract(""), [0.0; TEXT_FEATURE_DIM]);
        assert_eq!(extract("   \n\t "), [0.0; TEXT_FEATURE_DIM]);
    }

    #[test]
    fn vector_width_is_fixed() {
        assert_eq!(extract("hello").len(), TEXT_FEATURE_DIM);
        let long = "word ".repeat(500);
        assert_eq!(extract(&long).len(), TEXT_FEATURE_DIM);
    }

    #[test]
    fn positive_text_scores_positive_net_sentiment() {
        let features = extract("I love this lesson, it is great and fun!");
        assert!(features[0] > 0.0, "positive ratio should be set");
        assert_eq!(features[1], 0.0, "no negative hits expected");
        assert_eq!(features[4], 1.0, "net sentiment all-positive");
        assert_eq!(features[8], 1.0, "exclamation flag");
    }

    #[test]
    fn stress_vocabulary_is_counted_separately() {
        let features = extract("i am so worried and stressed about this test");
        assert!(features[2] > 0.0, "stress ratio should be set");
        assert!(features[12] > 0.0, "first-person ratio should be set");
        assert!(features[14] > 0.0, "intensifier ratio should be set");
    }

    #[test]
    fn ratios_stay_bounded_for_degenerate_input() {
        let features = extract("!!! ??? ... 123 AAAA");
        for (i, value) in features.iter().enumerate() {
            assert!(
                (-1.0..=1.0).contains(value),
                "feature {} out of range: {}",
                i,
                value
            );
        }
    }
}
