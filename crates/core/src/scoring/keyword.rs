use crate::scoring::{EmotionScores, ProviderError, ScoreProvider};
use futures::future::BoxFuture;
use futures::FutureExt;

pub const NEUTRAL: &str = "neutral";

const LEXICON: &[(&str, &[&str])] = &[
    (
        "anger",
        &["angry", "mad", "furious", "hate", "rage", "annoyed", "damn"],
    ),
    ("disgust", &["disgust", "disgusting", "gross", "nasty", "yuck"]),
    (
        "fear",
        &["scared", "afraid", "fear", "terrified", "nervous", "worried"],
    ),
    (
        "joy",
        &["happy", "joy", "excited", "love", "great", "glad", "wonderful", "haha"],
    ),
    (
        "sadness",
        &["sad", "depressed", "unhappy", "cry", "crying", "miss", "sorry", "terrible"],
    ),
    ("surprise", &["surprise", "surprised", "amazing", "wow", "whoa", "unbelievable"]),
];

/// Offline provider that counts emotion keywords and normalises the counts
/// into a distribution over the same label set a text classifier would use.
///
/// Text without any keyword scores as fully neutral.
#[derive(Clone, Debug, Default)]
pub struct KeywordScoreProvider;

impl KeywordScoreProvider {
    pub fn new() -> Self {
        Self
    }

    pub fn score_text(&self, text: &str) -> EmotionScores {
        let lower = text.to_lowercase();
        let words: Vec<&str> = lower
            .split(|c: char| !(c.is_alphanumeric() || c == '\''))
            .filter(|w| !w.is_empty())
            .collect();

        let counts: Vec<(&str, usize)> = LEXICON
            .iter()
            .map(|(label, keywords)| {
                let hits = words.iter().filter(|w| keywords.contains(*w)).count();
                (*label, hits)
            })
            .collect();
        let total: usize = counts.iter().map(|(_, n)| n).sum();

        let mut scores: EmotionScores = counts
            .into_iter()
            .map(|(label, n)| {
                let p = if total == 0 { 0.0 } else { n as f64 / total as f64 };
                (label, p)
            })
            .collect();
        scores.insert(NEUTRAL, if total == 0 { 1.0 } else { 0.0 });
        scores
    }
}

impl ScoreProvider for KeywordScoreProvider {
    fn score(&self, text: String) -> BoxFuture<'_, Result<EmotionScores, ProviderError>> {
        async move { Ok(self.score_text(&text)) }.boxed()
    }
}
