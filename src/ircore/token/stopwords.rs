use once_cell::sync::Lazy;
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use crate::ircore::error::{IndexError, Result};

const ENGLISH: &[&str] = &[
    "a", "about", "above", "after", "again", "against", "all", "also", "am", "an",
    "and", "any", "are", "as", "at", "be", "because", "been", "before", "being",
    "below", "between", "both", "but", "by", "can", "could", "did", "do", "does",
    "doing", "down", "during", "each", "either", "et", "few", "for", "from",
    "further", "had", "has", "have", "having", "he", "her", "here", "hers",
    "herself", "him", "himself", "his", "how", "however", "i", "if", "in", "into",
    "is", "it", "its", "itself", "may", "me", "might", "more", "most", "must", "my",
    "myself", "no", "nor", "not", "of", "off", "on", "once", "only", "or", "other",
    "our", "ours", "ourselves", "out", "over", "own", "same", "she", "should", "so",
    "some", "such", "than", "that", "the", "their", "theirs", "them", "themselves",
    "then", "there", "these", "they", "this", "those", "through", "thus", "to",
    "too", "under", "until", "up", "upon", "very", "via", "was", "we", "were",
    "what", "when", "where", "whether", "which", "while", "who", "whom", "why",
    "will", "with", "within", "without", "would", "you", "your", "yours",
    "yourself", "yourselves",
];

static DEFAULT_STOPWORDS: Lazy<Arc<StopWords>> = Lazy::new(|| {
    Arc::new(StopWords::from_words(ENGLISH.iter().copied()))
});

/// Read-only stop word table; built once and shared by `Arc`.
#[derive(Debug, Default)]
pub struct StopWords {
    words: HashSet<String>,
}

impl StopWords {
    pub fn english() -> Arc<StopWords> {
        Arc::clone(&DEFAULT_STOPWORDS)
    }

    pub fn from_words<'a>(words: impl IntoIterator<Item = &'a str>) -> Self {
        StopWords {
            words: words.into_iter()
                .map(|w| w.trim().to_lowercase())
                .filter(|w| !w.is_empty())
                .collect(),
        }
    }

    /// English list extended with one word per line of `path`.
    pub fn english_with_file(path: &Path) -> Result<StopWords> {
        let content = fs::read_to_string(path)
            .map_err(|e| IndexError::Config(format!("stopwords file {}: {}", path.display(), e)))?;
        Ok(StopWords::from_words(ENGLISH.iter().copied().chain(content.lines())))
    }

    pub fn is_stop_word(&self, word: &str) -> bool {
        self.words.contains(word)
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }
}
