use std::sync::Arc;
use super::stopwords::StopWords;
use super::tokenizer::Segmentator;
use crate::ircore::config::Config;
use crate::ircore::error::Result;
use crate::ircore::ranking::{QueryTerm, merge_terms};

/// Turns raw text into normalized, stop-word filtered terms.
#[derive(Debug, Clone)]
pub struct Analyzer {
    seg: Segmentator,
    stopwords: Option<Arc<StopWords>>,
}

impl Analyzer {
    pub fn new(stopwords: Option<Arc<StopWords>>) -> Self {
        Analyzer{
            seg: Segmentator::new(),
            stopwords,
        }
    }

    pub fn from_config(cfg: &Config) -> Result<Self> {
        if !cfg.stopwords {
            return Ok(Self::new(None));
        }
        let stopwords = match &cfg.stopwords_file {
            Some(path) => Arc::new(StopWords::english_with_file(path)?),
            None => StopWords::english(),
        };
        Ok(Self::new(Some(stopwords)))
    }

    pub fn analyze(&self, text: &str) -> Vec<String> {
        let text_normalized = self.seg.normalize(text);
        self.seg.parse_tokens(&text_normalized)
            .into_iter()
            .filter(|t| match &self.stopwords {
                Some(sw) => !sw.is_stop_word(t),
                None => true,
            })
            .map(|t| t.to_string())
            .collect()
    }

    /// Query terms of weight 1.0 each, duplicates merged.
    pub fn query_terms(&self, text: &str) -> Vec<QueryTerm> {
        let terms: Vec<QueryTerm> = self.analyze(text)
            .into_iter()
            .map(|t| QueryTerm::new(&t, 1.0))
            .collect();
        merge_terms(&terms)
    }
}

impl Default for Analyzer {
    fn default() -> Self {
        Self::new(Some(StopWords::english()))
    }
}
