use serde::{Serialize, Deserialize};
use std::fs;
use std::path::{Path, PathBuf};
use super::common::RetrievalModel;
use super::error::{IndexError, Result};

#[derive(Serialize, Deserialize, PartialEq, Debug, Clone)]
#[serde(default)]
pub struct Config {
    pub index_dir: PathBuf,
    pub stopwords: bool,
    pub stopwords_file: Option<PathBuf>,
    // weight of the citation importance in the final score, 0 disables blending
    pub pagerank_weight: f64,
    pub pagerank: PageRankConfig,
    pub bm25: Bm25Config,
    pub retrieval_model: RetrievalModel,
    // buffered postings before the builder spills a partial index
    pub partial_index_postings: usize,
}

#[derive(Serialize, Deserialize, PartialEq, Debug, Clone, Copy)]
#[serde(default)]
pub struct PageRankConfig {
    pub damping: f64,
    pub threshold: f64,
    pub max_iterations: usize,
}

#[derive(Serialize, Deserialize, PartialEq, Debug, Clone, Copy)]
#[serde(default)]
pub struct Bm25Config {
    pub k1: f64,
    pub b: f64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            index_dir: PathBuf::from(".paperir/index"),
            stopwords: true,
            stopwords_file: None,
            pagerank_weight: 0.0,
            pagerank: PageRankConfig::default(),
            bm25: Bm25Config::default(),
            retrieval_model: RetrievalModel::default(),
            partial_index_postings: 1_000_000,
        }
    }
}

impl Default for PageRankConfig {
    fn default() -> Self {
        PageRankConfig {
            damping: 0.85,
            threshold: 1e-8,
            max_iterations: 100,
        }
    }
}

impl Default for Bm25Config {
    fn default() -> Self {
        Bm25Config { k1: 1.2, b: 0.75 }
    }
}

impl Config {
    pub fn from_str(cfg_str: &str) -> Result<Self> {
        let cfg: Config = if cfg_str.trim().is_empty() {
            Config::default()
        } else {
            serde_yaml::from_str(cfg_str).map_err(|e| IndexError::Config(e.to_string()))?
        };
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let cfg_str = fs::read_to_string(path)
            .map_err(|e| IndexError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_str(&cfg_str)
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.pagerank_weight) {
            return Err(IndexError::Config(format!(
                "pagerank_weight must be in [0, 1], got {}", self.pagerank_weight)));
        }
        if !(self.pagerank.damping > 0.0 && self.pagerank.damping < 1.0) {
            return Err(IndexError::Config(format!(
                "pagerank.damping must be in (0, 1), got {}", self.pagerank.damping)));
        }
        if self.pagerank.threshold < 0.0 {
            return Err(IndexError::Config("pagerank.threshold must not be negative".to_string()));
        }
        if self.bm25.k1 <= 0.0 {
            return Err(IndexError::Config(format!("bm25.k1 must be positive, got {}", self.bm25.k1)));
        }
        if !(0.0..=1.0).contains(&self.bm25.b) {
            return Err(IndexError::Config(format!("bm25.b must be in [0, 1], got {}", self.bm25.b)));
        }
        if self.partial_index_postings == 0 {
            return Err(IndexError::Config("partial_index_postings must be positive".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yaml_syntax() {
        let cfg_str =
"index_dir: /tmp/s2
pagerank_weight: 0.25
retrieval_model: vsm
pagerank:
  damping: 0.9
bm25:
  k1: 1.5
";
        let cfg = Config::from_str(cfg_str).unwrap();
        assert_eq!(cfg.index_dir, PathBuf::from("/tmp/s2"));
        assert_eq!(cfg.pagerank_weight, 0.25);
        assert_eq!(cfg.retrieval_model, RetrievalModel::VectorSpace);
        assert_eq!(cfg.pagerank.damping, 0.9);
        // untouched nested fields keep their defaults
        assert_eq!(cfg.pagerank.max_iterations, 100);
        assert_eq!(cfg.bm25, Bm25Config { k1: 1.5, b: 0.75 });
        assert!(cfg.stopwords);
    }

    #[test]
    fn test_empty_config_is_default() {
        assert_eq!(Config::from_str("").unwrap(), Config::default());
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(Config::from_str("pagerank_weight: 1.5"), Err(IndexError::Config(_))));
        assert!(matches!(Config::from_str("pagerank:\n  damping: 1.0"), Err(IndexError::Config(_))));
        assert!(matches!(Config::from_str("bm25:\n  b: -0.1"), Err(IndexError::Config(_))));
        assert!(matches!(Config::from_str("index_dir: [unclosed"), Err(IndexError::Config(_))));
    }
}
