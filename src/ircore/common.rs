use serde::{Serialize, Deserialize};
use std::fmt;
use std::str::FromStr;

// dense, zero-based, stable within one index generation
pub type DocId = u32;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RetrievalModel {
    #[serde(alias = "set")]
    Existential,
    #[serde(alias = "vsm")]
    VectorSpace,
    #[serde(alias = "okapi")]
    Bm25,
}

impl Default for RetrievalModel {
    fn default() -> Self {
        RetrievalModel::Bm25
    }
}

impl FromStr for RetrievalModel {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "set" | "existential" => Ok(RetrievalModel::Existential),
            "vsm" | "vectorspace" => Ok(RetrievalModel::VectorSpace),
            "bm25" | "okapi" => Ok(RetrievalModel::Bm25),
            other => Err(format!("unknown retrieval model '{}'", other)),
        }
    }
}

impl fmt::Display for RetrievalModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RetrievalModel::Existential => "set",
            RetrievalModel::VectorSpace => "vsm",
            RetrievalModel::Bm25 => "bm25",
        };
        write!(f, "{}", name)
    }
}

/// How much document data is materialized alongside a doc id.
///
/// `Plain` carries only the external id (always resident), `Scoring` adds the
/// per-document statistics and `Display` adds the full record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DocTier {
    Plain,
    Scoring,
    Display,
}

impl FromStr for DocTier {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "plain" | "id" => Ok(DocTier::Plain),
            "scoring" | "essential" => Ok(DocTier::Scoring),
            "display" | "full" => Ok(DocTier::Display),
            other => Err(format!("unknown document tier '{}'", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_model_and_tier() {
        assert_eq!("VSM".parse::<RetrievalModel>(), Ok(RetrievalModel::VectorSpace));
        assert_eq!("set".parse::<RetrievalModel>(), Ok(RetrievalModel::Existential));
        assert!("lmd".parse::<RetrievalModel>().is_err());
        assert_eq!("full".parse::<DocTier>(), Ok(DocTier::Display));
        assert!(DocTier::Plain < DocTier::Scoring);
        assert_eq!(RetrievalModel::default().to_string(), "bm25");
    }
}
