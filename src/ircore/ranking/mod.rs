pub mod membership;
pub mod vsm;
pub mod bm25;

use std::collections::HashMap;
use crate::ircore::common::{DocId, DocTier, RetrievalModel};
use crate::ircore::config::Bm25Config;
use crate::ircore::error::Result;
use crate::ircore::index::{DocInfo, Index, TermPostings};

/// One query term and its weight.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryTerm {
    pub term: String,
    pub weight: f64,
}

impl QueryTerm {
    pub fn new(term: &str, weight: f64) -> Self {
        QueryTerm { term: term.to_string(), weight }
    }
}

/// Sums the weights of repeated terms, keeping first-occurrence order.
pub fn merge_terms(query: &[QueryTerm]) -> Vec<QueryTerm> {
    let mut slots: HashMap<&str, usize> = HashMap::new();
    let mut merged: Vec<QueryTerm> = vec![];
    for qt in query {
        match slots.get(qt.term.as_str()) {
            Some(&i) => merged[i].weight += qt.weight,
            None => {
                slots.insert(&qt.term, merged.len());
                merged.push(qt.clone());
            }
        }
    }
    merged
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    pub doc_id: DocId,
    pub score: f64,
}

/// Collection-wide values a model needs besides the postings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollectionStats {
    pub documents: usize,
    pub avg_doc_length: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoringParams {
    pub top_k: usize,
    pub bm25: Bm25Config,
}

/// Accumulates per-document scores, remembering the order documents were
/// first encountered. That order is the tie-break of the final sort.
#[derive(Debug, Default)]
pub struct Accumulator {
    slots: HashMap<DocId, usize>,
    candidates: Vec<Candidate>,
}

impl Accumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, doc_id: DocId, score: f64) {
        match self.slots.get(&doc_id) {
            Some(&i) => self.candidates[i].score += score,
            None => {
                self.slots.insert(doc_id, self.candidates.len());
                self.candidates.push(Candidate { doc_id, score });
            }
        }
    }

    pub fn contains(&self, doc_id: DocId) -> bool {
        self.slots.contains_key(&doc_id)
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn into_candidates(self) -> Vec<Candidate> {
        self.candidates
    }
}

type ScoreFn = fn(&[QueryTerm], &[TermPostings], &CollectionStats, &ScoringParams) -> Vec<Candidate>;

/// Scores every document found in `postings`; `postings[i]` belongs to `query[i]`.
pub fn score(
    model: RetrievalModel,
    query: &[QueryTerm],
    postings: &[TermPostings],
    collection: &CollectionStats,
    params: &ScoringParams,
) -> Vec<Candidate> {
    let scorer: ScoreFn = match model {
        RetrievalModel::Existential => membership::rank_existential,
        RetrievalModel::VectorSpace => vsm::rank_vsm,
        RetrievalModel::Bm25 => bm25::rank_bm25,
    };
    scorer(query, postings, collection, params)
}

/// Blends citation importance into the model score, then sorts descending
/// and keeps `top_k`.
///
/// Importance is normalized by its maximum within `candidates` (a maximum of
/// 0 counts as 1) and combined as `score * (1 - w) + importance * w`. With
/// `w == 0` scores are left untouched. The sort is stable, so ties keep
/// candidate order.
pub fn blend_and_rank<F>(mut candidates: Vec<Candidate>, importance: F, weight: f64, top_k: usize) -> Vec<Candidate>
where
    F: Fn(DocId) -> f64,
{
    if weight != 0.0 {
        let max = candidates.iter().map(|c| importance(c.doc_id)).fold(0.0, f64::max);
        let max = if max > 0.0 { max } else { 1.0 };
        for c in candidates.iter_mut() {
            c.score = c.score * (1.0 - weight) + importance(c.doc_id) / max * weight;
        }
    }
    candidates.sort_by(|a, b| b.score.total_cmp(&a.score));
    candidates.truncate(top_k);
    candidates
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    pub doc: DocInfo,
    pub score: f64,
}

/// Ranked results plus the number of documents that matched before
/// truncation. For the existential model the match count stops at `top_k`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Ranked {
    pub results: Vec<SearchResult>,
    pub total_matches: usize,
}

/// Runs `query` against a loaded index.
///
/// Models only ever see the scoring tier. The caller's `tier` is
/// materialized for the surviving `top_k` documents only.
pub fn evaluate(
    index: &Index,
    query: &[QueryTerm],
    model: RetrievalModel,
    top_k: usize,
    tier: DocTier,
    weight: f64,
    bm25: &Bm25Config,
) -> Result<Ranked> {
    let query = merge_terms(query);
    let terms: Vec<&str> = query.iter().map(|qt| qt.term.as_str()).collect();
    let fetch_tier = match model {
        RetrievalModel::Existential => DocTier::Plain,
        _ => DocTier::Scoring,
    };
    let postings = index.fetch_terms(&terms, fetch_tier)?;
    let collection = CollectionStats {
        documents: index.total_documents(),
        avg_doc_length: index.avg_doc_length(),
    };
    let params = ScoringParams { top_k, bm25: *bm25 };
    let candidates = score(model, &query, &postings, &collection, &params);
    let total_matches = candidates.len();
    let ranked = blend_and_rank(candidates, |doc| index.importance(doc), weight, top_k);
    let results = ranked.into_iter()
        .map(|c| Ok(SearchResult { doc: index.doc_info(c.doc_id, tier)?, score: c.score }))
        .collect::<Result<Vec<_>>>()?;
    log::debug!("{} query {:?}: {} matches, {} returned", model, terms, total_matches, results.len());
    Ok(Ranked { results, total_matches })
}

#[cfg(test)]
pub(crate) mod testutil {
    use std::sync::Arc;
    use crate::ircore::index::{DocInfo, DocStats, Posting, PostingEntry, TermPostings};

    /// In-memory postings: `(doc_id, tf, doc length, vsm norm)` per entry.
    pub fn term_postings(term: &str, entries: &[(u32, u32, u32, f64)]) -> TermPostings {
        TermPostings {
            term: term.to_string(),
            df: entries.len() as u32,
            entries: entries.iter()
                .map(|&(doc_id, tf, length, norm)| PostingEntry {
                    posting: Posting { doc_id, tf },
                    doc: DocInfo {
                        doc_id,
                        id: Arc::from(format!("d{}", doc_id)),
                        stats: Some(DocStats { length, max_tf: tf, norm }),
                        details: None,
                    },
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::atomic::AtomicBool;
    use crate::ircore::doc::Document;
    use crate::ircore::index::fixtures;

    fn scenario_index() -> (tempfile::TempDir, Index) {
        let tmp = tempfile::tempdir().unwrap();
        let dest = tmp.path().join("index");
        fixtures::build(&dest, &fixtures::scenario_docs(), 1000);
        let index = Index::open(&dest, &AtomicBool::new(false)).unwrap();
        (tmp, index)
    }

    fn run(index: &Index, query: &[QueryTerm], model: RetrievalModel, top_k: usize, weight: f64) -> Ranked {
        evaluate(index, query, model, top_k, DocTier::Plain, weight, &Bm25Config::default()).unwrap()
    }

    fn ids(ranked: &Ranked) -> Vec<String> {
        ranked.results.iter().map(|r| r.doc.id.to_string()).collect()
    }

    #[test]
    fn test_merge_terms() {
        let q = vec![QueryTerm::new("flow", 1.0), QueryTerm::new("channel", 0.5), QueryTerm::new("flow", 2.0)];
        assert_eq!(merge_terms(&q), vec![QueryTerm::new("flow", 3.0), QueryTerm::new("channel", 0.5)]);
        assert!(merge_terms(&[]).is_empty());
    }

    #[test]
    fn test_blend_zero_weight_is_identity() {
        let candidates = vec![
            Candidate { doc_id: 0, score: 0.25 },
            Candidate { doc_id: 1, score: 0.75 },
            Candidate { doc_id: 2, score: 0.5 },
        ];
        let ranked = blend_and_rank(candidates.clone(), |d| d as f64 * 10.0, 0.0, 10);
        for c in &candidates {
            let r = ranked.iter().find(|r| r.doc_id == c.doc_id).unwrap();
            assert_eq!(r.score, c.score);
        }
        assert_eq!(ranked.iter().map(|c| c.doc_id).collect::<Vec<_>>(), vec![1, 2, 0]);
    }

    #[test]
    fn test_blend_normalizes_within_candidates() {
        let candidates = vec![Candidate { doc_id: 0, score: 1.0 }, Candidate { doc_id: 1, score: 1.0 }];
        // doc 1 has the highest importance among the candidates: normalized to 1
        let ranked = blend_and_rank(candidates.clone(), |d| if d == 1 { 0.02 } else { 0.01 }, 0.5, 10);
        assert_eq!(ranked[0].doc_id, 1);
        assert!((ranked[0].score - 1.0).abs() < 1e-12);
        assert!((ranked[1].score - 0.75).abs() < 1e-12);
        // all-zero importance counts as max 1
        let ranked = blend_and_rank(candidates, |_| 0.0, 0.5, 10);
        assert!(ranked.iter().all(|c| (c.score - 0.5).abs() < 1e-12));
    }

    #[test]
    fn test_stable_tie_break_and_truncation() {
        let candidates: Vec<Candidate> = [3, 1, 2, 0].iter().map(|&d| Candidate { doc_id: d, score: 1.0 }).collect();
        let ranked = blend_and_rank(candidates, |_| 0.0, 0.0, 3);
        assert_eq!(ranked.iter().map(|c| c.doc_id).collect::<Vec<_>>(), vec![3, 1, 2]);
        assert!(blend_and_rank(vec![Candidate { doc_id: 0, score: 1.0 }], |_| 0.0, 0.0, 0).is_empty());
    }

    #[test]
    fn test_scenario_ranking() {
        let (_tmp, index) = scenario_index();
        let query = vec![QueryTerm::new("flow", 1.0)];
        for model in [RetrievalModel::Bm25, RetrievalModel::VectorSpace] {
            let ranked = run(&index, &query, model, 10, 0.0);
            assert_eq!(ids(&ranked), vec!["p1", "p0"], "{}", model);
            assert_eq!(ranked.total_matches, 2);
            assert!(ranked.results[0].score > ranked.results[1].score);
        }
        let ranked = run(&index, &query, RetrievalModel::Existential, 10, 0.0);
        let found: HashSet<String> = ids(&ranked).into_iter().collect();
        assert_eq!(found, HashSet::from(["p0".to_string(), "p1".to_string()]));
        assert!(ranked.results.iter().all(|r| r.score == 1.0));
    }

    #[test]
    fn test_duplicate_terms_equal_summed_weight() {
        let (_tmp, index) = scenario_index();
        let split = vec![QueryTerm::new("flow", 0.5), QueryTerm::new("channel", 1.0), QueryTerm::new("flow", 1.5)];
        let merged = vec![QueryTerm::new("flow", 2.0), QueryTerm::new("channel", 1.0)];
        for model in [RetrievalModel::Existential, RetrievalModel::VectorSpace, RetrievalModel::Bm25] {
            assert_eq!(run(&index, &split, model, 10, 0.3), run(&index, &merged, model, 10, 0.3));
        }
    }

    #[test]
    fn test_result_length_and_order() {
        let (_tmp, index) = scenario_index();
        let query = vec![QueryTerm::new("flow", 1.0), QueryTerm::new("channel", 1.0), QueryTerm::new("absent", 1.0)];
        for model in [RetrievalModel::Existential, RetrievalModel::VectorSpace, RetrievalModel::Bm25] {
            for top_k in 0..5 {
                let ranked = run(&index, &query, model, top_k, 0.2);
                assert_eq!(ranked.results.len(), top_k.min(3));
                assert!(ranked.results.windows(2).all(|w| w[0].score >= w[1].score));
            }
        }
        assert!(run(&index, &[QueryTerm::new("absent", 1.0)], RetrievalModel::Bm25, 10, 0.0).results.is_empty());
    }

    #[test]
    fn test_result_tiers() {
        let (_tmp, index) = scenario_index();
        let query = vec![QueryTerm::new("channel", 1.0)];
        let plain = run(&index, &query, RetrievalModel::Bm25, 1, 0.0);
        assert!(plain.results[0].doc.stats.is_none());
        let full = evaluate(&index, &query, RetrievalModel::Bm25, 1, DocTier::Display, 0.0, &Bm25Config::default()).unwrap();
        assert_eq!(full.results[0].doc.id, plain.results[0].doc.id);
        assert!(full.results[0].doc.stats.is_some());
        assert!(full.results[0].doc.details.is_some());
    }

    #[test]
    fn test_empty_document_never_matches() {
        let tmp = tempfile::tempdir().unwrap();
        let dest = tmp.path().join("index");
        let mut docs = fixtures::scenario_docs();
        docs.push(Document::new("p3", "Of the", ""));
        fixtures::build(&dest, &docs, 1000);
        let index = Index::open(&dest, &AtomicBool::new(false)).unwrap();
        assert_eq!(index.external_id(3), Some("p3"));
        assert_eq!(index.doc_stats(3).unwrap().length, 0);
        let query = vec![QueryTerm::new("flow", 1.0), QueryTerm::new("channel", 1.0), QueryTerm::new("quantum", 1.0)];
        for model in [RetrievalModel::Existential, RetrievalModel::VectorSpace, RetrievalModel::Bm25] {
            let ranked = run(&index, &query, model, 10, 0.5);
            assert_eq!(ranked.results.len(), 3);
            assert!(ranked.results.iter().all(|r| r.doc.doc_id != 3));
        }
    }

    #[test]
    fn test_importance_blend_reorders() {
        let (_tmp, index) = scenario_index();
        // p0 and p2 tie on existential; p1 is the most cited
        let query = vec![QueryTerm::new("quantum", 1.0), QueryTerm::new("channel", 1.0)];
        let ranked = run(&index, &query, RetrievalModel::Existential, 10, 1.0);
        assert_eq!(ranked.results[0].doc.id.as_ref(), "p1");
        assert!((ranked.results[0].score - 1.0).abs() < 1e-12);
    }
}
