use crate::ircore::index::TermPostings;
use super::{Accumulator, Candidate, CollectionStats, QueryTerm, ScoringParams};

// Set membership: every document containing at least one query term scores 1.
//
// Documents are collected in the order postings are scanned (query term
// order, then ascending doc id) and scanning stops once top_k are collected.
// Which of the equally scored matches survive therefore depends on scan
// order; this is an accepted approximation, not a ranking.
pub fn rank_existential(
    _query: &[QueryTerm],
    postings: &[TermPostings],
    _collection: &CollectionStats,
    params: &ScoringParams,
) -> Vec<Candidate> {
    let mut acc = Accumulator::new();
    if params.top_k == 0 {
        return acc.into_candidates();
    }
    'scan: for term in postings {
        for entry in &term.entries {
            if acc.contains(entry.posting.doc_id) {
                continue;
            }
            acc.add(entry.posting.doc_id, 1.0);
            if acc.len() == params.top_k {
                break 'scan;
            }
        }
    }
    acc.into_candidates()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ircore::config::Bm25Config;
    use crate::ircore::ranking::testutil::term_postings;

    fn params(top_k: usize) -> ScoringParams {
        ScoringParams { top_k, bm25: Bm25Config::default() }
    }

    #[test]
    fn test_membership() {
        let postings = vec![
            term_postings("flow", &[(0, 1, 2, 1.0), (1, 2, 3, 1.0)]),
            term_postings("channel", &[(1, 1, 3, 1.0), (2, 1, 1, 1.0)]),
        ];
        let collection = CollectionStats { documents: 4, avg_doc_length: 2.0 };
        let found = rank_existential(&[], &postings, &collection, &params(10));
        assert_eq!(found.iter().map(|c| c.doc_id).collect::<Vec<_>>(), vec![0, 1, 2]);
        assert!(found.iter().all(|c| c.score == 1.0));
        // doc 3 has no query term and never shows up
        assert!(found.iter().all(|c| c.doc_id != 3));
    }

    #[test]
    fn test_stops_at_top_k() {
        let postings = vec![
            term_postings("flow", &[(0, 1, 2, 1.0), (1, 2, 3, 1.0)]),
            term_postings("channel", &[(2, 1, 1, 1.0)]),
        ];
        let collection = CollectionStats { documents: 3, avg_doc_length: 2.0 };
        let found = rank_existential(&[], &postings, &collection, &params(2));
        assert_eq!(found.iter().map(|c| c.doc_id).collect::<Vec<_>>(), vec![0, 1]);
        assert!(rank_existential(&[], &postings, &collection, &params(0)).is_empty());
    }
}
