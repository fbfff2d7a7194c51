use crate::ircore::index::TermPostings;
use super::{Accumulator, Candidate, CollectionStats, QueryTerm, ScoringParams};

// Vector space model, cosine similarity computed term at a time:
//   w(t,d) = (1 + ln tf) * ln(N/df)
//   w(t,q) = weight * ln(N/df)
//   score(d) = sum_t w(t,q) * w(t,d) / (|q| * |d|)
// |d| is precomputed at build time over all terms of d.
pub fn rank_vsm(
    query: &[QueryTerm],
    postings: &[TermPostings],
    collection: &CollectionStats,
    _params: &ScoringParams,
) -> Vec<Candidate> {
    let n = collection.documents as f64;
    let mut acc = Accumulator::new();
    let mut query_norm = 0f64;
    for (qt, term) in query.iter().zip(postings) {
        if term.df == 0 {
            continue;
        }
        let idf = (n / term.df as f64).ln();
        let wq = qt.weight * idf;
        query_norm += wq * wq;
        for entry in &term.entries {
            let wd = (1.0 + (entry.posting.tf as f64).ln()) * idf;
            let doc_norm = entry.doc.stats.map_or(0.0, |s| s.norm);
            let partial = if doc_norm > 0.0 { wq * wd / doc_norm } else { 0.0 };
            acc.add(entry.posting.doc_id, partial);
        }
    }
    let query_norm = query_norm.sqrt();
    let mut candidates = acc.into_candidates();
    for c in candidates.iter_mut() {
        c.score = if query_norm > 0.0 { c.score / query_norm } else { 0.0 };
    }
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ircore::config::Bm25Config;
    use crate::ircore::ranking::testutil::term_postings;

    #[test]
    fn test_vsm() {
        let n = 3.0f64;
        let idf_flow = (n / 2.0).ln();
        let idf_quantum = n.ln();
        // doc0 = {quantum, flow}, doc1 = {flow x2, channel}
        let norm0 = (idf_quantum.powi(2) + idf_flow.powi(2)).sqrt();
        let norm1 = (((1.0 + 2f64.ln()) * idf_flow).powi(2) + idf_flow.powi(2)).sqrt();
        let postings = vec![term_postings("flow", &[(0, 1, 2, norm0), (1, 2, 3, norm1)])];
        let query = vec![QueryTerm::new("flow", 1.0)];
        let collection = CollectionStats { documents: 3, avg_doc_length: 2.0 };
        let params = ScoringParams { top_k: 10, bm25: Bm25Config::default() };
        let scores = rank_vsm(&query, &postings, &collection, &params);
        assert_eq!(scores.len(), 2);
        let epsilon = 1e-9;
        assert!((scores[0].score - idf_flow / norm0).abs() <= epsilon);
        assert!((scores[1].score - (1.0 + 2f64.ln()) * idf_flow / norm1).abs() <= epsilon);
        assert!(scores[1].score > scores[0].score);
        // cosine is bounded by 1
        assert!(scores.iter().all(|c| c.score <= 1.0 + epsilon));
    }

    #[test]
    fn test_zero_norms_score_zero() {
        // a term in every document has idf 0
        let postings = vec![term_postings("flow", &[(0, 1, 1, 0.0), (1, 1, 1, 0.0)])];
        let query = vec![QueryTerm::new("flow", 1.0)];
        let collection = CollectionStats { documents: 2, avg_doc_length: 1.0 };
        let params = ScoringParams { top_k: 10, bm25: Bm25Config::default() };
        let scores = rank_vsm(&query, &postings, &collection, &params);
        assert_eq!(scores.len(), 2);
        assert!(scores.iter().all(|c| c.score == 0.0));
    }
}
