use crate::ircore::index::TermPostings;
use super::{Accumulator, Candidate, CollectionStats, QueryTerm, ScoringParams};

// The BM25 algorithm
// for all term t sum qt * idf * ftd*(k1+1) / (ftd + k1*(1-b+b*(ld/lavg)))
//   qt: query term weight
//   ftd: frequency of t in d
//   idf: ln(1 + (N - Nt + 0.5)/(Nt + 0.5)), never negative
//   k1: weight saturation factor, default 1.2
//   b: level of normalization of document length, default 0.75
//   ld, lavg: length of d and average length over the collection
pub fn rank_bm25(
    query: &[QueryTerm],
    postings: &[TermPostings],
    collection: &CollectionStats,
    params: &ScoringParams,
) -> Vec<Candidate> {
    let k1 = params.bm25.k1;
    let b = params.bm25.b;
    let n = collection.documents as f64;
    let lavg = collection.avg_doc_length;
    let mut acc = Accumulator::new();
    for (qt, term) in query.iter().zip(postings) {
        if term.df == 0 {
            continue;
        }
        let nt = term.df as f64;
        let idf = (1.0 + (n - nt + 0.5) / (nt + 0.5)).ln();
        for entry in &term.entries {
            let ftd = entry.posting.tf as f64;
            let ld = entry.doc.stats.map_or(0.0, |s| s.length as f64);
            let ratio = if lavg > 0.0 { ld / lavg } else { 1.0 };
            let score = qt.weight * idf * ftd * (k1 + 1.0) / (ftd + k1 * (1.0 - b + b * ratio));
            acc.add(entry.posting.doc_id, score);
        }
    }
    acc.into_candidates()
}
