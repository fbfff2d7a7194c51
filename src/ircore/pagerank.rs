use std::collections::HashMap;
use crate::ircore::common::DocId;
use crate::ircore::config::PageRankConfig;

/// Directed citation graph over dense doc ids. Edge `a -> b` means `a` cites `b`.
#[derive(Debug, Default)]
pub struct CitationGraph {
    out_edges: Vec<Vec<DocId>>,
    edge_count: usize,
}

impl CitationGraph {
    pub fn new(node_count: usize) -> Self {
        CitationGraph {
            out_edges: vec![Vec::new(); node_count],
            edge_count: 0,
        }
    }

    /// Builds the graph from per-document citation lists that reference
    /// external ids. `ids[i]` is the external id of doc `i`; citations to ids
    /// outside the corpus are dropped.
    pub fn from_citations<S: AsRef<str>>(ids: &[S], citations: &[(Vec<String>, Vec<String>)]) -> Self {
        let lookup: HashMap<&str, DocId> = ids.iter()
            .enumerate()
            .map(|(i, id)| (id.as_ref(), i as DocId))
            .collect();
        let mut graph = CitationGraph::new(ids.len());
        for (doc, (out_citations, in_citations)) in citations.iter().enumerate() {
            let doc = doc as DocId;
            for cited in out_citations {
                if let Some(&to) = lookup.get(cited.as_str()) {
                    graph.add_edge(doc, to);
                }
            }
            for citing in in_citations {
                if let Some(&from) = lookup.get(citing.as_str()) {
                    graph.add_edge(from, doc);
                }
            }
        }
        graph
    }

    pub fn add_edge(&mut self, from: DocId, to: DocId) {
        if from == to || from as usize >= self.out_edges.len() || to as usize >= self.out_edges.len() {
            return;
        }
        let edges = &mut self.out_edges[from as usize];
        if !edges.contains(&to) {
            edges.push(to);
            self.edge_count += 1;
        }
    }

    pub fn node_count(&self) -> usize {
        self.out_edges.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edge_count
    }

    pub fn out_degree(&self, node: DocId) -> usize {
        self.out_edges[node as usize].len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageRank {
    pub damping: f64,
    pub threshold: f64,
    pub max_iterations: usize,
}

#[derive(Debug)]
pub struct PageRankOutcome {
    pub scores: Vec<f64>,
    pub iterations: usize,
    pub delta: f64,
}

impl From<PageRankConfig> for PageRank {
    fn from(cfg: PageRankConfig) -> Self {
        PageRank {
            damping: cfg.damping,
            threshold: cfg.threshold,
            max_iterations: cfg.max_iterations,
        }
    }
}

impl PageRank {
    // Random surfer power iteration:
    //   pr'(i) = (1-d)/N + d * (sum_{j->i} pr(j)/out(j) + dangling/N)
    //   dangling: total score of nodes without outbound citations
    // stops when the L1 change drops below threshold or after max_iterations
    pub fn compute(&self, graph: &CitationGraph) -> PageRankOutcome {
        let n = graph.node_count();
        // without citations there is no importance to spread
        if graph.edge_count() == 0 {
            return PageRankOutcome { scores: vec![0.0; n], iterations: 0, delta: 0.0 };
        }
        let nf = n as f64;
        let mut scores = vec![1.0 / nf; n];
        let mut next = vec![0.0f64; n];
        let mut iterations = 0;
        let mut delta = f64::INFINITY;
        while iterations < self.max_iterations {
            let dangling: f64 = (0..n)
                .filter(|&i| graph.out_edges[i].is_empty())
                .map(|i| scores[i])
                .sum();
            let base = (1.0 - self.damping) / nf + self.damping * dangling / nf;
            next.iter_mut().for_each(|v| *v = base);
            for (from, edges) in graph.out_edges.iter().enumerate() {
                if edges.is_empty() {
                    continue;
                }
                let share = self.damping * scores[from] / edges.len() as f64;
                for &to in edges {
                    next[to as usize] += share;
                }
            }
            delta = scores.iter().zip(next.iter()).map(|(a, b)| (a - b).abs()).sum();
            std::mem::swap(&mut scores, &mut next);
            iterations += 1;
            log::debug!("pagerank iteration {}: delta {:e}", iterations, delta);
            if delta < self.threshold {
                break;
            }
        }
        PageRankOutcome { scores, iterations, delta }
    }
}
