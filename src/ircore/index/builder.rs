use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use crate::ircore::common::DocId;
use crate::ircore::config::Config;
use crate::ircore::doc::Document;
use crate::ircore::error::{IndexError, Result};
use crate::ircore::pagerank::{CitationGraph, PageRank};
use crate::ircore::token::analyzer::Analyzer;
use super::format::*;

// terms merged between two stop flag checks
const MERGE_CHUNK: u64 = 4096;

type TermRun = Box<dyn Iterator<Item = Result<(String, Vec<Posting>)>>>;

/// Batch builder of one index generation.
///
/// Documents are consumed once, in order. Postings are buffered per term and
/// spilled to sorted partial runs under `<dest>.building` when the buffer
/// grows past `partial_index_postings`. [`IndexBuilder::finish`] merges the
/// runs, writes every artifact into the work directory and swaps it in place
/// of `dest`.
pub struct IndexBuilder {
    analyzer: Analyzer,
    pagerank: PageRank,
    spill_threshold: usize,
    dest: PathBuf,
    work_dir: PathBuf,
    ids: Vec<String>,
    seen: HashSet<String>,
    citations: Vec<(Vec<String>, Vec<String>)>,
    stats: Vec<DocStats>,
    details: Option<BufWriter<File>>,
    details_offsets: Vec<u64>,
    buffer: BTreeMap<String, Vec<Posting>>,
    buffered: usize,
    partials: Vec<PathBuf>,
    finished: bool,
}

impl IndexBuilder {
    pub fn new(cfg: &Config, analyzer: Analyzer, dest: &Path) -> Result<Self> {
        let work_dir = sibling(dest, "building")?;
        if work_dir.exists() {
            log::warn!("removing stale build directory {}", work_dir.display());
            fs::remove_dir_all(&work_dir)?;
        }
        fs::create_dir_all(&work_dir)?;
        let mut details = BufWriter::new(File::create(work_dir.join(DOC_DETAILS.name))?);
        write_header(&mut details, &DOC_DETAILS, 0)?;
        Ok(IndexBuilder {
            analyzer,
            pagerank: PageRank::from(cfg.pagerank),
            spill_threshold: cfg.partial_index_postings.max(1),
            dest: dest.to_path_buf(),
            work_dir,
            ids: vec![],
            seen: HashSet::new(),
            citations: vec![],
            stats: vec![],
            details: Some(details),
            details_offsets: vec![HEADER_LEN as u64],
            buffer: BTreeMap::new(),
            buffered: 0,
            partials: vec![],
            finished: false,
        })
    }

    pub fn document_count(&self) -> usize {
        self.ids.len()
    }

    /// Directory the artifacts are written to before the swap.
    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    /// Adds one document and returns its dense id, or `None` when the
    /// external id was already indexed.
    pub fn add_document(&mut self, doc: &Document) -> Result<Option<DocId>> {
        if doc.id.len() > MAX_STRING_LEN {
            log::warn!("document id of {} bytes exceeds {}, skipped", doc.id.len(), MAX_STRING_LEN);
            return Ok(None);
        }
        if self.seen.contains(&doc.id) {
            log::warn!("duplicate document id {}, skipped", doc.id);
            return Ok(None);
        }
        let doc_id = self.ids.len() as DocId;

        let mut tf: HashMap<String, u32> = HashMap::new();
        let mut length = 0u32;
        let title = self.analyzer.analyze(&doc.title);
        let paper_abstract = self.analyzer.analyze(&doc.paper_abstract);
        for term in title.into_iter().chain(paper_abstract) {
            if term.len() > MAX_STRING_LEN {
                log::warn!("term of {} bytes in document {} dropped", term.len(), doc.id);
                continue;
            }
            *tf.entry(term).or_insert(0) += 1;
            length += 1;
        }
        let max_tf = tf.values().copied().max().unwrap_or(0);
        for (term, freq) in tf {
            self.buffer.entry(term).or_insert_with(Vec::new).push(Posting { doc_id, tf: freq });
            self.buffered += 1;
        }

        let bytes = bincode::serialize(&DocDetails::from(doc))?;
        let details = self.details.as_mut()
            .ok_or_else(|| IndexError::IllegalState("builder already finished".to_string()))?;
        details.write_all(&bytes)?;
        let end = self.details_offsets.last().copied().unwrap_or(HEADER_LEN as u64) + bytes.len() as u64;
        self.details_offsets.push(end);

        self.ids.push(doc.id.clone());
        self.seen.insert(doc.id.clone());
        self.citations.push((doc.out_citations.clone(), doc.in_citations.clone()));
        self.stats.push(DocStats { length, max_tf, norm: 0.0 });

        if self.buffered >= self.spill_threshold {
            self.spill()?;
        }
        Ok(Some(doc_id))
    }

    /// Consumes `docs`, checking `stop` before every document.
    pub fn build_from<I>(mut self, docs: I, stop: &AtomicBool) -> Result<IndexMeta>
    where
        I: IntoIterator<Item = Document>,
    {
        for doc in docs {
            if stop.load(Ordering::Relaxed) {
                log::info!("build cancelled after {} documents", self.ids.len());
                return Err(IndexError::Cancelled);
            }
            if self.add_document(&doc)?.is_some() && self.ids.len() % 1000 == 0 {
                log::debug!("{} documents indexed", self.ids.len());
            }
        }
        self.finish(stop)
    }

    fn spill(&mut self) -> Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let path = self.work_dir.join(format!("partial-{:04}.run", self.partials.len()));
        let mut w = BufWriter::new(File::create(&path)?);
        write_header(&mut w, &PARTIAL_RUN, self.buffer.len() as u64)?;
        for (term, postings) in std::mem::take(&mut self.buffer) {
            write_string(&mut w, &term)?;
            w.write_u32::<LittleEndian>(postings.len() as u32)?;
            for p in &postings {
                p.write_to(&mut w)?;
            }
        }
        w.flush()?;
        log::info!("spilled {} postings to {}", self.buffered, path.display());
        self.buffered = 0;
        self.partials.push(path);
        Ok(())
    }

    /// Writes all artifacts and atomically replaces `dest`.
    pub fn finish(mut self, stop: &AtomicBool) -> Result<IndexMeta> {
        let n = self.ids.len();
        let nf = n as f64;

        let details = self.details.take()
            .ok_or_else(|| IndexError::IllegalState("builder already finished".to_string()))?;
        rewrite_header(details, &DOC_DETAILS, n as u64)?;

        let mut w = create_file(&self.work_dir, &DOC_DETAILS_OFFSETS, n as u64)?;
        for offset in &self.details_offsets {
            w.write_u64::<LittleEndian>(*offset)?;
        }
        sync_file(w)?;

        // k-way merge of the spilled runs followed by the in-memory remainder
        let mut runs: Vec<TermRun> = vec![];
        for path in &self.partials {
            runs.push(Box::new(PartialRun::open(path)?));
        }
        runs.push(Box::new(std::mem::take(&mut self.buffer).into_iter().map(Ok::<_, IndexError>)));
        let mut merger = RunMerger::new(runs)?;

        let mut postings_w = create_file(&self.work_dir, &POSTINGS, 0)?;
        let mut lexicon_w = create_file(&self.work_dir, &LEXICON, 0)?;
        let mut offset = HEADER_LEN as u64;
        let mut terms = 0u64;
        let mut total_postings = 0u64;
        let mut norms = vec![0f64; n];
        while let Some((term, postings)) = merger.next_term()? {
            if terms % MERGE_CHUNK == 0 && stop.load(Ordering::Relaxed) {
                log::info!("build cancelled while merging postings");
                return Err(IndexError::Cancelled);
            }
            debug_assert!(postings.windows(2).all(|p| p[0].doc_id < p[1].doc_id));
            let df = postings.len() as u32;
            let idf = (nf / df as f64).ln();
            for p in &postings {
                let w = (1.0 + (p.tf as f64).ln()) * idf;
                norms[p.doc_id as usize] += w * w;
                p.write_to(&mut postings_w)?;
            }
            let len = (postings.len() * POSTING_LEN) as u64;
            TermEntry { df, offset, len }.write_to(&mut lexicon_w, &term)?;
            offset += len;
            terms += 1;
            total_postings += df as u64;
        }
        rewrite_header(postings_w, &POSTINGS, total_postings)?;
        rewrite_header(lexicon_w, &LEXICON, terms)?;
        drop(merger);
        for path in &self.partials {
            fs::remove_file(path)?;
        }

        let mut w = create_file(&self.work_dir, &DOC_IDS, n as u64)?;
        for id in &self.ids {
            write_string(&mut w, id)?;
        }
        sync_file(w)?;

        let mut w = create_file(&self.work_dir, &DOC_STATS, n as u64)?;
        let mut total_length = 0u64;
        for (stats, norm) in self.stats.iter().zip(norms) {
            total_length += stats.length as u64;
            DocStats { norm: norm.sqrt(), ..*stats }.write_to(&mut w)?;
        }
        sync_file(w)?;

        let graph = CitationGraph::from_citations(&self.ids, &self.citations);
        let outcome = self.pagerank.compute(&graph);
        log::info!("pagerank over {} citations: {} iterations, delta {:e}",
            graph.edge_count(), outcome.iterations, outcome.delta);
        let mut w = create_file(&self.work_dir, &PAGERANK, n as u64)?;
        for score in &outcome.scores {
            w.write_f64::<LittleEndian>(*score)?;
        }
        sync_file(w)?;

        let meta = IndexMeta {
            version: FORMAT_VERSION,
            documents: n as u64,
            terms,
            postings: total_postings,
            total_length,
            created: SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0),
        };
        let f = File::create(self.work_dir.join(META_FILE))?;
        serde_json::to_writer_pretty(&f, &meta)?;
        f.sync_all()?;

        self.swap()?;
        self.finished = true;
        log::info!("index with {} documents and {} terms written to {}", n, terms, self.dest.display());
        Ok(meta)
    }

    // dest -> dest.previous, work dir -> dest, drop previous
    fn swap(&self) -> Result<()> {
        let previous = sibling(&self.dest, "previous")?;
        if previous.exists() {
            fs::remove_dir_all(&previous)?;
        }
        if self.dest.exists() {
            fs::rename(&self.dest, &previous)?;
        }
        fs::rename(&self.work_dir, &self.dest)?;
        if previous.exists() {
            if let Err(e) = fs::remove_dir_all(&previous) {
                log::warn!("cannot remove previous index {}: {}", previous.display(), e);
            }
        }
        Ok(())
    }
}

impl Drop for IndexBuilder {
    fn drop(&mut self) {
        if !self.finished && self.work_dir.exists() {
            log::debug!("discarding unfinished build {}", self.work_dir.display());
            let _ = fs::remove_dir_all(&self.work_dir);
        }
    }
}

fn sibling(dest: &Path, suffix: &str) -> Result<PathBuf> {
    let name = dest.file_name()
        .ok_or_else(|| IndexError::Config(format!("invalid index directory {}", dest.display())))?;
    Ok(dest.with_file_name(format!("{}.{}", name.to_string_lossy(), suffix)))
}

fn create_file(dir: &Path, file: &IndexFile, count: u64) -> Result<BufWriter<File>> {
    let mut w = BufWriter::new(File::create(dir.join(file.name))?);
    write_header(&mut w, file, count)?;
    Ok(w)
}

fn sync_file(w: BufWriter<File>) -> Result<()> {
    let f = w.into_inner().map_err(|e| IndexError::Io(e.into_error()))?;
    f.sync_all()?;
    Ok(())
}

// record counts of streamed files are only known at the end
fn rewrite_header(mut w: BufWriter<File>, file: &IndexFile, count: u64) -> Result<()> {
    w.seek(SeekFrom::Start(0))?;
    write_header(&mut w, file, count)?;
    sync_file(w)
}

/// Reads back one spilled run, term by term.
struct PartialRun {
    reader: BufReader<File>,
    remaining: u64,
}

impl PartialRun {
    fn open(path: &Path) -> Result<Self> {
        let mut reader = BufReader::new(File::open(path)?);
        let remaining = read_header(&mut reader, &PARTIAL_RUN)?;
        Ok(PartialRun { reader, remaining })
    }

    fn read_term(&mut self) -> Result<(String, Vec<Posting>)> {
        let term = read_string(&mut self.reader, &PARTIAL_RUN)?;
        let count = self.reader.read_u32::<LittleEndian>().map_err(|e| truncated(&PARTIAL_RUN, e))?;
        let mut postings = Vec::with_capacity(count as usize);
        for _ in 0..count {
            postings.push(Posting::read_from(&mut self.reader).map_err(|e| truncated(&PARTIAL_RUN, e))?);
        }
        Ok((term, postings))
    }
}

impl Iterator for PartialRun {
    type Item = Result<(String, Vec<Posting>)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        Some(self.read_term())
    }
}

/// Merges term-sorted runs. Postings of a term are concatenated in run
/// order, so they stay ascending when runs cover ascending doc id ranges.
struct RunMerger {
    runs: Vec<TermRun>,
    heads: Vec<Option<(String, Vec<Posting>)>>,
}

impl RunMerger {
    fn new(mut runs: Vec<TermRun>) -> Result<Self> {
        let mut heads = Vec::with_capacity(runs.len());
        for run in runs.iter_mut() {
            heads.push(run.next().transpose()?);
        }
        Ok(RunMerger { runs, heads })
    }

    fn next_term(&mut self) -> Result<Option<(String, Vec<Posting>)>> {
        let term = match self.heads.iter().flatten().map(|(t, _)| t).min() {
            Some(t) => t.clone(),
            None => return Ok(None),
        };
        let mut merged = vec![];
        for i in 0..self.runs.len() {
            if !matches!(&self.heads[i], Some((t, _)) if *t == term) {
                continue;
            }
            if let Some((_, postings)) = self.heads[i].take() {
                merged.extend(postings);
            }
            self.heads[i] = self.runs[i].next().transpose()?;
        }
        Ok(Some((term, merged)))
    }
}
