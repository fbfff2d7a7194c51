use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use byteorder::{ByteOrder, LittleEndian, ReadBytesExt};
use memmap2::Mmap;
use crate::ircore::common::{DocId, DocTier};
use crate::ircore::error::{IndexError, Result};
use super::format::*;
use super::{DocInfo, PostingEntry, TermPostings};

// records read between two stop flag checks
const LOAD_CHUNK: usize = 4096;
// upper bound for preallocation from an untrusted record count
const MAX_PREALLOC: usize = 1 << 20;

/// A loaded, read-only index generation.
///
/// Lexicon, external ids, importance scores and the display offset table are
/// resident. Postings, the scoring tier and the display tier stay on disk
/// behind memory maps and are decoded on demand.
#[derive(Debug)]
pub struct Index {
    dir: PathBuf,
    meta: IndexMeta,
    lexicon: HashMap<String, TermEntry>,
    ids: Vec<Arc<str>>,
    pagerank: Vec<f64>,
    details_offsets: Vec<u64>,
    postings: Mmap,
    stats: Mmap,
    details: Mmap,
    avg_doc_length: f64,
}

fn check_stop(stop: &AtomicBool) -> Result<()> {
    if stop.load(Ordering::Relaxed) {
        return Err(IndexError::Cancelled);
    }
    Ok(())
}

fn expect_count(file: &IndexFile, found: u64, expected: u64) -> Result<()> {
    if found != expected {
        return Err(IndexError::corrupt(file.name,
            format!("record count {}, expected {}", found, expected)));
    }
    Ok(())
}

fn open_records(dir: &Path, file: &IndexFile, expected: u64) -> Result<BufReader<File>> {
    let mut reader = BufReader::new(File::open(dir.join(file.name))?);
    let count = read_header(&mut reader, file)?;
    expect_count(file, count, expected)?;
    Ok(reader)
}

fn map_records(dir: &Path, file: &IndexFile, expected: u64) -> Result<Mmap> {
    let f = File::open(dir.join(file.name))?;
    // index files are never modified in place, a rebuild swaps whole directories
    let mmap = unsafe { Mmap::map(&f)? };
    let count = read_header(&mut &mmap[..], file)?;
    expect_count(file, count, expected)?;
    Ok(mmap)
}

impl Index {
    /// Loads the generation under `dir`, checking `stop` between chunks.
    pub fn open(dir: &Path, stop: &AtomicBool) -> Result<Index> {
        let meta: IndexMeta = serde_json::from_reader(BufReader::new(File::open(dir.join(META_FILE))?))
            .map_err(|e| IndexError::corrupt(META_FILE, e.to_string()))?;
        if meta.version != FORMAT_VERSION {
            return Err(IndexError::corrupt(META_FILE, format!("unsupported format version {}", meta.version)));
        }
        let n = meta.documents as usize;
        check_stop(stop)?;

        let mut reader = open_records(dir, &DOC_IDS, meta.documents)?;
        let mut ids: Vec<Arc<str>> = Vec::with_capacity(n.min(MAX_PREALLOC));
        for i in 0..n {
            if i % LOAD_CHUNK == 0 {
                check_stop(stop)?;
            }
            ids.push(Arc::from(read_string(&mut reader, &DOC_IDS)?));
        }
        log::debug!("loaded {} document ids", ids.len());

        let mut reader = open_records(dir, &LEXICON, meta.terms)?;
        let mut lexicon = HashMap::with_capacity((meta.terms as usize).min(MAX_PREALLOC));
        for i in 0..meta.terms as usize {
            if i % LOAD_CHUNK == 0 {
                check_stop(stop)?;
            }
            let (term, entry) = TermEntry::read_from(&mut reader)?;
            if lexicon.insert(term, entry).is_some() {
                return Err(IndexError::corrupt(LEXICON.name, "duplicate term"));
            }
        }
        log::debug!("loaded {} lexicon entries", lexicon.len());

        let pagerank = read_f64s(dir, &PAGERANK, n, stop)?;
        let details_offsets = read_u64s(dir, &DOC_DETAILS_OFFSETS, n, stop)?;

        let postings = map_records(dir, &POSTINGS, meta.postings)?;
        let stats = map_records(dir, &DOC_STATS, meta.documents)?;
        let details = map_records(dir, &DOC_DETAILS, meta.documents)?;

        if stats.len() != HEADER_LEN + n * DOC_STATS_LEN {
            return Err(IndexError::corrupt(DOC_STATS.name, format!("length {} for {} documents", stats.len(), n)));
        }
        for (i, (term, entry)) in lexicon.iter().enumerate() {
            if i % LOAD_CHUNK == 0 {
                check_stop(stop)?;
            }
            let end = entry.offset.checked_add(entry.len);
            if entry.df == 0
                || entry.offset < HEADER_LEN as u64
                || entry.len != entry.df as u64 * POSTING_LEN as u64
                || end.map_or(true, |end| end > postings.len() as u64)
            {
                return Err(IndexError::corrupt(LEXICON.name, format!("bad postings range for term {}", term)));
            }
        }
        if details_offsets[0] != HEADER_LEN as u64
            || details_offsets.windows(2).any(|w| w[0] > w[1])
            || details_offsets[n] > details.len() as u64
        {
            return Err(IndexError::corrupt(DOC_DETAILS_OFFSETS.name, "offsets out of range"));
        }

        let mut total_length = 0u64;
        for (i, record) in stats[HEADER_LEN..].chunks_exact(DOC_STATS_LEN).enumerate() {
            if i % LOAD_CHUNK == 0 {
                check_stop(stop)?;
            }
            total_length += LittleEndian::read_u32(&record[..4]) as u64;
        }
        let avg_doc_length = if n == 0 { 0.0 } else { total_length as f64 / n as f64 };

        log::info!("index {} loaded: {} documents, {} terms, avg length {:.2}",
            dir.display(), n, lexicon.len(), avg_doc_length);
        Ok(Index {
            dir: dir.to_path_buf(),
            meta,
            lexicon,
            ids,
            pagerank,
            details_offsets,
            postings,
            stats,
            details,
            avg_doc_length,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn meta(&self) -> &IndexMeta {
        &self.meta
    }

    pub fn total_documents(&self) -> usize {
        self.ids.len()
    }

    pub fn term_count(&self) -> usize {
        self.lexicon.len()
    }

    pub fn avg_doc_length(&self) -> f64 {
        self.avg_doc_length
    }

    /// Citation importance; 0 for ids outside this generation.
    pub fn importance(&self, doc: DocId) -> f64 {
        self.pagerank.get(doc as usize).copied().unwrap_or(0.0)
    }

    pub fn external_id(&self, doc: DocId) -> Option<&str> {
        self.ids.get(doc as usize).map(|id| id.as_ref())
    }

    pub fn document_frequency(&self, term: &str) -> u32 {
        self.lexicon.get(term).map_or(0, |e| e.df)
    }

    pub fn postings(&self, term: &str) -> Vec<Posting> {
        let entry = match self.lexicon.get(term) {
            Some(entry) => entry,
            None => return vec![],
        };
        let start = entry.offset as usize;
        let end = start + entry.len as usize;
        self.postings[start..end]
            .chunks_exact(POSTING_LEN)
            .map(|c| Posting {
                doc_id: LittleEndian::read_u32(&c[..4]),
                tf: LittleEndian::read_u32(&c[4..]),
            })
            .collect()
    }

    pub fn doc_stats(&self, doc: DocId) -> Result<DocStats> {
        if doc as usize >= self.ids.len() {
            return Err(IndexError::corrupt(DOC_STATS.name, format!("doc id {} out of range", doc)));
        }
        let start = HEADER_LEN + doc as usize * DOC_STATS_LEN;
        DocStats::decode(&self.stats[start..start + DOC_STATS_LEN]).map_err(|e| truncated(&DOC_STATS, e))
    }

    pub fn doc_details(&self, doc: DocId) -> Result<DocDetails> {
        let i = doc as usize;
        if i >= self.ids.len() {
            return Err(IndexError::corrupt(DOC_DETAILS.name, format!("doc id {} out of range", doc)));
        }
        let start = self.details_offsets[i] as usize;
        let end = self.details_offsets[i + 1] as usize;
        bincode::deserialize(&self.details[start..end])
            .map_err(|e| IndexError::corrupt(DOC_DETAILS.name, format!("doc {}: {}", doc, e)))
    }

    /// Materializes `doc` at `tier`. Lower tiers never touch the richer stores.
    pub fn doc_info(&self, doc: DocId, tier: DocTier) -> Result<DocInfo> {
        let id = self.ids.get(doc as usize)
            .cloned()
            .ok_or_else(|| IndexError::corrupt(DOC_IDS.name, format!("doc id {} out of range", doc)))?;
        let stats = if tier >= DocTier::Scoring { Some(self.doc_stats(doc)?) } else { None };
        let details = if tier >= DocTier::Display { Some(self.doc_details(doc)?) } else { None };
        Ok(DocInfo { doc_id: doc, id, stats, details })
    }

    pub fn term_postings(&self, term: &str, tier: DocTier) -> Result<TermPostings> {
        let postings = self.postings(term);
        let mut entries = Vec::with_capacity(postings.len());
        for posting in postings {
            if posting.doc_id as usize >= self.ids.len() {
                log::warn!("term {}: posting for unknown doc {} skipped", term, posting.doc_id);
                continue;
            }
            entries.push(PostingEntry { posting, doc: self.doc_info(posting.doc_id, tier)? });
        }
        Ok(TermPostings {
            term: term.to_string(),
            df: self.document_frequency(term),
            entries,
        })
    }

    /// One entry per requested term, in request order. Unknown terms yield
    /// an empty list.
    pub fn fetch_terms(&self, terms: &[&str], tier: DocTier) -> Result<Vec<TermPostings>> {
        terms.iter().map(|t| self.term_postings(t, tier)).collect()
    }
}

fn read_f64s(dir: &Path, file: &IndexFile, n: usize, stop: &AtomicBool) -> Result<Vec<f64>> {
    let mut reader = open_records(dir, file, n as u64)?;
    let mut values = Vec::with_capacity(n.min(MAX_PREALLOC));
    for i in 0..n {
        if i % LOAD_CHUNK == 0 {
            check_stop(stop)?;
        }
        values.push(reader.read_f64::<LittleEndian>().map_err(|e| truncated(file, e))?);
    }
    expect_eof(&mut reader, file)?;
    Ok(values)
}

// the offset table holds one entry more than there are documents
fn read_u64s(dir: &Path, file: &IndexFile, n: usize, stop: &AtomicBool) -> Result<Vec<u64>> {
    let mut reader = open_records(dir, file, n as u64)?;
    let mut values = Vec::with_capacity((n + 1).min(MAX_PREALLOC));
    for i in 0..=n {
        if i % LOAD_CHUNK == 0 {
            check_stop(stop)?;
        }
        values.push(reader.read_u64::<LittleEndian>().map_err(|e| truncated(file, e))?);
    }
    expect_eof(&mut reader, file)?;
    Ok(values)
}

fn expect_eof<R: Read>(reader: &mut R, file: &IndexFile) -> Result<()> {
    let mut byte = [0u8; 1];
    if reader.read(&mut byte)? != 0 {
        return Err(IndexError::corrupt(file.name, "trailing bytes"));
    }
    Ok(())
}
