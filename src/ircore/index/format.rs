//! On-disk layout of an index generation.
//!
//! Every binary file starts with a 16 byte header: a 4 byte magic, the `u32`
//! format version and the `u64` record count, little endian. The records that
//! follow are:
//!
//! | file | record |
//! |---|---|
//! | `lexicon.idx` | `u32 len, term, u32 df, u64 offset, u64 byte_len`, sorted by term |
//! | `postings.idx` | `u32 doc_id, u32 tf`, contiguous per term, ascending doc id |
//! | `doc_ids.idx` | `u32 len, external id` |
//! | `doc_stats.idx` | `u32 length, u32 max_tf, f64 vsm_norm` (fixed width) |
//! | `doc_details.idx` | bincode encoded [`DocDetails`], back to back |
//! | `doc_details.off` | `count + 1` `u64` offsets into `doc_details.idx` |
//! | `pagerank.idx` | `f64` per doc |
//!
//! `meta.json` summarizes the generation.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use serde::{Serialize, Deserialize};
use std::io::{self, Read, Write};
use crate::ircore::common::DocId;
use crate::ircore::doc::{Author, Document};
use crate::ircore::error::{IndexError, Result};

pub const FORMAT_VERSION: u32 = 1;
pub const HEADER_LEN: usize = 16;
pub const POSTING_LEN: usize = 8;
pub const DOC_STATS_LEN: usize = 16;
/// Longest term or external id, in bytes, an index may hold.
pub const MAX_STRING_LEN: usize = 1 << 20;

pub const META_FILE: &str = "meta.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexFile {
    pub name: &'static str,
    pub magic: [u8; 4],
}

pub const LEXICON: IndexFile = IndexFile { name: "lexicon.idx", magic: *b"PLEX" };
pub const POSTINGS: IndexFile = IndexFile { name: "postings.idx", magic: *b"PPST" };
pub const DOC_IDS: IndexFile = IndexFile { name: "doc_ids.idx", magic: *b"PDID" };
pub const DOC_STATS: IndexFile = IndexFile { name: "doc_stats.idx", magic: *b"PDST" };
pub const DOC_DETAILS: IndexFile = IndexFile { name: "doc_details.idx", magic: *b"PDDT" };
pub const DOC_DETAILS_OFFSETS: IndexFile = IndexFile { name: "doc_details.off", magic: *b"PDOF" };
pub const PAGERANK: IndexFile = IndexFile { name: "pagerank.idx", magic: *b"PPRK" };

// spill file of the builder, never part of a finished index
pub const PARTIAL_RUN: IndexFile = IndexFile { name: "partial.run", magic: *b"PRUN" };

pub fn write_header<W: Write>(w: &mut W, file: &IndexFile, count: u64) -> io::Result<()> {
    w.write_all(&file.magic)?;
    w.write_u32::<LittleEndian>(FORMAT_VERSION)?;
    w.write_u64::<LittleEndian>(count)
}

/// Validates the header and returns the record count.
pub fn read_header<R: Read>(r: &mut R, file: &IndexFile) -> Result<u64> {
    let mut magic = [0u8; 4];
    r.read_exact(&mut magic).map_err(|e| truncated(file, e))?;
    if magic != file.magic {
        return Err(IndexError::corrupt(file.name, format!("bad magic {:?}", magic)));
    }
    let version = r.read_u32::<LittleEndian>().map_err(|e| truncated(file, e))?;
    if version != FORMAT_VERSION {
        return Err(IndexError::corrupt(file.name, format!("unsupported format version {}", version)));
    }
    r.read_u64::<LittleEndian>().map_err(|e| truncated(file, e))
}

/// Running out of bytes mid-record means the file is corrupt, not an I/O failure.
pub fn truncated(file: &IndexFile, e: io::Error) -> IndexError {
    if e.kind() == io::ErrorKind::UnexpectedEof {
        IndexError::corrupt(file.name, "unexpected end of file")
    } else {
        IndexError::Io(e)
    }
}

pub fn write_string<W: Write>(w: &mut W, s: &str) -> io::Result<()> {
    if s.len() > MAX_STRING_LEN {
        return Err(io::Error::new(io::ErrorKind::InvalidInput,
            format!("string of {} bytes exceeds {}", s.len(), MAX_STRING_LEN)));
    }
    w.write_u32::<LittleEndian>(s.len() as u32)?;
    w.write_all(s.as_bytes())
}

pub fn read_string<R: Read>(r: &mut R, file: &IndexFile) -> Result<String> {
    let len = r.read_u32::<LittleEndian>().map_err(|e| truncated(file, e))?;
    if len as usize > MAX_STRING_LEN {
        return Err(IndexError::corrupt(file.name, format!("string length {} out of range", len)));
    }
    let mut buf = vec![0u8; len as usize];
    r.read_exact(&mut buf).map_err(|e| truncated(file, e))?;
    String::from_utf8(buf).map_err(|_| IndexError::corrupt(file.name, "invalid utf-8"))
}

/// One `(doc, term frequency)` entry of a postings list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Posting {
    pub doc_id: DocId,
    pub tf: u32,
}

impl Posting {
    pub fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_u32::<LittleEndian>(self.doc_id)?;
        w.write_u32::<LittleEndian>(self.tf)
    }

    pub fn read_from<R: Read>(r: &mut R) -> io::Result<Posting> {
        let doc_id = r.read_u32::<LittleEndian>()?;
        let tf = r.read_u32::<LittleEndian>()?;
        Ok(Posting { doc_id, tf })
    }
}

/// Lexicon value: where a term's postings live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TermEntry {
    pub df: u32,
    pub offset: u64,
    pub len: u64,
}

impl TermEntry {
    pub fn write_to<W: Write>(&self, w: &mut W, term: &str) -> io::Result<()> {
        write_string(w, term)?;
        w.write_u32::<LittleEndian>(self.df)?;
        w.write_u64::<LittleEndian>(self.offset)?;
        w.write_u64::<LittleEndian>(self.len)
    }

    pub fn read_from<R: Read>(r: &mut R) -> Result<(String, TermEntry)> {
        let term = read_string(r, &LEXICON)?;
        let df = r.read_u32::<LittleEndian>().map_err(|e| truncated(&LEXICON, e))?;
        let offset = r.read_u64::<LittleEndian>().map_err(|e| truncated(&LEXICON, e))?;
        let len = r.read_u64::<LittleEndian>().map_err(|e| truncated(&LEXICON, e))?;
        Ok((term, TermEntry { df, offset, len }))
    }
}

/// Scoring tier: what a ranking model needs without touching text.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DocStats {
    // number of indexed terms (title + abstract, after stop words)
    pub length: u32,
    pub max_tf: u32,
    // euclidean length of the tf-idf document vector
    pub norm: f64,
}

impl DocStats {
    pub fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_u32::<LittleEndian>(self.length)?;
        w.write_u32::<LittleEndian>(self.max_tf)?;
        w.write_f64::<LittleEndian>(self.norm)
    }

    pub fn decode(mut bytes: &[u8]) -> io::Result<DocStats> {
        let length = bytes.read_u32::<LittleEndian>()?;
        let max_tf = bytes.read_u32::<LittleEndian>()?;
        let norm = bytes.read_f64::<LittleEndian>()?;
        Ok(DocStats { length, max_tf, norm })
    }
}

/// Display tier: the original fields, only read for final results.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DocDetails {
    pub title: String,
    pub paper_abstract: String,
    pub authors: Vec<Author>,
    pub year: i32,
    pub venue: String,
    pub journal_name: String,
    pub entities: Vec<String>,
    pub fields_of_study: Vec<String>,
    pub sources: Vec<String>,
}

impl From<&Document> for DocDetails {
    fn from(doc: &Document) -> Self {
        DocDetails {
            title: doc.title.clone(),
            paper_abstract: doc.paper_abstract.clone(),
            authors: doc.authors.clone(),
            year: doc.year,
            venue: doc.venue.clone(),
            journal_name: doc.journal_name.clone(),
            entities: doc.entities.clone(),
            fields_of_study: doc.fields_of_study.clone(),
            sources: doc.sources.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexMeta {
    pub version: u32,
    pub documents: u64,
    pub terms: u64,
    pub postings: u64,
    pub total_length: u64,
    // seconds since the unix epoch
    pub created: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_header() {
        let mut buf = vec![];
        write_header(&mut buf, &LEXICON, 42).unwrap();
        assert_eq!(buf.len(), HEADER_LEN);
        assert_eq!(read_header(&mut Cursor::new(&buf), &LEXICON).unwrap(), 42);
        match read_header(&mut Cursor::new(&buf), &POSTINGS) {
            Err(IndexError::Corrupt { file, .. }) => assert_eq!(file, "postings.idx"),
            other => panic!("unexpected {:?}", other),
        }
        match read_header(&mut Cursor::new(&buf[..10]), &LEXICON) {
            Err(IndexError::Corrupt { reason, .. }) => assert_eq!(reason, "unexpected end of file"),
            other => panic!("unexpected {:?}", other),
        }
        buf[4] = 9;
        assert!(matches!(read_header(&mut Cursor::new(&buf), &LEXICON), Err(IndexError::Corrupt { .. })));
    }

    #[test]
    fn test_lexicon_entry_layout() {
        let mut buf = vec![];
        let entry = TermEntry { df: 3, offset: 16, len: 24 };
        entry.write_to(&mut buf, "helical").unwrap();
        assert_eq!(buf.len(), 4 + 7 + 4 + 8 + 8);
        let (term, read) = TermEntry::read_from(&mut Cursor::new(&buf)).unwrap();
        assert_eq!(term, "helical");
        assert_eq!(read, entry);
        assert!(matches!(TermEntry::read_from(&mut Cursor::new(&buf[..12])), Err(IndexError::Corrupt { .. })));
    }

    #[test]
    fn test_fixed_width_records() {
        let mut buf = vec![];
        Posting { doc_id: 7, tf: 2 }.write_to(&mut buf).unwrap();
        assert_eq!(buf.len(), POSTING_LEN);
        buf.clear();
        let stats = DocStats { length: 12, max_tf: 3, norm: 1.5 };
        stats.write_to(&mut buf).unwrap();
        assert_eq!(buf.len(), DOC_STATS_LEN);
        assert_eq!(DocStats::decode(&buf).unwrap(), stats);
    }

    #[test]
    fn test_oversized_string_is_corrupt() {
        let mut buf = vec![];
        buf.write_u32::<LittleEndian>(u32::MAX).unwrap();
        assert!(matches!(read_string(&mut Cursor::new(&buf), &DOC_IDS), Err(IndexError::Corrupt { .. })));
    }

    #[test]
    fn test_oversized_string_is_not_written() {
        let mut buf = vec![];
        let err = write_string(&mut buf, &"a".repeat(MAX_STRING_LEN + 1)).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
        assert!(buf.is_empty());
        write_string(&mut buf, &"a".repeat(MAX_STRING_LEN)).unwrap();
        assert_eq!(read_string(&mut Cursor::new(&buf), &DOC_IDS).unwrap().len(), MAX_STRING_LEN);
    }
}
