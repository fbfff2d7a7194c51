use std::io::BufRead;
use crate::ircore::doc::Document;

/// Streams documents out of a JSON-lines source, one record per line.
///
/// Malformed lines and records without an id are logged and skipped, so a
/// single bad record never aborts a build.
pub struct JsonLines<R> {
    reader: R,
    source: String,
    line_no: usize,
    buf: String,
}

impl<R: BufRead> JsonLines<R> {
    pub fn new(reader: R, source: &str) -> Self {
        JsonLines {
            reader,
            source: source.to_string(),
            line_no: 0,
            buf: String::new(),
        }
    }
}

impl<R: BufRead> Iterator for JsonLines<R> {
    type Item = Document;
    fn next(&mut self) -> Option<Self::Item> {
        loop {
            self.buf.clear();
            match self.reader.read_line(&mut self.buf) {
                Ok(0) => return None,
                Ok(_) => {
                    self.line_no += 1;
                    let line = self.buf.trim();
                    if line.is_empty() {
                        continue;
                    }
                    match serde_json::from_str::<Document>(line) {
                        Ok(doc) if doc.id.is_empty() => {
                            log::warn!("{}:{}: record without id skipped", self.source, self.line_no);
                        },
                        Ok(doc) => return Some(doc),
                        Err(e) => log::warn!("{}:{}: {}", self.source, self.line_no, e),
                    }
                },
                Err(e) => {
                    log::error!("{}:{}: {}", self.source, self.line_no + 1, e);
                    return None;
                }
            }
        }
    }
}
