use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use crate::ircore::doc::Document;
use crate::ircore::doc::dir::DirIter;
use crate::ircore::doc::jsonlines::JsonLines;

/// Reads every JSON-lines file under a corpus path (a file or a directory).
pub struct DocParser {
    path: PathBuf,
}

impl DocParser {
    pub fn new(path: &Path) -> Self {
        DocParser {
            path: path.to_path_buf(),
        }
    }

    pub fn docs(&self) -> impl Iterator<Item = Document> {
        DirIter::new(&self.path).flat_map(|file| {
            let source = file.to_string_lossy().to_string();
            match File::open(&file) {
                Ok(f) => Some(JsonLines::new(BufReader::new(f), &source)),
                Err(e) => {
                    log::error!("{}: {}", source, e);
                    None
                }
            }
        }).flatten()
    }
}
