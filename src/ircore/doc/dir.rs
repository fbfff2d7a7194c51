use std::collections::VecDeque;
use std::path::{Path, PathBuf};

/// Breadth-first walk over a corpus directory, yielding corpus files.
///
/// Directory entries are visited in sorted order so that two builds over the
/// same corpus assign the same doc ids.
pub struct DirIter {
    path_queue: VecDeque<PathBuf>,
}

impl DirIter {
    pub fn new(path: &Path) -> Self {
        DirIter {
            path_queue: VecDeque::from(vec!(path.to_path_buf())),
        }
    }
    fn ignore(path: &Path) -> bool {
        if let Some(filename) = path.file_name(){
            //by default, ignore hidden files on unix like platforms
            if filename.to_string_lossy().starts_with("."){
                return true;
            }
        }
        return false;
    }
}

impl Iterator for DirIter {
    type Item = PathBuf;
    fn next(&mut self) -> Option<Self::Item> {
        while let Some(path) = self.path_queue.pop_front() {
            if path.is_file() {
                return Some(path);
            }else if path.is_dir(){
                log::debug!("{}...", path.display());
                match path.read_dir() {
                    Ok(entries) => {
                        let mut children: Vec<PathBuf> = entries
                            .filter_map(|e| e.ok())
                            .map(|e| e.path())
                            .filter(|p| {
                                let hidden = Self::ignore(p);
                                if hidden {
                                    log::info!("ignore {}", p.display());
                                }
                                !hidden
                            })
                            .collect();
                        children.sort();
                        self.path_queue.extend(children);
                    },
                    Err(e) => log::error!("read dir {} failed: {}", path.display(), e),
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_ignore() {
        assert!(!DirIter::ignore(Path::new("./sample_corpus")));
        assert!(DirIter::ignore(Path::new("./sample_corpus/.paperir")));
        assert!(!DirIter::ignore(Path::new(".")));
        assert!(DirIter::ignore(Path::new("./.git")));
    }

    #[test]
    fn test_walk_sorted() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("b")).unwrap();
        fs::write(dir.path().join("b/s2-corpus-02"), "").unwrap();
        fs::write(dir.path().join("s2-corpus-01"), "").unwrap();
        fs::write(dir.path().join("a"), "").unwrap();
        fs::write(dir.path().join(".hidden"), "").unwrap();
        let files: Vec<PathBuf> = DirIter::new(dir.path()).collect();
        let names: Vec<String> = files.iter()
            .map(|p| p.strip_prefix(dir.path()).unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a", "s2-corpus-01", "b/s2-corpus-02"]);
    }
}
