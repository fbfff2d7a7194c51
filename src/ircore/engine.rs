use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use crate::ircore::common::{DocId, DocTier, RetrievalModel};
use crate::ircore::config::Config;
use crate::ircore::doc::doc_parser::DocParser;
use crate::ircore::error::{IndexError, Result};
use crate::ircore::index::{Index, IndexBuilder, IndexMeta, TermPostings};
use crate::ircore::ranking::{self, QueryTerm, Ranked};
use crate::ircore::token::analyzer::Analyzer;

/// Lifecycle of the served index, as seen by callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexState {
    Unloaded,
    Loading,
    Loaded,
    Unloading,
    Failed,
}

impl fmt::Display for IndexState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Kind of background work the engine runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Task {
    Build,
    Load,
}

// the served snapshot; only Loaded carries an index
enum Slot {
    Unloaded,
    Loading,
    Loaded(Index),
    Unloading,
    Failed(String),
}

impl Slot {
    fn state(&self) -> IndexState {
        match self {
            Slot::Unloaded => IndexState::Unloaded,
            Slot::Loading => IndexState::Loading,
            Slot::Loaded(_) => IndexState::Loaded,
            Slot::Unloading => IndexState::Unloading,
            Slot::Failed(_) => IndexState::Failed,
        }
    }
}

struct Worker {
    task: Task,
    handle: JoinHandle<Result<()>>,
}

fn read_slot(slot: &RwLock<Slot>) -> RwLockReadGuard<'_, Slot> {
    slot.read().unwrap_or_else(PoisonError::into_inner)
}

fn write_slot(slot: &RwLock<Slot>) -> RwLockWriteGuard<'_, Slot> {
    slot.write().unwrap_or_else(PoisonError::into_inner)
}

// Opens the index and publishes the outcome: Loaded on success, Unloaded
// when stopped, Failed on any other error. Partial state never reaches the slot.
fn run_load(slot: &RwLock<Slot>, dir: &Path, stop: &AtomicBool) -> Result<()> {
    let res = Index::open(dir, stop);
    let mut guard = write_slot(slot);
    match res {
        Ok(index) => {
            *guard = Slot::Loaded(index);
            Ok(())
        }
        Err(IndexError::Cancelled) => {
            log::info!("loading {} stopped", dir.display());
            *guard = Slot::Unloaded;
            Err(IndexError::Cancelled)
        }
        Err(e) => {
            log::error!("loading {} failed: {}", dir.display(), e);
            *guard = Slot::Failed(e.to_string());
            Err(e)
        }
    }
}

// A panic on the load thread ends in Failed rather than leaving the slot
// in Loading until someone joins the worker.
fn guarded_load<F>(slot: &RwLock<Slot>, load: F) -> Result<()>
where
    F: FnOnce() -> Result<()>,
{
    match panic::catch_unwind(AssertUnwindSafe(load)) {
        Ok(res) => res,
        Err(_) => {
            log::error!("load worker panicked");
            let mut guard = write_slot(slot);
            if let Slot::Loading = *guard {
                *guard = Slot::Failed("load worker panicked".to_string());
            }
            Err(IndexError::WorkerPanicked)
        }
    }
}

/// Serves one index directory.
///
/// A single background task builds or loads the index; `stop` cancels it
/// cooperatively. Queries take a shared read lock on the loaded snapshot and
/// run concurrently. `unload` takes the write lock, so it waits for the
/// queries in flight to finish.
pub struct Engine {
    cfg: Config,
    analyzer: Analyzer,
    slot: Arc<RwLock<Slot>>,
    stop: Arc<AtomicBool>,
    worker: Mutex<Option<Worker>>,
}

impl Engine {
    pub fn new(cfg: Config) -> Result<Self> {
        cfg.validate()?;
        let analyzer = Analyzer::from_config(&cfg)?;
        Ok(Engine {
            cfg,
            analyzer,
            slot: Arc::new(RwLock::new(Slot::Unloaded)),
            stop: Arc::new(AtomicBool::new(false)),
            worker: Mutex::new(None),
        })
    }

    pub fn config(&self) -> &Config {
        &self.cfg
    }

    pub fn index_dir(&self) -> &Path {
        &self.cfg.index_dir
    }

    pub fn state(&self) -> IndexState {
        read_slot(&self.slot).state()
    }

    /// Reason of the last failed load, if the index is in `Failed`.
    pub fn failure(&self) -> Option<String> {
        match &*read_slot(&self.slot) {
            Slot::Failed(reason) => Some(reason.clone()),
            _ => None,
        }
    }

    fn lock_worker(&self) -> MutexGuard<'_, Option<Worker>> {
        self.worker.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Task currently running in the background, if any.
    pub fn current_task(&self) -> Option<Task> {
        self.lock_worker()
            .as_ref()
            .filter(|w| !w.handle.is_finished())
            .map(|w| w.task)
    }

    pub fn is_running(&self) -> bool {
        self.current_task().is_some()
    }

    // Rejects a new task while one runs; a finished one is joined first.
    fn claim_worker(&self) -> Result<MutexGuard<'_, Option<Worker>>> {
        let mut worker = self.lock_worker();
        if let Some(w) = worker.as_ref() {
            if !w.handle.is_finished() {
                return Err(IndexError::Busy("a background task is running"));
            }
        }
        if let Some(w) = worker.take() {
            if let Err(e) = self.join(w) {
                log::debug!("previous task ended with: {}", e);
            }
        }
        self.stop.store(false, Ordering::SeqCst);
        Ok(worker)
    }

    /// Starts loading the index in the background. Legal only from `Unloaded`.
    pub fn load(&self) -> Result<()> {
        let mut worker = self.claim_worker()?;
        {
            let mut slot = write_slot(&self.slot);
            match *slot {
                Slot::Unloaded => *slot = Slot::Loading,
                ref other => {
                    return Err(IndexError::IllegalState(format!("cannot load from {}", other.state())));
                }
            }
        }
        let slot = Arc::clone(&self.slot);
        let stop = Arc::clone(&self.stop);
        let dir = self.cfg.index_dir.clone();
        log::info!("loading index {}", dir.display());
        let spawned = thread::Builder::new()
            .name("paperir-load".to_string())
            .spawn(move || guarded_load(&slot, || run_load(&slot, &dir, &stop)));
        match spawned {
            Ok(handle) => {
                *worker = Some(Worker { task: Task::Load, handle });
                Ok(())
            }
            Err(e) => {
                *write_slot(&self.slot) = Slot::Unloaded;
                Err(e.into())
            }
        }
    }

    /// Starts building an index from `corpus` into the index directory.
    ///
    /// The served snapshot is untouched: a loaded index keeps answering from
    /// its own generation until it is unloaded and loaded again.
    pub fn build(&self, corpus: &Path) -> Result<()> {
        let mut worker = self.claim_worker()?;
        let builder = IndexBuilder::new(&self.cfg, self.analyzer.clone(), &self.cfg.index_dir)?;
        let stop = Arc::clone(&self.stop);
        let corpus: PathBuf = corpus.to_path_buf();
        log::info!("building index {} from {}", self.cfg.index_dir.display(), corpus.display());
        let handle = thread::Builder::new()
            .name("paperir-build".to_string())
            .spawn(move || {
                let docs = DocParser::new(&corpus).docs();
                let meta = builder.build_from(docs, &stop)?;
                log::info!("build finished: {} documents, {} terms, {} postings",
                    meta.documents, meta.terms, meta.postings);
                Ok(())
            })?;
        *worker = Some(Worker { task: Task::Build, handle });
        Ok(())
    }

    /// Asks the running task to stop at its next checkpoint.
    pub fn stop(&self) {
        if let Some(task) = self.current_task() {
            log::info!("stopping {:?} task", task);
        }
        self.stop.store(true, Ordering::SeqCst);
    }

    /// Blocks until the background task ends and returns its result.
    pub fn wait(&self) -> Result<()> {
        let worker = self.lock_worker().take();
        match worker {
            Some(w) => self.join(w),
            None => Ok(()),
        }
    }

    fn join(&self, worker: Worker) -> Result<()> {
        match worker.handle.join() {
            Ok(res) => res,
            Err(_) => {
                log::error!("{:?} worker panicked", worker.task);
                if worker.task == Task::Load {
                    let mut slot = write_slot(&self.slot);
                    if let Slot::Loading = *slot {
                        *slot = Slot::Failed("load worker panicked".to_string());
                    }
                }
                Err(IndexError::WorkerPanicked)
            }
        }
    }

    /// Releases the loaded index. A no-op when already unloaded.
    pub fn unload(&self) -> Result<()> {
        let released = {
            // waits for queries holding the read lock
            let mut slot = write_slot(&self.slot);
            match *slot {
                Slot::Unloaded => return Ok(()),
                Slot::Loading => return Err(IndexError::Busy("index is loading")),
                Slot::Unloading => return Err(IndexError::Busy("index is unloading")),
                Slot::Loaded(_) | Slot::Failed(_) => std::mem::replace(&mut *slot, Slot::Unloading),
            }
        };
        if let Slot::Loaded(index) = released {
            log::info!("unloading index {}", index.dir().display());
            drop(index);
        }
        *write_slot(&self.slot) = Slot::Unloaded;
        Ok(())
    }

    // runs f against the loaded snapshot under the shared lock
    fn with_index<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Index) -> Result<T>,
    {
        match &*read_slot(&self.slot) {
            Slot::Loaded(index) => f(index),
            _ => Err(IndexError::NotLoaded),
        }
    }

    pub fn total_documents(&self) -> Result<usize> {
        self.with_index(|index| Ok(index.total_documents()))
    }

    pub fn importance(&self, doc: DocId) -> Result<f64> {
        self.with_index(|index| Ok(index.importance(doc)))
    }

    pub fn meta(&self) -> Result<IndexMeta> {
        self.with_index(|index| Ok(index.meta().clone()))
    }

    pub fn fetch_terms(&self, terms: &[&str], tier: DocTier) -> Result<Vec<TermPostings>> {
        self.with_index(|index| index.fetch_terms(terms, tier))
    }

    /// Ranks `query` with the configured pagerank weight.
    pub fn evaluate(&self, query: &[QueryTerm], model: RetrievalModel, top_k: usize, tier: DocTier) -> Result<Ranked> {
        self.evaluate_with_weight(query, model, top_k, tier, self.cfg.pagerank_weight)
    }

    pub fn evaluate_with_weight(
        &self,
        query: &[QueryTerm],
        model: RetrievalModel,
        top_k: usize,
        tier: DocTier,
        weight: f64,
    ) -> Result<Ranked> {
        if !(0.0..=1.0).contains(&weight) {
            return Err(IndexError::Config(format!("pagerank weight {} outside [0, 1]", weight)));
        }
        self.with_index(|index| ranking::evaluate(index, query, model, top_k, tier, weight, &self.cfg.bm25))
    }

    /// Analyzes free text into query terms and ranks them.
    pub fn search(&self, text: &str, model: RetrievalModel, top_k: usize, tier: DocTier) -> Result<Ranked> {
        let query = self.analyzer.query_terms(text);
        self.evaluate(&query, model, top_k, tier)
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        let worker = self.worker.get_mut().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(w) = worker {
            let _ = w.handle.join();
        }
    }
}
