//! Debounced file watcher that keeps the index fresh.
//!
//! Filesystem events come from `notify`. Relevant paths go into a [`Debouncer`]:
//! every event restarts a single timer, and when the timer survives a full quiet
//! period the pending set is handed to the ingestion pipeline in one batch. The
//! pending set, the timer handle, and a generation counter sit behind one mutex, so
//! only the most recent timer can flush.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use anyhow::{Context, Result};
use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecursiveMode, Watcher};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::config::MnemoConfig;
use crate::db;
use crate::embedding;
use crate::memory::ingest::{self, IngestPipeline};

/// Receives each flushed batch. Runs on the blocking pool.
pub type FlushSink = Arc<dyn Fn(Vec<PathBuf>) + Send + Sync>;

struct DebounceState {
    pending: BTreeSet<PathBuf>,
    timer: Option<JoinHandle<()>>,
    generation: u64,
}

struct Inner {
    delay: Duration,
    state: Mutex<DebounceState>,
    sink: FlushSink,
    runtime: Handle,
}

/// Coalesces bursts of events into one flush per quiet period.
#[derive(Clone)]
pub struct Debouncer {
    inner: Arc<Inner>,
}

impl Debouncer {
    /// `runtime` is where timers are spawned; `record` may be called from any thread.
    pub fn new(delay: Duration, sink: FlushSink, runtime: Handle) -> Self {
        Self {
            inner: Arc::new(Inner {
                delay,
                state: Mutex::new(DebounceState {
                    pending: BTreeSet::new(),
                    timer: None,
                    generation: 0,
                }),
                sink,
                runtime,
            }),
        }
    }

    /// Add a path to the pending set and restart the timer.
    pub fn record(&self, path: PathBuf) {
        let mut state = self.inner.lock();
        state.pending.insert(path);

        if let Some(timer) = state.timer.take() {
            timer.abort();
        }
        state.generation += 1;
        let generation = state.generation;

        let inner = Arc::clone(&self.inner);
        state.timer = Some(self.inner.runtime.spawn(async move {
            tokio::time::sleep(inner.delay).await;
            inner.fire(generation).await;
        }));
    }

    /// Number of paths waiting for the next flush.
    pub fn pending(&self) -> usize {
        self.inner.lock().pending.len()
    }
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, DebounceState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn fire(self: Arc<Self>, generation: u64) {
        let batch = {
            let mut state = self.lock();
            if state.generation != generation {
                return;
            }
            state.timer = None;
            std::mem::take(&mut state.pending)
        };
        if batch.is_empty() {
            return;
        }

        let files: Vec<PathBuf> = batch.into_iter().collect();
        tracing::info!(files = files.len(), "flushing changed files");

        let sink = Arc::clone(&self.sink);
        if let Err(e) = tokio::task::spawn_blocking(move || sink(files)).await {
            tracing::error!(error = %e, "flush task failed");
        }
    }
}

/// Which paths trigger re-indexing.
#[derive(Debug, Clone)]
pub struct WatchTargets {
    pub memory_file: PathBuf,
    pub memory_dir: PathBuf,
}

impl WatchTargets {
    /// Resolve targets from config, creating the memory directory if needed.
    pub fn from_config(config: &MnemoConfig) -> Result<Self> {
        let memory_dir = config.resolved_memory_dir();
        std::fs::create_dir_all(&memory_dir)
            .with_context(|| format!("failed to create {}", memory_dir.display()))?;
        let memory_dir = std::fs::canonicalize(&memory_dir)
            .with_context(|| format!("failed to resolve {}", memory_dir.display()))?;

        Ok(Self {
            memory_file: canonical_file(&config.resolved_memory_file()),
            memory_dir,
        })
    }

    /// Markdown files that are the memory file or sit anywhere under the memory directory.
    pub fn is_relevant(&self, path: &Path) -> bool {
        ingest::is_markdown(path) && (path == self.memory_file || path.starts_with(&self.memory_dir))
    }

    /// Directory to watch non-recursively for the memory file.
    fn memory_file_dir(&self) -> Option<&Path> {
        self.memory_file.parent()
    }
}

/// Canonicalize through the parent so a file that does not exist yet still resolves.
fn canonical_file(path: &Path) -> PathBuf {
    match (path.parent(), path.file_name()) {
        (Some(parent), Some(name)) => std::fs::canonicalize(parent)
            .map(|p| p.join(name))
            .unwrap_or_else(|_| path.to_path_buf()),
        _ => path.to_path_buf(),
    }
}

/// Watch the memory files in the foreground until Ctrl-C.
pub async fn run(config: MnemoConfig) -> Result<()> {
    let targets = WatchTargets::from_config(&config)?;
    crate::server::check_embedding_model(&config);

    let provider: Arc<dyn embedding::EmbeddingProvider> =
        Arc::from(embedding::create_provider(&config.embedding));
    let pipeline = IngestPipeline::from_config(&config, provider);
    let db_path = config.resolved_db_path();
    let force = config.watcher.rebuild;
    let gate = Arc::new(Mutex::new(()));

    let sink: FlushSink = Arc::new(move |files: Vec<PathBuf>| {
        let _guard = gate.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut conn = match db::open_database(&db_path) {
            Ok(conn) => conn,
            Err(e) => {
                tracing::error!(error = %format!("{e:#}"), "cannot open database for indexing");
                return;
            }
        };
        for file in files {
            match pipeline.ingest(&mut conn, &file, force) {
                Ok(report) => tracing::info!("{}", ingest::report_line(&report)),
                Err(e) => tracing::error!(path = %file.display(), error = %format!("{e:#}"), "re-index failed"),
            }
        }
    });

    let debouncer = Debouncer::new(config.watcher.debounce(), sink, Handle::current());

    let handler_debouncer = debouncer.clone();
    let handler_targets = targets.clone();
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
        Ok(event) => {
            for path in changed_paths(event) {
                if handler_targets.is_relevant(&path) {
                    tracing::debug!(path = %path.display(), "change detected");
                    handler_debouncer.record(path);
                }
            }
        }
        Err(e) => tracing::warn!(error = %e, "watch error"),
    })
    .context("failed to create file watcher")?;

    if let Some(dir) = targets.memory_file_dir() {
        watcher
            .watch(dir, RecursiveMode::NonRecursive)
            .with_context(|| format!("failed to watch {}", dir.display()))?;
    }
    watcher
        .watch(&targets.memory_dir, RecursiveMode::Recursive)
        .with_context(|| format!("failed to watch {}", targets.memory_dir.display()))?;

    tracing::info!(
        memory_file = %targets.memory_file.display(),
        memory_dir = %targets.memory_dir.display(),
        debounce_ms = config.watcher.debounce_ms,
        rebuild = force,
        "watching for changes (Ctrl-C to stop)"
    );

    tokio::signal::ctrl_c().await.context("failed to listen for Ctrl-C")?;
    tracing::info!(pending = debouncer.pending(), "stopping watcher");
    drop(watcher);
    Ok(())
}

/// Paths whose contents may have changed. Metadata-only events and the source
/// side of a rename are dropped.
fn changed_paths(event: Event) -> Vec<PathBuf> {
    let Event { kind, mut paths, .. } = event;
    match kind {
        EventKind::Create(_)
        | EventKind::Modify(ModifyKind::Any | ModifyKind::Data(_))
        | EventKind::Modify(ModifyKind::Name(RenameMode::To | RenameMode::Any)) => paths,
        // [from, to]
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => paths.pop().into_iter().collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn targets(root: &Path) -> WatchTargets {
        WatchTargets {
            memory_file: root.join("MEMORY.md"),
            memory_dir: root.join("memory"),
        }
    }

    #[test]
    fn relevance_filter() {
        let root = Path::new("/work");
        let t = targets(root);
        assert!(t.is_relevant(Path::new("/work/MEMORY.md")));
        assert!(t.is_relevant(Path::new("/work/memory/2026-01-01.md")));
        assert!(t.is_relevant(Path::new("/work/memory/topics/deep/rust.md")));
        assert!(!t.is_relevant(Path::new("/work/memory/scratch.txt")));
        assert!(!t.is_relevant(Path::new("/work/README.md")));
        assert!(!t.is_relevant(Path::new("/work/memory-old/a.md")));
    }

    fn event(kind: EventKind, paths: &[&str]) -> Event {
        paths
            .iter()
            .fold(Event::new(kind), |event, p| event.add_path(PathBuf::from(p)))
    }

    #[test]
    fn only_content_changes_are_reindexed() {
        use notify::event::{AccessKind, CreateKind, DataChange, MetadataKind, RemoveKind};

        let file = ["/work/memory/a.md"];
        for kind in [
            EventKind::Create(CreateKind::File),
            EventKind::Modify(ModifyKind::Data(DataChange::Content)),
            EventKind::Modify(ModifyKind::Any),
            EventKind::Modify(ModifyKind::Name(RenameMode::To)),
        ] {
            assert_eq!(changed_paths(event(kind, &file)), vec![PathBuf::from(file[0])], "{kind:?}");
        }
        for kind in [
            EventKind::Modify(ModifyKind::Metadata(MetadataKind::Permissions)),
            EventKind::Modify(ModifyKind::Name(RenameMode::From)),
            EventKind::Access(AccessKind::Read),
            EventKind::Remove(RemoveKind::File),
        ] {
            assert!(changed_paths(event(kind, &file)).is_empty(), "{kind:?}");
        }
    }

    #[test]
    fn rename_keeps_the_destination() {
        let kind = EventKind::Modify(ModifyKind::Name(RenameMode::Both));
        let paths = changed_paths(event(kind, &["/work/memory/draft.md", "/work/memory/final.md"]));
        assert_eq!(paths, vec![PathBuf::from("/work/memory/final.md")]);
    }

    #[tokio::test]
    async fn quiet_period_flushes_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let sink: FlushSink = Arc::new(move |_files: Vec<PathBuf>| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let debouncer = Debouncer::new(Duration::from_millis(40), sink, Handle::current());

        debouncer.record(PathBuf::from("/work/MEMORY.md"));
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(debouncer.pending(), 0);

        // a later edit starts a new cycle
        debouncer.record(PathBuf::from("/work/MEMORY.md"));
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
