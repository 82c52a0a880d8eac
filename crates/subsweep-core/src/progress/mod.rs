//! Live per-source progress for one target.
//!
//! Units running concurrently report into a single status map. Every mutation
//! happens inside one async mutex, and the render hook is invoked with the
//! post-mutation snapshot before the lock is released, so renders observe
//! mutations in the order they were applied. Drawing is left to the hook.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

/// Lifecycle of one source within a target run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SourceStatus {
    #[default]
    Pending,
    Running,
    Completed,
    Failed,
    Timeout,
    Cached,
}

impl SourceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceStatus::Pending => "PENDING",
            SourceStatus::Running => "RUNNING",
            SourceStatus::Completed => "COMPLETED",
            SourceStatus::Failed => "FAILED",
            SourceStatus::Timeout => "TIMEOUT",
            SourceStatus::Cached => "CACHED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, SourceStatus::Pending | SourceStatus::Running)
    }
}

impl fmt::Display for SourceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SourceProgress {
    pub count: usize,
    pub status: SourceStatus,
}

pub type ProgressSnapshot = BTreeMap<String, SourceProgress>;

/// Re-render signal, called after every mutation.
///
/// Invoked while the tracker lock is held; implementations must not call back
/// into the tracker.
pub trait ProgressRenderer: Send + Sync {
    fn render(&self, snapshot: &ProgressSnapshot);
}

/// Renderer that draws nothing.
pub struct NoopRenderer;

impl ProgressRenderer for NoopRenderer {
    fn render(&self, _snapshot: &ProgressSnapshot) {}
}

pub struct ProgressTracker {
    state: Mutex<ProgressSnapshot>,
    renderer: Arc<dyn ProgressRenderer>,
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new(Arc::new(NoopRenderer))
    }
}

impl ProgressTracker {
    pub fn new(renderer: Arc<dyn ProgressRenderer>) -> Self {
        Self {
            state: Mutex::new(BTreeMap::new()),
            renderer,
        }
    }

    /// Reset the given sources to `{count: 0, status: PENDING}`.
    pub async fn register<S: AsRef<str>>(&self, names: &[S]) {
        let mut state = self.state.lock().await;
        for name in names {
            state.insert(name.as_ref().to_string(), SourceProgress::default());
        }
        self.renderer.render(&state);
    }

    /// Add to a source's count and optionally overwrite its status.
    ///
    /// Unknown sources are registered on first update.
    pub async fn update(&self, name: &str, count_increment: usize, status: Option<SourceStatus>) {
        let mut state = self.state.lock().await;
        let entry = state.entry(name.to_string()).or_default();
        entry.count = entry.count.saturating_add(count_increment);
        if let Some(status) = status {
            entry.status = status;
        }
        self.renderer.render(&state);
    }

    /// Register sources restored from cache with their stored counts.
    pub async fn mark_cached(&self, contributions: &BTreeMap<String, usize>) {
        let mut state = self.state.lock().await;
        for (name, count) in contributions {
            state.insert(
                name.clone(),
                SourceProgress {
                    count: *count,
                    status: SourceStatus::Cached,
                },
            );
        }
        self.renderer.render(&state);
    }

    pub async fn snapshot(&self) -> ProgressSnapshot {
        self.state.lock().await.clone()
    }

    /// Progress handle bound to one source name.
    pub fn source<'a>(&'a self, name: &'a str) -> SourceHandle<'a> {
        SourceHandle {
            tracker: self,
            name,
        }
    }
}

/// A unit's view of the tracker.
#[derive(Clone, Copy)]
pub struct SourceHandle<'a> {
    tracker: &'a ProgressTracker,
    name: &'a str,
}

impl SourceHandle<'_> {
    pub fn name(&self) -> &str {
        self.name
    }

    pub async fn start(&self) {
        self.tracker
            .update(self.name, 0, Some(SourceStatus::Running))
            .await;
    }

    pub async fn finish(&self, count: usize, status: SourceStatus) {
        self.tracker.update(self.name, count, Some(status)).await;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex as StdMutex;

    use super::*;

    #[derive(Default)]
    struct RecordingRenderer {
        frames: StdMutex<Vec<ProgressSnapshot>>,
    }

    impl ProgressRenderer for RecordingRenderer {
        fn render(&self, snapshot: &ProgressSnapshot) {
            self.frames
                .lock()
                .expect("renderer lock")
                .push(snapshot.clone());
        }
    }

    #[tokio::test]
    async fn register_initialises_pending_entries() {
        let tracker = ProgressTracker::default();
        tracker.register(&["crt.sh", "subfinder"]).await;

        let snapshot = tracker.snapshot().await;
        assert_eq!(snapshot.len(), 2);
        assert!(snapshot
            .values()
            .all(|entry| entry.count == 0 && entry.status == SourceStatus::Pending));
    }

    #[tokio::test]
    async fn update_accumulates_and_renders_each_mutation() {
        let renderer = Arc::new(RecordingRenderer::default());
        let tracker = ProgressTracker::new(renderer.clone());

        tracker.register(&["crt.sh"]).await;
        let handle = tracker.source("crt.sh");
        handle.start().await;
        tracker.update("crt.sh", 3, None).await;
        handle.finish(2, SourceStatus::Completed).await;

        let snapshot = tracker.snapshot().await;
        assert_eq!(
            snapshot["crt.sh"],
            SourceProgress {
                count: 5,
                status: SourceStatus::Completed
            }
        );

        let frames = renderer.frames.lock().expect("renderer lock");
        assert_eq!(frames.len(), 4);
        assert_eq!(frames[1]["crt.sh"].status, SourceStatus::Running);
        assert_eq!(frames[2]["crt.sh"].count, 3);
    }

    #[tokio::test]
    async fn concurrent_updates_are_not_lost() {
        let tracker = Arc::new(ProgressTracker::default());
        tracker.register(&["a", "b"]).await;

        let mut handles = Vec::new();
        for i in 0..64 {
            let tracker = Arc::clone(&tracker);
            let name = if i % 2 == 0 { "a" } else { "b" };
            handles.push(tokio::spawn(async move {
                tracker.update(name, 1, None).await;
            }));
        }
        for handle in handles {
            handle.await.expect("join update task");
        }

        let snapshot = tracker.snapshot().await;
        assert_eq!(snapshot["a"].count, 32);
        assert_eq!(snapshot["b"].count, 32);
    }

    #[tokio::test]
    async fn mark_cached_sets_counts_and_status() {
        let tracker = ProgressTracker::default();
        let contributions = BTreeMap::from([("crt.sh".to_string(), 7usize)]);
        tracker.mark_cached(&contributions).await;

        let snapshot = tracker.snapshot().await;
        assert_eq!(snapshot["crt.sh"].status, SourceStatus::Cached);
        assert_eq!(snapshot["crt.sh"].count, 7);
        assert!(snapshot["crt.sh"].status.is_terminal());
    }
}
