use crate::error::{ErrorKind, Result};
use crate::expiry::Expiry;
use derive_more::Display;
use exn::ResultExt;
use futures::StreamExt;
use ossky_storage::BackendHandle;
use std::time::Duration;
use time::OffsetDateTime;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::instrument;

/// How often the janitor sweeps when no interval is configured.
pub const DEFAULT_CLEANUP_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);
/// Shortest interval [`Janitor::with_interval`] accepts.
pub const MIN_CLEANUP_INTERVAL: Duration = Duration::from_secs(1);

/// Tally of one cleanup cycle.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Display)]
#[display("scanned {scanned}, expired {expired}, orphaned {orphaned}, skipped {skipped}")]
pub struct SweepReport {
    /// Objects seen, including the ones that could not be described.
    pub scanned: usize,
    /// Deleted because their `expires-at` had passed.
    pub expired: usize,
    /// Deleted because they had no `expires-at` at all.
    pub orphaned: usize,
    /// Left alone: unparseable expiry or a failed stat.
    pub skipped: usize,
}

/// Background reclamation of expired cache objects.
///
/// Reads never wait on the janitor and the janitor never runs on the read
/// path; it only walks the store on its own timer (or when asked to via
/// [`sweep`](Self::sweep)).
pub struct Janitor {
    backend: BackendHandle,
    interval: Duration,
    prefix: Option<String>,
}

impl Janitor {
    pub fn new(backend: BackendHandle) -> Self {
        Self { backend, interval: DEFAULT_CLEANUP_INTERVAL, prefix: None }
    }

    /// Intervals below [`MIN_CLEANUP_INTERVAL`] are raised to it.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        if interval < MIN_CLEANUP_INTERVAL {
            tracing::warn!(requested = ?interval, using = ?MIN_CLEANUP_INTERVAL, "Cleanup interval too short");
        }
        self.interval = interval.max(MIN_CLEANUP_INTERVAL);
        self
    }

    /// Only sweep keys under `prefix`.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Spawn the background task. The first sweep happens one full interval
    /// from now.
    ///
    /// The task exits when either [`JanitorHandle::stop`] is called or
    /// `shutdown` flips to `true`. A sweep in progress finishes the object it
    /// is working on and then returns.
    pub fn start(self, shutdown: watch::Receiver<bool>) -> JanitorHandle {
        let (stop, own) = watch::channel(false);
        tracing::info!(backend = self.backend.name(), interval_secs = self.interval.as_secs(), "Starting cache janitor");
        let task = tokio::spawn(self.run(own, shutdown));
        JanitorHandle { stop, task }
    }

    async fn run(self, mut own: watch::Receiver<bool>, mut parent: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                biased;
                _ = raised(&mut own) => break,
                _ = raised(&mut parent) => break,
                _ = ticker.tick() => {},
            }
            match self.sweep_until(&[&own, &parent]).await {
                Ok(report) => tracing::info!(%report, "Cache sweep finished"),
                Err(e) => tracing::error!(error = ?e, "Cache sweep aborted"),
            }
        }
        tracing::info!(backend = self.backend.name(), "Cache janitor stopped");
    }

    /// Run one cleanup cycle.
    ///
    /// `stop` is checked before each object: once it reads `true` the object
    /// in hand is finished and the rest wait for the next cycle.
    pub async fn sweep(&self, stop: &watch::Receiver<bool>) -> Result<SweepReport> {
        self.sweep_until(&[stop]).await
    }

    /// One cleanup cycle that gives up between objects once any of `stop`
    /// reads `true`.
    #[instrument(skip(self, stop), fields(backend = self.backend.name()))]
    async fn sweep_until(&self, stop: &[&watch::Receiver<bool>]) -> Result<SweepReport> {
        let stop_requested = || stop.iter().any(|rx| *rx.borrow());
        let mut report = SweepReport::default();
        let now = OffsetDateTime::now_utc();
        let mut objects = self.backend.list_described_stream(self.prefix.as_deref());
        loop {
            if stop_requested() {
                tracing::info!(%report, "Stop requested; ending sweep early");
                break;
            }
            let Some(object) = objects.next().await else {
                break;
            };
            report.scanned += 1;
            let object = match object {
                Ok(object) => object,
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to describe cache object; skipping");
                    report.skipped += 1;
                    continue;
                },
            };
            match Expiry::from_metadata(&object.metadata) {
                Expiry::Missing => {
                    tracing::warn!(key = %object.key, "Cache object has no expiry metadata; deleting orphan");
                    self.remove(&object.key).await?;
                    report.orphaned += 1;
                },
                Expiry::Invalid(raw) => {
                    tracing::warn!(key = %object.key, value = %raw, "Cache object has unparseable expiry; skipping");
                    report.skipped += 1;
                },
                expiry if expiry.has_passed(now) => {
                    tracing::debug!(key = %object.key, "Deleting expired cache object");
                    self.remove(&object.key).await?;
                    report.expired += 1;
                },
                Expiry::At(_) => {},
            }
        }
        Ok(report)
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.backend.delete(key).await.or_raise(|| ErrorKind::Cleanup(key.to_string()))
    }
}

/// Resolves once the flag reads `true`. A channel whose sender is gone can
/// never be raised, so it never resolves.
async fn raised(rx: &mut watch::Receiver<bool>) {
    if rx.wait_for(|raised| *raised).await.is_err() {
        std::future::pending::<()>().await;
    }
}

/// Handle to a running [`Janitor`] task.
pub struct JanitorHandle {
    stop: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl JanitorHandle {
    /// Signal the task to stop and wait for it to exit.
    pub async fn stop(self) {
        // The task may already be gone after a parent shutdown.
        let _ = self.stop.send(true);
        if let Err(e) = self.task.await {
            tracing::error!(error = %e, "Cache janitor task failed");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expiry::EXPIRES_AT;
    use ossky_storage::backend::MockBackend;
    use ossky_storage::{Metadata, StorageBackend};
    use std::io;
    use std::sync::{Arc, Mutex};
    use tracing_subscriber::fmt::MakeWriter;

    const PAST: &str = "2001-01-01T00:00:00Z";
    const FUTURE: &str = "2999-01-01T00:00:00Z";

    fn expires_at(raw: &str) -> Metadata {
        Metadata::from([(EXPIRES_AT.to_string(), raw.to_string())])
    }

    fn mock(objects: Vec<(&str, Metadata)>) -> Arc<MockBackend> {
        Arc::new(MockBackend::with_objects(objects.into_iter().map(|(k, m)| (k, b"true".to_vec(), m))))
    }

    /// A stop signal nobody will raise.
    fn running() -> watch::Receiver<bool> {
        watch::channel(false).1
    }

    /// Raises `stop` after the first successful delete.
    struct StopAfterDelete {
        inner: MockBackend,
        stop: watch::Sender<bool>,
    }

    #[async_trait::async_trait]
    impl StorageBackend for StopAfterDelete {
        fn name(&self) -> &str {
            self.inner.name()
        }

        fn list_stream<'a>(&'a self, prefix: Option<&'a str>) -> ossky_storage::backend::ObjectInfoStream<'a> {
            self.inner.list_stream(prefix)
        }

        async fn exists(&self, key: &str) -> ossky_storage::error::Result<bool> {
            self.inner.exists(key).await
        }

        async fn read(&self, key: &str) -> ossky_storage::error::Result<ossky_storage::Object> {
            self.inner.read(key).await
        }

        async fn write(&self, key: &str, data: &[u8], metadata: &Metadata) -> ossky_storage::error::Result<()> {
            self.inner.write(key, data, metadata).await
        }

        async fn delete(&self, key: &str) -> ossky_storage::error::Result<()> {
            self.inner.delete(key).await?;
            self.stop.send_replace(true);
            Ok(())
        }

        async fn stat(&self, key: &str) -> ossky_storage::error::Result<ossky_storage::ObjectInfo<ossky_storage::object::Described>> {
            self.inner.stat(key).await
        }
    }

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl Captured {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for Captured {
        type Writer = Captured;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    #[tokio::test]
    async fn test_orphan_is_deleted_and_logged() {
        let logs = Captured::default();
        let subscriber = tracing_subscriber::fmt().with_writer(logs.clone()).with_ansi(false).finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let backend = mock(vec![("orphan", Metadata::new())]);
        let report = Janitor::new(backend.clone()).sweep(&running()).await.unwrap();

        assert_eq!(report.orphaned, 1);
        assert!(!backend.exists("orphan").await.unwrap());
        let output = logs.contents();
        assert!(output.contains("no expiry metadata"), "{output}");
        assert!(output.contains("orphan"), "{output}");
    }

    #[tokio::test]
    async fn test_sweep_classifies_every_object() {
        let backend = mock(vec![
            ("expired", expires_at(PAST)),
            ("garbled", expires_at("next tuesday")),
            ("live", expires_at(FUTURE)),
            ("orphan", Metadata::new()),
        ]);
        let report = Janitor::new(backend.clone()).sweep(&running()).await.unwrap();
        assert_eq!(report, SweepReport { scanned: 4, expired: 1, orphaned: 1, skipped: 1 });
        assert!(!backend.exists("expired").await.unwrap());
        assert!(backend.exists("garbled").await.unwrap());
        assert!(backend.exists("live").await.unwrap());
    }

    #[tokio::test]
    async fn test_sweep_is_idempotent() {
        let backend = mock(vec![("expired", expires_at(PAST)), ("live", expires_at(FUTURE))]);
        let janitor = Janitor::new(backend.clone());
        let first = janitor.sweep(&running()).await.unwrap();
        let second = janitor.sweep(&running()).await.unwrap();
        assert_eq!(first.expired, 1);
        assert_eq!(second, SweepReport { scanned: 1, ..SweepReport::default() });
    }

    #[tokio::test]
    async fn test_listing_error_is_skipped() {
        let backend = mock(vec![("a", expires_at(PAST)), ("b", expires_at(PAST))]);
        backend.fail_stat("a").await;
        let report = Janitor::new(backend.clone()).sweep(&running()).await.unwrap();
        assert_eq!(report, SweepReport { scanned: 2, expired: 1, orphaned: 0, skipped: 1 });
        assert!(backend.exists("a").await.unwrap());
        assert!(!backend.exists("b").await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_failure_aborts_cycle() {
        let backend = mock(vec![("a", expires_at(PAST)), ("b", expires_at(PAST))]);
        backend.fail_delete("a").await;
        let err = Janitor::new(backend.clone()).sweep(&running()).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Cleanup(key) if key == "a"));
        assert!(backend.exists("b").await.unwrap());
    }

    #[tokio::test]
    async fn test_prefix_limits_sweep() {
        let backend = mock(vec![("github-a", expires_at(PAST)), ("other", expires_at(PAST))]);
        let report = Janitor::new(backend.clone()).with_prefix("github-").sweep(&running()).await.unwrap();
        assert_eq!(report.expired, 1);
        assert!(backend.exists("other").await.unwrap());
    }

    #[tokio::test]
    async fn test_raised_stop_prevents_enumeration() {
        let backend = mock(vec![("expired", expires_at(PAST))]);
        let (_tx, rx) = watch::channel(true);
        let report = Janitor::new(backend.clone()).sweep_until(&[&rx]).await.unwrap();
        assert_eq!(report, SweepReport::default());
        assert!(backend.exists("expired").await.unwrap());
    }

    #[tokio::test]
    async fn test_stop_mid_sweep_finishes_current_object() {
        let (stop, rx) = watch::channel(false);
        let backend = Arc::new(StopAfterDelete {
            inner: MockBackend::with_objects(
                [("a", expires_at(PAST)), ("b", expires_at(PAST)), ("c", expires_at(PAST))]
                    .map(|(k, m)| (k, b"true".to_vec(), m)),
            ),
            stop,
        });
        let report = Janitor::new(backend.clone()).sweep(&rx).await.unwrap();
        assert_eq!(report, SweepReport { scanned: 1, expired: 1, ..SweepReport::default() });
        assert!(!backend.exists("a").await.unwrap());
        assert!(backend.exists("b").await.unwrap());
        assert!(backend.exists("c").await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_interval_is_clamped() {
        let backend = mock(vec![("expired", expires_at(PAST))]);
        let (_shutdown, rx) = watch::channel(false);
        let handle = Janitor::new(backend.clone()).with_interval(Duration::ZERO).start(rx);
        tokio::time::sleep(MIN_CLEANUP_INTERVAL + Duration::from_millis(10)).await;
        assert!(!backend.exists("expired").await.unwrap());
        handle.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_sweep_after_full_interval() {
        let backend = mock(vec![("expired", expires_at(PAST))]);
        let (_shutdown, rx) = watch::channel(false);
        let handle = Janitor::new(backend.clone()).with_interval(Duration::from_secs(3600)).start(rx);

        tokio::time::sleep(Duration::from_secs(3599)).await;
        assert!(backend.exists("expired").await.unwrap());

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(!backend.exists("expired").await.unwrap());
        handle.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_ends_task() {
        let (_shutdown, rx) = watch::channel(false);
        let handle = Janitor::new(mock(vec![])).start(rx);
        tokio::time::timeout(Duration::from_secs(1), handle.stop()).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_parent_shutdown_ends_task() {
        let (shutdown, rx) = watch::channel(false);
        let handle = Janitor::new(mock(vec![])).start(rx);
        shutdown.send(true).unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(handle.is_finished());
        handle.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_parent_does_not_stop_task() {
        let (shutdown, rx) = watch::channel(false);
        let handle = Janitor::new(mock(vec![])).start(rx);
        drop(shutdown);
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!handle.is_finished());
        handle.stop().await;
    }
}
