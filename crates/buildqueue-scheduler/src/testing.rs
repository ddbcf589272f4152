//! Fake collaborators shared by the scheduler tests.

use async_trait::async_trait;
use buildqueue_config::{Settings, parse_settings};
use buildqueue_core::{
    BranchInfo, BuildExecutor, BuildOutcome, BuildRequest, CommitInfo, ExecutorError, VcsError,
    VersionControlClient,
};
use chrono::{TimeZone, Utc};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Semaphore;

pub const NEW_STYLE_SCRIPT: &str = "# stage 2\nset(SERVERBUILD ON)\n";
pub const OLD_STYLE_SCRIPT: &str = "# stage 2\nset(LEGACY ON)\n";

/// In-memory VCS that counts overlapping calls instead of tolerating them.
#[derive(Clone)]
pub struct FakeVcs {
    state: Arc<FakeVcsState>,
}

#[derive(Default)]
struct FakeVcsState {
    branches: Mutex<Vec<BranchInfo>>,
    scripts: Mutex<HashMap<String, Vec<u8>>>,
    failing_exports: Mutex<HashSet<String>>,
    exports: Mutex<Vec<String>>,
    list_fails: AtomicBool,
    delay_ms: AtomicU64,
    active: AtomicUsize,
    calls: AtomicUsize,
    overlaps: AtomicUsize,
}

struct CallGuard<'a>(&'a FakeVcsState);

impl Drop for CallGuard<'_> {
    fn drop(&mut self) {
        self.0.active.fetch_sub(1, Ordering::SeqCst);
    }
}

impl FakeVcs {
    pub fn new(branches: &[&str]) -> Self {
        let fake = Self {
            state: Arc::new(FakeVcsState::default()),
        };
        fake.set_branches(branches);
        fake
    }

    pub fn with_delay(self, delay: Duration) -> Self {
        self.state
            .delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
        self
    }

    pub fn set_branches(&self, names: &[&str]) {
        let branches = names
            .iter()
            .enumerate()
            .map(|(i, name)| BranchInfo {
                name: name.to_string(),
                source_path: format!("/branches/{}", name),
                last_author: "bob".to_string(),
                created_revision: 100 + i as u64,
            })
            .collect();
        *self.state.branches.lock().unwrap() = branches;
    }

    pub fn set_list_fails(&self, fails: bool) {
        self.state.list_fails.store(fails, Ordering::SeqCst);
    }

    pub fn mark_old_style(&self, branch: &str) {
        self.set_script(branch, OLD_STYLE_SCRIPT.as_bytes().to_vec());
    }

    /// Serve `body` as the build script of `branch`.
    pub fn set_script(&self, branch: &str, body: Vec<u8>) {
        self.state
            .scripts
            .lock()
            .unwrap()
            .insert(branch.to_string(), body);
    }

    pub fn fail_export(&self, branch: &str) {
        self.state
            .failing_exports
            .lock()
            .unwrap()
            .insert(branch.to_string());
    }

    pub fn calls(&self) -> usize {
        self.state.calls.load(Ordering::SeqCst)
    }

    pub fn overlaps(&self) -> usize {
        self.state.overlaps.load(Ordering::SeqCst)
    }

    /// Source paths of every attempted export.
    pub fn exports(&self) -> Vec<String> {
        self.state.exports.lock().unwrap().clone()
    }

    async fn enter(&self) -> CallGuard<'_> {
        self.state.calls.fetch_add(1, Ordering::SeqCst);
        if self.state.active.fetch_add(1, Ordering::SeqCst) > 0 {
            self.state.overlaps.fetch_add(1, Ordering::SeqCst);
        }
        let guard = CallGuard(&self.state);
        let delay = self.state.delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        } else {
            tokio::task::yield_now().await;
        }
        guard
    }
}

/// Branch name owning a repository path such as `/branches/feature-x/build.cmake`.
fn branch_of(source: &str) -> String {
    let mut parts = source.trim_start_matches('/').split('/');
    match parts.next() {
        Some("branches") => parts.next().unwrap_or_default().to_string(),
        Some(first) => first.to_string(),
        None => String::new(),
    }
}

#[async_trait]
impl VersionControlClient for FakeVcs {
    fn kind(&self) -> &'static str {
        "svn"
    }

    async fn list_branches(&self) -> Result<Vec<BranchInfo>, VcsError> {
        let _guard = self.enter().await;
        if self.state.list_fails.load(Ordering::SeqCst) {
            return Err(VcsError::CommandFailed {
                command: "svn list".to_string(),
                message: "Unable to connect to a repository".to_string(),
            });
        }
        Ok(self.state.branches.lock().unwrap().clone())
    }

    async fn last_commit_info(&self, _path: &str) -> Result<CommitInfo, VcsError> {
        let _guard = self.enter().await;
        Ok(CommitInfo {
            author: "alice".to_string(),
            revision: 1042,
            timestamp: Utc.with_ymd_and_hms(2026, 10, 18, 10, 0, 0).unwrap(),
        })
    }

    async fn export_file(&self, source: &str, destination: &Path) -> Result<(), VcsError> {
        let _guard = self.enter().await;
        self.state.exports.lock().unwrap().push(source.to_string());

        let branch = branch_of(source);
        if self.state.failing_exports.lock().unwrap().contains(&branch) {
            return Err(VcsError::CommandFailed {
                command: "svn export".to_string(),
                message: format!("path not found: {}", source),
            });
        }

        let body = self
            .state
            .scripts
            .lock()
            .unwrap()
            .get(&branch)
            .cloned()
            .unwrap_or_else(|| NEW_STYLE_SCRIPT.as_bytes().to_vec());
        std::fs::write(destination, body)?;
        Ok(())
    }
}

/// Executor that records requests and optionally holds builds until released.
#[derive(Clone, Default)]
pub struct FakeExecutor {
    state: Arc<FakeExecutorState>,
}

#[derive(Default)]
struct FakeExecutorState {
    requests: Mutex<Vec<BuildRequest>>,
    exit_code: AtomicI32,
    spawn_fails: AtomicBool,
    gate: Mutex<Option<Arc<Semaphore>>>,
}

impl FakeExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_exit_code(self, code: i32) -> Self {
        self.state.exit_code.store(code, Ordering::SeqCst);
        self
    }

    pub fn with_spawn_failure(self) -> Self {
        self.state.spawn_fails.store(true, Ordering::SeqCst);
        self
    }

    /// Block every build until a permit is added to the returned semaphore.
    pub fn hold_builds(&self) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        *self.state.gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    pub fn requests(&self) -> Vec<BuildRequest> {
        self.state.requests.lock().unwrap().clone()
    }

    /// Wait until at least `count` builds were started.
    pub async fn wait_for_builds(&self, count: usize) -> Vec<BuildRequest> {
        tokio::time::timeout(Duration::from_secs(10), async {
            loop {
                let requests = self.requests();
                if requests.len() >= count {
                    return requests;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap()
    }
}

#[async_trait]
impl BuildExecutor for FakeExecutor {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn run(&self, request: &BuildRequest) -> Result<BuildOutcome, ExecutorError> {
        self.state.requests.lock().unwrap().push(request.clone());

        let gate = self.state.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.acquire().await.unwrap().forget();
        }

        if self.state.spawn_fails.load(Ordering::SeqCst) {
            return Err(ExecutorError::Spawn {
                program: "ctest".to_string(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
            });
        }
        Ok(BuildOutcome::Exited(
            self.state.exit_code.load(Ordering::SeqCst),
        ))
    }
}

/// Settings rooted at `pivot` for the given platforms.
pub fn settings(pivot: &Path, platforms: &[&str]) -> Settings {
    let platforms = platforms
        .iter()
        .map(|p| format!("\"{}\"", p))
        .collect::<Vec<_>>()
        .join(" ");
    let kdl = format!(
        r#"
        general {{
            pivot-directory "{pivot}"
            build-script "cmake/build-stage2.cmake"
            log-level "debug"
            poll-interval 3600
            queue-capacity 16
            nightly-time "01:00"
            state-file "{state}"
            platforms {platforms}
        }}
        subversion {{
            repository "svn://svn.example.com/project"
            user "builder"
            password "secret"
        }}
        "#,
        pivot = pivot.display(),
        state = pivot.join("nightly.json").display(),
        platforms = platforms,
    );
    parse_settings(&kdl).unwrap()
}

/// Collects formatted log lines emitted on the current thread.
///
/// `#[tokio::test]` runs spawned tasks on the test thread, so events from
/// workers are captured as well.
#[derive(Clone, Default)]
pub struct LogCapture {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl std::io::Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.buffer.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl LogCapture {
    /// Capture until the returned guard is dropped.
    pub fn install(&self) -> tracing::subscriber::DefaultGuard {
        let writer = self.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::DEBUG)
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    pub fn lines(&self) -> Vec<String> {
        String::from_utf8_lossy(&self.buffer.lock().unwrap())
            .lines()
            .map(str::to_string)
            .collect()
    }

    /// Lines containing every one of `needles`.
    pub fn matching(&self, needles: &[&str]) -> Vec<String> {
        self.lines()
            .into_iter()
            .filter(|line| needles.iter().all(|n| line.contains(n)))
            .collect()
    }
}
