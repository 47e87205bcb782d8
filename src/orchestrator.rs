//! Mode-aware download orchestration.
//!
//! The [`Orchestrator`] owns the dispatch loop: it claims queued tasks
//! under the current concurrency policy, hands each one to the external
//! [`Fetcher`], and applies cooperative cancellation. Every status
//! change funnels through the [`QueueRegistry`], so a stop request
//! racing a natural completion resolves to exactly one terminal state.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::broadcast;
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;

use crate::config::{DownloadMode, OrchestratorConfig};
use crate::error::{Error, Result};
use crate::fetch::{FetchRequest, Fetcher, ProgressReporter};
use crate::fs::{DirectoryValidator, PermissiveValidator};
use crate::registry::QueueRegistry;
use crate::session::SessionManager;
use crate::task::{Task, TaskEvent, TaskId, TaskStatus, VideoDescriptor};

/// Handle to a running dispatch loop.
struct Dispatch {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Everything the dispatch loop and its workers share.
struct DispatchContext {
    registry: Arc<QueueRegistry>,
    fetcher: Arc<dyn Fetcher>,
    validator: Arc<dyn DirectoryValidator>,
    session: Arc<SessionManager>,
    download_dir: PathBuf,
    workers: usize,
    mode: Arc<Mutex<DownloadMode>>,
    dir_verified: AtomicBool,
}

impl DispatchContext {
    /// Pool size the current mode allows.
    fn current_pool_limit(&self) -> usize {
        self.mode.lock().unwrap().pool_limit(self.workers)
    }

    /// Verifies the download directory before the first fetch of this
    /// run, caching success so later tasks skip the check.
    ///
    /// Returns the rejection message when the directory is unusable.
    async fn ensure_download_dir(&self) -> Option<String> {
        if self.dir_verified.load(Ordering::Acquire) {
            return None;
        }
        let check = self.validator.ensure_dir(&self.download_dir).await;
        if check.ok {
            self.dir_verified.store(true, Ordering::Release);
            None
        } else {
            Some(check.message)
        }
    }
}

/// Dispatches queued tasks to an external fetch service under a
/// runtime-switchable concurrency policy.
///
/// Sequential mode resolves one task fully before claiming the next;
/// multi-threaded mode keeps up to the configured worker count in
/// flight. Switching the mode never preempts tasks that are already
/// downloading; the new policy applies to subsequent claims only.
pub struct Orchestrator {
    registry: Arc<QueueRegistry>,
    fetcher: Arc<dyn Fetcher>,
    validator: Arc<dyn DirectoryValidator>,
    session: Arc<SessionManager>,
    download_dir: PathBuf,
    workers: usize,
    mode: Arc<Mutex<DownloadMode>>,
    dispatch: Mutex<Option<Dispatch>>,
}

impl Orchestrator {
    /// Creates an idle orchestrator around the given fetch service.
    ///
    /// The download directory is checked lazily, before the first
    /// dispatch of each run. Directory validation defaults to the
    /// always-passing [`PermissiveValidator`]; swap in
    /// [`FsDirectoryValidator`](crate::fs::FsDirectoryValidator) via
    /// [`Orchestrator::with_validator`] to gate fetches on a real disk
    /// check. A default [`SessionManager`] is used unless replaced with
    /// [`Orchestrator::with_session`].
    #[must_use]
    pub fn new(config: OrchestratorConfig, fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            registry: Arc::new(QueueRegistry::new()),
            fetcher,
            validator: Arc::new(PermissiveValidator::new()),
            session: Arc::new(SessionManager::default()),
            download_dir: config.download_dir,
            workers: config.workers,
            mode: Arc::new(Mutex::new(config.mode)),
            dispatch: Mutex::new(None),
        }
    }

    /// Shares an externally owned session manager.
    #[must_use]
    pub fn with_session(mut self, session: Arc<SessionManager>) -> Self {
        self.session = session;
        self
    }

    /// Replaces the download directory validator.
    #[must_use]
    pub fn with_validator(mut self, validator: Arc<dyn DirectoryValidator>) -> Self {
        self.validator = validator;
        self
    }

    /// Starts the dispatch loop. Calling it while running is a no-op.
    ///
    /// Tasks queued before the call are picked up immediately.
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime.
    pub fn start(&self) {
        let mut dispatch = self.dispatch.lock().unwrap();
        if dispatch.is_some() {
            log::warn!("Orchestrator is already running");
            return;
        }

        let context = Arc::new(DispatchContext {
            registry: Arc::clone(&self.registry),
            fetcher: Arc::clone(&self.fetcher),
            validator: Arc::clone(&self.validator),
            session: Arc::clone(&self.session),
            download_dir: self.download_dir.clone(),
            workers: self.workers,
            mode: Arc::clone(&self.mode),
            dir_verified: AtomicBool::new(false),
        });
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_dispatch(context, cancel.clone()));
        *dispatch = Some(Dispatch { cancel, handle });
        log::info!("Orchestrator started in {} mode", self.download_mode());
    }

    /// Stops claiming new tasks and waits for in-flight downloads.
    ///
    /// Queued tasks stay queued and are picked up again by a later
    /// [`Orchestrator::start`]. Use [`Orchestrator::stop_all`] first for
    /// a fast exit.
    pub async fn shutdown(&self) {
        let dispatch = self.dispatch.lock().unwrap().take();
        let Some(dispatch) = dispatch else {
            log::warn!("Orchestrator is not running");
            return;
        };
        dispatch.cancel.cancel();
        if let Err(err) = dispatch.handle.await {
            log::error!("Dispatch task panicked: {err}");
        }
        log::info!("Orchestrator stopped");
    }

    /// Whether the dispatch loop is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.dispatch.lock().unwrap().is_some()
    }

    /// The dispatch mode applied to subsequent claims.
    #[must_use]
    pub fn download_mode(&self) -> DownloadMode {
        *self.mode.lock().unwrap()
    }

    /// Switches the dispatch mode.
    ///
    /// Takes effect for tasks claimed from now on; tasks already
    /// downloading are not preempted or re-dispatched. Invalid mode
    /// names are rejected earlier, by [`DownloadMode`]'s `FromStr`.
    pub fn set_download_mode(&self, mode: DownloadMode) {
        let mut current = self.mode.lock().unwrap();
        if *current == mode {
            return;
        }
        log::info!("Download mode changed from {current} to {mode}");
        *current = mode;
        drop(current);

        // A wider pool may allow more claims right away.
        self.registry.notify_changed();
    }

    /// Validates a descriptor and appends a task to the queue.
    ///
    /// A running dispatch loop picks it up without further calls.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidDescriptor`] when the descriptor fails
    /// validation.
    pub fn add_task(&self, descriptor: VideoDescriptor) -> Result<Task> {
        self.registry.add_task(descriptor)
    }

    /// Requests that a task stop.
    ///
    /// A queued task is stopped immediately. A downloading task has its
    /// cancellation signal set and transitions at the owning worker's
    /// next checkpoint. Returns `false` for unknown ids and tasks that
    /// are already terminal.
    pub fn stop_task(&self, id: TaskId) -> bool {
        self.registry.request_stop(id)
    }

    /// Requests a stop for every non-terminal task and returns how many
    /// stop signals were recorded.
    pub fn stop_all(&self) -> usize {
        let mut stopped = 0;
        for task in self.registry.list_tasks() {
            if self.registry.request_stop(task.id) {
                stopped += 1;
            }
        }
        if stopped > 0 {
            log::info!("Stop requested for {stopped} task(s)");
        }
        stopped
    }

    /// Number of tasks currently downloading.
    #[must_use]
    pub fn active_download_count(&self) -> usize {
        self.registry.active_download_count()
    }

    /// Whether the task exists and is currently downloading.
    #[must_use]
    pub fn is_task_downloading(&self, id: TaskId) -> bool {
        self.registry
            .get_task(id)
            .is_some_and(|task| task.status == TaskStatus::Downloading)
    }

    /// Subscribes to one task's status and progress events.
    ///
    /// Returns `None` for an unknown id. Any number of observers can
    /// subscribe independently.
    #[must_use]
    pub fn subscribe(&self, id: TaskId) -> Option<broadcast::Receiver<TaskEvent>> {
        self.registry.subscribe(id)
    }

    /// Formerly registered a process-wide progress callback.
    ///
    /// The callback is neither stored nor invoked anymore; the call is a
    /// guaranteed no-op. Poll the registry or use
    /// [`Orchestrator::subscribe`] instead.
    #[deprecated(note = "callbacks are no longer invoked; poll the registry or subscribe to task events")]
    pub fn set_progress_callback<F>(&self, _callback: F)
    where
        F: Fn(TaskId, u8) + Send + Sync + 'static,
    {
    }

    /// The registry holding all tasks, for observers.
    #[must_use]
    pub fn registry(&self) -> Arc<QueueRegistry> {
        Arc::clone(&self.registry)
    }

    /// The session manager whose cookie file accompanies each fetch.
    #[must_use]
    pub fn session(&self) -> Arc<SessionManager> {
        Arc::clone(&self.session)
    }
}

impl Drop for Orchestrator {
    fn drop(&mut self) {
        // The detached dispatch task must not outlive its orchestrator.
        if let Some(dispatch) = self.dispatch.lock().unwrap().take() {
            dispatch.cancel.cancel();
        }
    }
}

/// The dispatch loop: claims queued tasks while the current mode has
/// capacity, spawns one worker per claim, and sleeps until the registry
/// changes or shutdown is requested.
async fn run_dispatch(context: Arc<DispatchContext>, shutdown: CancellationToken) {
    let mut workers = JoinSet::new();
    log::debug!("Dispatch loop started");

    loop {
        loop {
            let limit = context.current_pool_limit();
            let Some(task) = context.registry.claim_next_queued(limit) else {
                break;
            };
            workers.spawn(run_task(Arc::clone(&context), task));
        }

        tokio::select! {
            () = shutdown.cancelled() => break,
            () = context.registry.changed() => {}
            Some(result) = workers.join_next() => {
                if let Err(err) = result {
                    log::error!("Worker task panicked: {err}");
                }
            }
        }
    }

    // Let in-flight fetches finish; queued tasks stay queued.
    while let Some(result) = workers.join_next().await {
        if let Err(err) = result {
            log::error!("Worker task panicked: {err}");
        }
    }
    log::debug!("Dispatch loop stopped");
}

/// Runs one claimed task to a terminal status.
///
/// The fetch itself runs on its own spawned task: a fetcher that panics
/// is contained there and converted into a Failed task, so the claim is
/// always released and the pool slot never wedges.
async fn run_task(context: Arc<DispatchContext>, task: Task) {
    let id = task.id;
    let registry = &context.registry;
    let Some(token) = registry.cancellation_token(id) else {
        return;
    };

    // Checkpoint before any work: the stop may have landed between the
    // claim and this worker starting.
    if token.is_cancelled() {
        registry.compare_and_set_status(id, TaskStatus::Downloading, TaskStatus::Stopped);
        log::info!("Task {id} stopped");
        return;
    }

    // The destination must be usable before the fetch service is involved.
    if let Some(message) = context.ensure_download_dir().await {
        registry.fail_task(id, &message);
        return;
    }

    let request = FetchRequest {
        descriptor: task.descriptor.clone(),
        dest_dir: context.download_dir.clone(),
        cookies_file: context.session.cookies_file(),
    };
    let reporter = RegistryProgress {
        registry: Arc::clone(registry),
        id,
        token: token.clone(),
    };

    log::info!("Task {id}: fetching {}", task.descriptor.url);
    let fetcher = Arc::clone(&context.fetcher);
    let mut fetch = tokio::spawn(async move { fetcher.fetch(&request, &reporter).await });

    let result = tokio::select! {
        joined = &mut fetch => match joined {
            Ok(result) => result,
            Err(err) => {
                log::error!("Task {id}: fetch panicked: {err}");
                registry.fail_task(id, "worker panicked");
                return;
            }
        },
        () = token.cancelled() => {
            fetch.abort();
            Err(Error::Cancelled)
        }
    };

    match result {
        Ok(()) => {
            registry.complete_task(id);
        }
        Err(Error::Cancelled) => {
            registry.compare_and_set_status(id, TaskStatus::Downloading, TaskStatus::Stopped);
            log::info!("Task {id} stopped");
        }
        Err(err) => {
            registry.fail_task(id, &err.to_string());
        }
    }
}

/// Forwards fetcher progress into the registry and doubles as the
/// per-checkpoint stop check.
struct RegistryProgress {
    registry: Arc<QueueRegistry>,
    id: TaskId,
    token: CancellationToken,
}

impl ProgressReporter for RegistryProgress {
    fn report(&self, percent: u8) -> bool {
        if self.token.is_cancelled() {
            return false;
        }
        // A task that is no longer downloading lost a race with a stop;
        // tell the fetcher to give up.
        self.registry.set_progress(self.id, percent)
    }
}
