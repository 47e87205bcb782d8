//! Thread-safe, insertion-ordered task registry.
//!
//! The registry owns every [`Task`]. Workers and the controlling thread
//! never touch task state directly; all mutation funnels through the
//! registry's lock so that a stop request racing a worker's natural
//! completion resolves to exactly one terminal status.

use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tokio::sync::{Notify, broadcast};
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::task::{Task, TaskEvent, TaskId, TaskStatus, VideoDescriptor};

/// Buffered events per task subscription. Slow subscribers lag and drop
/// old events rather than block workers.
const EVENT_CAPACITY: usize = 64;

/// A task plus its runtime companions.
#[derive(Debug)]
struct TaskSlot {
    task: Task,
    cancel: CancellationToken,
    events: broadcast::Sender<TaskEvent>,
}

impl TaskSlot {
    fn new(task: Task) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            task,
            cancel: CancellationToken::new(),
            events,
        }
    }

    fn publish_status(&self) {
        let _ = self.events.send(TaskEvent::StatusChanged {
            id: self.task.id,
            status: self.task.status,
            error: self.task.error.clone(),
        });
    }
}

/// Per-status task counts, as returned by [`QueueRegistry::stats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct QueueStats {
    /// Tasks waiting for a worker slot.
    pub queued: usize,
    /// Tasks currently being fetched.
    pub downloading: usize,
    /// Tasks that finished successfully.
    pub completed: usize,
    /// Tasks that failed.
    pub failed: usize,
    /// Tasks stopped before completion.
    pub stopped: usize,
}

impl QueueStats {
    /// Total number of tasks counted.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.queued + self.downloading + self.completed + self.failed + self.stopped
    }
}

/// Insertion-ordered store of all tasks, shared between the controlling
/// thread and the worker pool.
#[derive(Debug, Default)]
pub struct QueueRegistry {
    slots: Mutex<Vec<TaskSlot>>,
    changed: Notify,
}

impl QueueRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates a descriptor and appends a freshly queued task.
    ///
    /// The task is visible to the dispatch loop as soon as this returns.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidDescriptor`] when the descriptor
    /// fails validation; nothing is queued in that case.
    pub fn add_task(&self, descriptor: VideoDescriptor) -> Result<Task> {
        descriptor.validate()?;
        let task = Task::new(descriptor);
        let snapshot = task.clone();

        let mut slots = self.slots.lock().unwrap();
        log::debug!("Queued task {} for {}", task.id, task.descriptor.url);
        slots.push(TaskSlot::new(task));
        drop(slots);

        self.changed.notify_one();
        Ok(snapshot)
    }

    /// Returns a snapshot of the task with the given id.
    #[must_use]
    pub fn get_task(&self, id: TaskId) -> Option<Task> {
        let slots = self.slots.lock().unwrap();
        slots
            .iter()
            .find(|slot| slot.task.id == id)
            .map(|slot| slot.task.clone())
    }

    /// Returns snapshots of all tasks in insertion order.
    #[must_use]
    pub fn list_tasks(&self) -> Vec<Task> {
        let slots = self.slots.lock().unwrap();
        slots.iter().map(|slot| slot.task.clone()).collect()
    }

    /// Number of tasks in the registry.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.lock().unwrap().len()
    }

    /// Whether the registry holds no tasks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.lock().unwrap().is_empty()
    }

    /// Number of tasks currently in [`TaskStatus::Downloading`].
    #[must_use]
    pub fn active_download_count(&self) -> usize {
        let slots = self.slots.lock().unwrap();
        slots
            .iter()
            .filter(|slot| slot.task.status == TaskStatus::Downloading)
            .count()
    }

    /// Per-status counts over all tasks.
    #[must_use]
    pub fn stats(&self) -> QueueStats {
        let slots = self.slots.lock().unwrap();
        let mut stats = QueueStats::default();
        for slot in slots.iter() {
            match slot.task.status {
                TaskStatus::Queued => stats.queued += 1,
                TaskStatus::Downloading => stats.downloading += 1,
                TaskStatus::Completed => stats.completed += 1,
                TaskStatus::Failed => stats.failed += 1,
                TaskStatus::Stopped => stats.stopped += 1,
            }
        }
        stats
    }

    /// Subscribes to the event stream of one task.
    ///
    /// Returns `None` for an unknown id. Every subscriber gets its own
    /// receiver; subscribing never displaces other observers.
    #[must_use]
    pub fn subscribe(&self, id: TaskId) -> Option<broadcast::Receiver<TaskEvent>> {
        let slots = self.slots.lock().unwrap();
        slots
            .iter()
            .find(|slot| slot.task.id == id)
            .map(|slot| slot.events.subscribe())
    }

    /// Removes all terminal tasks and returns how many were dropped.
    pub fn clear_finished(&self) -> usize {
        let mut slots = self.slots.lock().unwrap();
        let before = slots.len();
        slots.retain(|slot| !slot.task.status.is_terminal());
        before - slots.len()
    }

    /// Atomically transitions a task from `expected` to `new`.
    ///
    /// Refuses unknown ids, mismatched current status, no-op transitions
    /// and any transition out of a terminal status.
    pub(crate) fn compare_and_set_status(
        &self,
        id: TaskId,
        expected: TaskStatus,
        new: TaskStatus,
    ) -> bool {
        let mut slots = self.slots.lock().unwrap();
        let Some(slot) = slots.iter_mut().find(|slot| slot.task.id == id) else {
            return false;
        };
        if slot.task.status != expected || expected == new || expected.is_terminal() {
            return false;
        }
        slot.task.status = new;
        if new == TaskStatus::Completed {
            slot.task.progress = 100;
        }
        slot.publish_status();
        drop(slots);

        self.changed.notify_one();
        true
    }

    /// Claims the earliest queued task, if the number of tasks already
    /// downloading is below `limit`.
    ///
    /// Claiming transitions the task to [`TaskStatus::Downloading`] in
    /// the same critical section as the limit check, so concurrent
    /// claimers can never exceed the pool size.
    pub(crate) fn claim_next_queued(&self, limit: usize) -> Option<Task> {
        let mut slots = self.slots.lock().unwrap();
        let downloading = slots
            .iter()
            .filter(|slot| slot.task.status == TaskStatus::Downloading)
            .count();
        if downloading >= limit {
            return None;
        }
        let slot = slots
            .iter_mut()
            .find(|slot| slot.task.status == TaskStatus::Queued)?;
        slot.task.status = TaskStatus::Downloading;
        slot.publish_status();
        log::debug!("Claimed task {}", slot.task.id);
        Some(slot.task.clone())
    }

    /// Marks a downloading task as completed.
    pub(crate) fn complete_task(&self, id: TaskId) -> bool {
        let done = self.compare_and_set_status(id, TaskStatus::Downloading, TaskStatus::Completed);
        if done {
            log::info!("Task {id} completed");
        }
        done
    }

    /// Marks a downloading task as failed and records the error message.
    pub(crate) fn fail_task(&self, id: TaskId, message: &str) -> bool {
        let mut slots = self.slots.lock().unwrap();
        let Some(slot) = slots.iter_mut().find(|slot| slot.task.id == id) else {
            return false;
        };
        if slot.task.status != TaskStatus::Downloading {
            return false;
        }
        slot.task.status = TaskStatus::Failed;
        slot.task.error = Some(message.to_string());
        slot.publish_status();
        log::warn!("Task {id} failed: {message}");
        drop(slots);

        self.changed.notify_one();
        true
    }

    /// Records fetch progress for a downloading task.
    ///
    /// Progress is clamped to 100 and never decreases; stale reports are
    /// dropped silently. Returns whether the task exists and is
    /// currently downloading.
    pub(crate) fn set_progress(&self, id: TaskId, percent: u8) -> bool {
        let mut slots = self.slots.lock().unwrap();
        let Some(slot) = slots.iter_mut().find(|slot| slot.task.id == id) else {
            return false;
        };
        if slot.task.status != TaskStatus::Downloading {
            return false;
        }
        let percent = percent.min(100);
        if percent > slot.task.progress {
            slot.task.progress = percent;
            let _ = slot.events.send(TaskEvent::Progress { id, percent });
        }
        true
    }

    /// Requests that a task stop, resolving the race against workers in
    /// one critical section.
    ///
    /// A queued task is stopped on the spot. A downloading task only has
    /// its cancellation token tripped; the owning worker performs the
    /// transition at its next checkpoint. Unknown ids and terminal tasks
    /// return `false`.
    pub(crate) fn request_stop(&self, id: TaskId) -> bool {
        let mut slots = self.slots.lock().unwrap();
        let Some(slot) = slots.iter_mut().find(|slot| slot.task.id == id) else {
            return false;
        };
        match slot.task.status {
            TaskStatus::Queued => {
                slot.task.status = TaskStatus::Stopped;
                slot.publish_status();
                log::info!("Task {id} stopped before start");
                drop(slots);
                self.changed.notify_one();
                true
            }
            TaskStatus::Downloading => {
                slot.cancel.cancel();
                log::info!("Stop requested for task {id}");
                true
            }
            _ => false,
        }
    }

    /// Returns the cancellation token of a task.
    pub(crate) fn cancellation_token(&self, id: TaskId) -> Option<CancellationToken> {
        let slots = self.slots.lock().unwrap();
        slots
            .iter()
            .find(|slot| slot.task.id == id)
            .map(|slot| slot.cancel.clone())
    }

    /// Resolves when the registry may have new work or a freed slot.
    pub(crate) async fn changed(&self) {
        self.changed.notified().await;
    }

    /// Wakes the dispatch loop to re-evaluate the queue.
    pub(crate) fn notify_changed(&self) {
        self.changed.notify_one();
    }
}
