//! Task model for queued video downloads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};

/// Opaque identifier for a queued task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaskId(Uuid);

impl TaskId {
    /// Generates a fresh unique identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Lifecycle status of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskStatus {
    /// Waiting for a worker slot.
    Queued,
    /// A worker is fetching the video.
    Downloading,
    /// The fetch finished successfully.
    Completed,
    /// The fetch failed; the task carries the error detail.
    Failed,
    /// The task was stopped before it could complete.
    Stopped,
}

impl TaskStatus {
    /// Returns the lowercase name of this status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Downloading => "downloading",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Stopped => "stopped",
        }
    }

    /// Whether this status is final. Terminal tasks never change status
    /// again.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Stopped)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Description of a video to download.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoDescriptor {
    /// Source URL of the video.
    pub url: String,
    /// Human-readable title, when known ahead of the fetch.
    pub title: Option<String>,
    /// Preferred quality label, e.g. `"720p"`.
    pub quality: Option<String>,
    /// Preferred container format, e.g. `"mp4"`.
    pub format: Option<String>,
    /// Whether subtitle tracks should be fetched alongside the video.
    pub include_subtitles: bool,
}

impl VideoDescriptor {
    /// Creates a descriptor for the given source URL.
    #[must_use]
    pub const fn new(url: String) -> Self {
        Self {
            url,
            title: None,
            quality: None,
            format: None,
            include_subtitles: false,
        }
    }

    /// Sets the human-readable title.
    #[must_use]
    pub fn with_title(mut self, title: String) -> Self {
        self.title = Some(title);
        self
    }

    /// Sets the preferred quality label.
    #[must_use]
    pub fn with_quality(mut self, quality: String) -> Self {
        self.quality = Some(quality);
        self
    }

    /// Sets the preferred container format.
    #[must_use]
    pub fn with_format(mut self, format: String) -> Self {
        self.format = Some(format);
        self
    }

    /// Sets whether subtitle tracks should be fetched.
    #[must_use]
    pub const fn with_subtitles(mut self, include: bool) -> Self {
        self.include_subtitles = include;
        self
    }

    /// Validates the descriptor before it is admitted to the queue.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidDescriptor`] when the source URL is empty
    /// or blank.
    pub fn validate(&self) -> Result<()> {
        if self.url.trim().is_empty() {
            return Err(Error::InvalidDescriptor(
                "source URL must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Returns the title when set, falling back to the source URL.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.url)
    }
}

/// Snapshot of a queued task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Unique identifier of the task.
    pub id: TaskId,
    /// What the task downloads.
    pub descriptor: VideoDescriptor,
    /// Current lifecycle status.
    pub status: TaskStatus,
    /// Completed percentage, 0 to 100.
    pub progress: u8,
    /// Failure detail, set when the status is [`TaskStatus::Failed`].
    pub error: Option<String>,
    /// When the task was added to the queue.
    pub created_at: DateTime<Utc>,
}

impl Task {
    /// Creates a freshly queued task for the given descriptor.
    #[must_use]
    pub fn new(descriptor: VideoDescriptor) -> Self {
        Self {
            id: TaskId::new(),
            descriptor,
            status: TaskStatus::Queued,
            progress: 0,
            error: None,
            created_at: Utc::now(),
        }
    }
}

/// Events published for a task over its subscription channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskEvent {
    /// The task moved to a new lifecycle status.
    StatusChanged {
        /// Task that changed.
        id: TaskId,
        /// Status the task moved to.
        status: TaskStatus,
        /// Failure detail when the new status is [`TaskStatus::Failed`].
        error: Option<String>,
    },
    /// Fetch progress for a downloading task.
    Progress {
        /// Task reporting progress.
        id: TaskId,
        /// Completed percentage, 0 to 100.
        percent: u8,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_task_is_queued() {
        let task = Task::new(VideoDescriptor::new("https://example.com/v/1".to_string()));
        assert_eq!(task.status, TaskStatus::Queued);
        assert_eq!(task.progress, 0);
        assert!(task.error.is_none());
    }

    #[test]
    fn task_ids_are_unique() {
        let a = TaskId::new();
        let b = TaskId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn descriptor_builder() {
        let descriptor = VideoDescriptor::new("https://example.com/v/1".to_string())
            .with_title("Intro".to_string())
            .with_quality("720p".to_string())
            .with_format("mp4".to_string())
            .with_subtitles(true);

        assert_eq!(descriptor.title.as_deref(), Some("Intro"));
        assert_eq!(descriptor.quality.as_deref(), Some("720p"));
        assert_eq!(descriptor.format.as_deref(), Some("mp4"));
        assert!(descriptor.include_subtitles);
    }

    #[test]
    fn blank_url_fails_validation() {
        for url in ["", "   ", "\t\n"] {
            let err = VideoDescriptor::new(url.to_string()).validate().unwrap_err();
            assert!(matches!(err, Error::InvalidDescriptor(_)));
        }
    }

    #[test]
    fn valid_url_passes_validation() {
        let descriptor = VideoDescriptor::new("https://example.com/v/1".to_string());
        assert!(descriptor.validate().is_ok());
    }

    #[test]
    fn display_name_prefers_title() {
        let plain = VideoDescriptor::new("https://example.com/v/1".to_string());
        assert_eq!(plain.display_name(), "https://example.com/v/1");

        let titled = plain.clone().with_title("Intro".to_string());
        assert_eq!(titled.display_name(), "Intro");
    }

    #[test]
    fn terminal_statuses() {
        assert!(!TaskStatus::Queued.is_terminal());
        assert!(!TaskStatus::Downloading.is_terminal());
        assert!(TaskStatus::Completed.is_terminal());
        assert!(TaskStatus::Failed.is_terminal());
        assert!(TaskStatus::Stopped.is_terminal());
    }

    #[test]
    fn status_names() {
        assert_eq!(TaskStatus::Queued.to_string(), "queued");
        assert_eq!(TaskStatus::Downloading.to_string(), "downloading");
        assert_eq!(TaskStatus::Stopped.to_string(), "stopped");
    }

    #[test]
    fn task_snapshot_round_trip() {
        let task = Task::new(
            VideoDescriptor::new("https://example.com/v/1".to_string())
                .with_title("Intro".to_string())
                .with_subtitles(true),
        );

        let toml_str = toml::to_string(&task).unwrap();
        let loaded: Task = toml::from_str(&toml_str).unwrap();

        assert_eq!(loaded.id, task.id);
        assert_eq!(loaded.status, task.status);
        assert_eq!(loaded.created_at, task.created_at);
        assert_eq!(loaded.descriptor, task.descriptor);
        assert!(loaded.error.is_none());
    }
}
