//! vidqueue - A library for queueing and orchestrating video downloads.
//!
//! This library provides the core task queue, concurrency policy, and
//! session handling for a media downloader, abstracted from any specific
//! UI and from the network backend that actually fetches bytes. The
//! embedding application supplies a [`Fetcher`]; everything else, from
//! queue bookkeeping to cooperative cancellation, lives here.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use vidqueue::{DownloadMode, Orchestrator, OrchestratorConfig, VideoDescriptor};
//!
//! # async fn example(fetcher: Arc<dyn vidqueue::Fetcher>) -> vidqueue::Result<()> {
//! let config = OrchestratorConfig::new()
//!     .with_download_dir("/tmp/videos".into())
//!     .with_workers(4);
//! let orchestrator = Orchestrator::new(config, fetcher);
//!
//! // Optional: authenticate so fetches carry a cookie file
//! orchestrator.session().login("user", "password")?;
//!
//! let task = orchestrator.add_task(
//!     VideoDescriptor::new("https://example.com/v/1".to_string())
//!         .with_quality("720p".to_string()),
//! )?;
//! orchestrator.start();
//!
//! // Policy changes apply to tasks claimed from now on
//! orchestrator.set_download_mode(DownloadMode::MultiThreaded);
//!
//! orchestrator.stop_task(task.id);
//! orchestrator.shutdown().await;
//! # Ok(())
//! # }
//! ```

#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod config;
pub mod error;
pub mod fetch;
pub mod fs;
pub mod orchestrator;
pub mod registry;
pub mod session;
pub mod task;

// Re-export main types for convenience
pub use config::{DownloadMode, OrchestratorConfig};
pub use error::{Error, Result};
pub use fetch::{FetchRequest, Fetcher, NoProgress, ProgressReporter};
pub use fs::{DirCheck, DirectoryValidator, FsDirectoryValidator, PermissiveValidator};
pub use orchestrator::Orchestrator;
pub use registry::{QueueRegistry, QueueStats};
pub use session::SessionManager;
pub use task::{Task, TaskEvent, TaskId, TaskStatus, VideoDescriptor};
