//! External fetch collaborator.
//!
//! The orchestrator never talks to a video host itself. It hands each
//! task to a [`Fetcher`], which performs the transfer and reports
//! progress through a [`ProgressReporter`].

use std::path::PathBuf;

use async_trait::async_trait;

use crate::error::Result;
use crate::task::VideoDescriptor;

/// Progress sink handed to a fetcher for one task.
pub trait ProgressReporter: Send + Sync {
    /// Reports completed percentage, 0 to 100.
    ///
    /// The return value doubles as a stop signal: `false` means the task
    /// was asked to stop and the fetcher should abandon the transfer and
    /// return [`crate::Error::Cancelled`] at its next opportunity.
    fn report(&self, percent: u8) -> bool;
}

/// Progress reporter that discards reports and never requests a stop.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn report(&self, _percent: u8) -> bool {
        true
    }
}

/// Everything a fetcher needs to transfer one video.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    /// What to download.
    pub descriptor: VideoDescriptor,
    /// Directory the fetched file must be written into.
    pub dest_dir: PathBuf,
    /// Cookie file for authenticated fetches, when a session is active.
    pub cookies_file: Option<PathBuf>,
}

/// Abstraction over the actual video transfer.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetches one video, writing the result under `request.dest_dir`.
    ///
    /// Implementations should call `progress.report` at natural
    /// checkpoints and honor a `false` return by giving up promptly.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Fetch`] when the transfer fails and
    /// [`crate::Error::Cancelled`] when a stop request was honored.
    async fn fetch(&self, request: &FetchRequest, progress: &dyn ProgressReporter) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    struct EchoFetcher;

    #[async_trait]
    impl Fetcher for EchoFetcher {
        async fn fetch(
            &self,
            request: &FetchRequest,
            progress: &dyn ProgressReporter,
        ) -> Result<()> {
            for percent in [25, 50, 75, 100] {
                if !progress.report(percent) {
                    return Err(Error::Cancelled);
                }
            }
            assert!(!request.descriptor.url.is_empty());
            Ok(())
        }
    }

    #[test]
    fn no_progress_never_stops() {
        let progress = NoProgress;
        assert!(progress.report(0));
        assert!(progress.report(100));
    }

    #[tokio::test]
    async fn fetcher_is_object_safe() {
        let fetcher: Box<dyn Fetcher> = Box::new(EchoFetcher);
        let request = FetchRequest {
            descriptor: VideoDescriptor::new("https://example.com/v/1".to_string()),
            dest_dir: PathBuf::from("/tmp"),
            cookies_file: None,
        };
        fetcher.fetch(&request, &NoProgress).await.unwrap();
    }
}
