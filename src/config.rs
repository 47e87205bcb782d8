//! Configuration types for the download orchestrator.

use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Dispatch mode for the orchestrator worker pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DownloadMode {
    /// One download at a time, in queue order.
    Sequential,
    /// Up to the configured worker count of downloads at once.
    MultiThreaded,
}

impl DownloadMode {
    /// Returns the canonical name of this mode.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sequential => "sequential",
            Self::MultiThreaded => "multi-threaded",
        }
    }

    /// Number of downloads this mode allows in flight at once.
    ///
    /// Sequential mode always yields 1. Multi-threaded mode yields the
    /// configured worker count, never less than 1.
    #[must_use]
    pub const fn pool_limit(self, workers: usize) -> usize {
        match self {
            Self::Sequential => 1,
            Self::MultiThreaded => {
                if workers == 0 {
                    1
                } else {
                    workers
                }
            }
        }
    }
}

impl Default for DownloadMode {
    fn default() -> Self {
        Self::Sequential
    }
}

impl std::fmt::Display for DownloadMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DownloadMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sequential" => Ok(Self::Sequential),
            "multi-threaded" | "multithreaded" | "multi_threaded" => Ok(Self::MultiThreaded),
            _ => Err(Error::InvalidMode(s.to_string())),
        }
    }
}

/// Configuration for the download orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Directory downloaded files are written into.
    pub download_dir: PathBuf,
    /// Worker pool size used by multi-threaded mode.
    pub workers: usize,
    /// Dispatch mode the orchestrator starts in.
    pub mode: DownloadMode,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            download_dir: dirs::download_dir().unwrap_or_else(|| PathBuf::from("downloads")),
            workers: 4,
            mode: DownloadMode::Sequential,
        }
    }
}

impl OrchestratorConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the directory downloaded files are written into.
    #[must_use]
    pub fn with_download_dir(mut self, dir: PathBuf) -> Self {
        self.download_dir = dir;
        self
    }

    /// Sets the worker pool size used by multi-threaded mode.
    #[must_use]
    pub const fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Sets the dispatch mode the orchestrator starts in.
    #[must_use]
    pub const fn with_mode(mut self, mode: DownloadMode) -> Self {
        self.mode = mode;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = OrchestratorConfig::default();
        assert_eq!(config.workers, 4);
        assert_eq!(config.mode, DownloadMode::Sequential);
        assert!(!config.download_dir.as_os_str().is_empty());
    }

    #[test]
    fn builder_pattern() {
        let config = OrchestratorConfig::new()
            .with_download_dir(PathBuf::from("/tmp/videos"))
            .with_workers(2)
            .with_mode(DownloadMode::MultiThreaded);

        assert_eq!(config.download_dir, PathBuf::from("/tmp/videos"));
        assert_eq!(config.workers, 2);
        assert_eq!(config.mode, DownloadMode::MultiThreaded);
    }

    #[test]
    fn mode_parses_known_names() {
        assert_eq!(
            "sequential".parse::<DownloadMode>().unwrap(),
            DownloadMode::Sequential
        );
        assert_eq!(
            "Multi-Threaded".parse::<DownloadMode>().unwrap(),
            DownloadMode::MultiThreaded
        );
        assert_eq!(
            "multithreaded".parse::<DownloadMode>().unwrap(),
            DownloadMode::MultiThreaded
        );
        assert_eq!(
            " multi_threaded ".parse::<DownloadMode>().unwrap(),
            DownloadMode::MultiThreaded
        );
    }

    #[test]
    fn unknown_mode_is_rejected() {
        let err = "turbo".parse::<DownloadMode>().unwrap_err();
        assert!(matches!(err, Error::InvalidMode(ref name) if name == "turbo"));
    }

    #[test]
    fn mode_name_round_trips() {
        for mode in [DownloadMode::Sequential, DownloadMode::MultiThreaded] {
            assert_eq!(mode.to_string().parse::<DownloadMode>().unwrap(), mode);
        }
    }

    #[test]
    fn pool_limit_floors_at_one() {
        assert_eq!(DownloadMode::Sequential.pool_limit(8), 1);
        assert_eq!(DownloadMode::MultiThreaded.pool_limit(0), 1);
        assert_eq!(DownloadMode::MultiThreaded.pool_limit(3), 3);
    }

    #[test]
    fn config_round_trip() {
        let config = OrchestratorConfig::new()
            .with_download_dir(PathBuf::from("/srv/videos"))
            .with_workers(3)
            .with_mode(DownloadMode::MultiThreaded);

        let toml_str = toml::to_string(&config).unwrap();
        let loaded: OrchestratorConfig = toml::from_str(&toml_str).unwrap();

        assert_eq!(loaded.download_dir, config.download_dir);
        assert_eq!(loaded.workers, 3);
        assert_eq!(loaded.mode, DownloadMode::MultiThreaded);
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn mode_parsing_never_panics(s in ".*") {
                let _ = s.parse::<DownloadMode>();
            }

            #[test]
            fn pool_limit_never_zero(workers in 0usize..10_000) {
                prop_assert!(DownloadMode::Sequential.pool_limit(workers) >= 1);
                prop_assert!(DownloadMode::MultiThreaded.pool_limit(workers) >= 1);
            }
        }
    }
}
