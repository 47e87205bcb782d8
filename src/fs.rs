//! Download directory validation.

use std::path::Path;

use async_trait::async_trait;

/// Outcome of a download directory check.
///
/// A rejected directory is an expected condition, not an error: the
/// verdict and its reason travel as plain data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirCheck {
    /// Whether downloads may be written into the directory.
    pub ok: bool,
    /// Reason for rejection; empty when the check passed.
    pub message: String,
}

impl DirCheck {
    /// A passing check.
    #[must_use]
    pub const fn pass() -> Self {
        Self {
            ok: true,
            message: String::new(),
        }
    }

    /// A failing check with the reason for rejection.
    #[must_use]
    pub const fn fail(message: String) -> Self {
        Self { ok: false, message }
    }
}

/// Abstraction over download directory validation for testability.
#[async_trait]
pub trait DirectoryValidator: Send + Sync {
    /// Checks whether downloads may be written into `dir`.
    async fn check_dir(&self, dir: &Path) -> DirCheck;

    /// Creates `dir` when missing, then checks it.
    async fn ensure_dir(&self, dir: &Path) -> DirCheck;
}

/// Default validator backed by `tokio::fs`.
///
/// Verifies that the directory exists, is a directory, and accepts a
/// small probe file.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsDirectoryValidator;

impl FsDirectoryValidator {
    /// Creates a new `FsDirectoryValidator` instance.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl DirectoryValidator for FsDirectoryValidator {
    async fn check_dir(&self, dir: &Path) -> DirCheck {
        let metadata = match tokio::fs::metadata(dir).await {
            Ok(metadata) => metadata,
            Err(_) => {
                return DirCheck::fail(format!(
                    "download directory does not exist: {}",
                    dir.display()
                ));
            }
        };

        if !metadata.is_dir() {
            return DirCheck::fail(format!("not a directory: {}", dir.display()));
        }

        let probe = dir.join(".vidqueue-probe");
        match tokio::fs::File::create(&probe).await {
            Ok(_) => {
                let _ = tokio::fs::remove_file(&probe).await;
                DirCheck::pass()
            }
            Err(err) => DirCheck::fail(format!(
                "download directory is not writable: {}: {err}",
                dir.display()
            )),
        }
    }

    async fn ensure_dir(&self, dir: &Path) -> DirCheck {
        if let Err(err) = tokio::fs::create_dir_all(dir).await {
            return DirCheck::fail(format!(
                "could not create download directory {}: {err}",
                dir.display()
            ));
        }
        self.check_dir(dir).await
    }
}

/// Validator that accepts every directory without touching the disk.
#[derive(Debug, Clone, Copy, Default)]
pub struct PermissiveValidator;

impl PermissiveValidator {
    /// Creates a new `PermissiveValidator` instance.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl DirectoryValidator for PermissiveValidator {
    async fn check_dir(&self, _dir: &Path) -> DirCheck {
        DirCheck::pass()
    }

    async fn ensure_dir(&self, _dir: &Path) -> DirCheck {
        DirCheck::pass()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn check_constructors() {
        assert!(DirCheck::pass().ok);
        assert!(DirCheck::pass().message.is_empty());

        let rejected = DirCheck::fail("no space".to_string());
        assert!(!rejected.ok);
        assert_eq!(rejected.message, "no space");
    }

    #[tokio::test]
    async fn existing_directory_passes() {
        let dir = TempDir::new().unwrap();
        let validator = FsDirectoryValidator::new();

        let check = validator.check_dir(dir.path()).await;
        assert!(check.ok, "unexpected rejection: {}", check.message);
        assert!(!dir.path().join(".vidqueue-probe").exists());
    }

    #[tokio::test]
    async fn missing_directory_fails() {
        let dir = TempDir::new().unwrap();
        let validator = FsDirectoryValidator::new();

        let check = validator.check_dir(&dir.path().join("nope")).await;
        assert!(!check.ok);
        assert!(check.message.contains("does not exist"));
    }

    #[tokio::test]
    async fn file_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("plain.txt");
        std::fs::File::create(&path).unwrap();

        let validator = FsDirectoryValidator::new();
        let check = validator.check_dir(&path).await;
        assert!(!check.ok);
        assert!(check.message.contains("not a directory"));
    }

    #[tokio::test]
    async fn ensure_dir_creates_missing_directories() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("a/b/c");

        let validator = FsDirectoryValidator::new();
        let check = validator.ensure_dir(&nested).await;
        assert!(check.ok, "unexpected rejection: {}", check.message);
        assert!(nested.is_dir());
    }

    #[tokio::test]
    async fn permissive_validator_accepts_anything() {
        let validator = PermissiveValidator::new();
        let check = validator.check_dir(Path::new("/definitely/not/there")).await;
        assert!(check.ok);
        let ensured = validator.ensure_dir(Path::new("/definitely/not/there")).await;
        assert!(ensured.ok);
    }
}
