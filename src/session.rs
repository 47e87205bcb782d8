//! Authenticated session and cookie file lifecycle.
//!
//! A [`SessionManager`] owns the login state for the process and the
//! cookie file under a configured cookies directory. The cookie file is
//! a plain Netscape-format text container so the external fetch service
//! and [`SessionManager::import_cookies_from_file`] can both read it.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::Utc;

use crate::error::Result;

/// File name of the managed cookie container.
const COOKIES_FILE: &str = "cookies.txt";

/// First line of a Netscape-format cookie file.
const NETSCAPE_HEADER: &str = "# Netscape HTTP Cookie File";

/// Mutable login state, guarded by the manager's mutex.
#[derive(Debug, Default)]
struct SessionState {
    logged_in: bool,
    username: String,
    cookies_file: Option<PathBuf>,
}

/// Tracks the current login session and its persisted cookie file.
///
/// All operations are safe against concurrent invocation; each takes the
/// internal lock for the duration of the call.
#[derive(Debug)]
pub struct SessionManager {
    cookies_dir: PathBuf,
    cookie_domain: String,
    state: Mutex<SessionState>,
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new(Self::default_cookies_dir())
    }
}

impl SessionManager {
    /// Creates a logged-out manager rooted at the given cookies directory.
    #[must_use]
    pub fn new(cookies_dir: PathBuf) -> Self {
        Self {
            cookies_dir,
            cookie_domain: "example.com".to_string(),
            state: Mutex::new(SessionState::default()),
        }
    }

    /// Sets the host domain recorded in cookie entries written on login.
    #[must_use]
    pub fn with_cookie_domain(mut self, domain: String) -> Self {
        self.cookie_domain = domain;
        self
    }

    /// Returns the default cookies directory.
    ///
    /// Uses `STATE_DIRECTORY` (set by systemd when `StateDirectory=` is
    /// configured), falling back to `$XDG_DATA_HOME/vidqueue` for
    /// interactive use.
    #[must_use]
    pub fn default_cookies_dir() -> PathBuf {
        if let Ok(state_dir) = std::env::var("STATE_DIRECTORY") {
            PathBuf::from(state_dir).join("cookies")
        } else {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("vidqueue")
                .join("cookies")
        }
    }

    /// Logs in and persists a cookie file for the new session.
    ///
    /// Returns `Ok(false)` without touching any state when either
    /// credential is blank or the username contains control characters.
    /// A repeated login replaces the previous session and rewrites the
    /// cookie file.
    ///
    /// # Errors
    ///
    /// Returns an error if the cookies directory cannot be created or the
    /// cookie file cannot be written.
    pub fn login(&self, username: &str, password: &str) -> Result<bool> {
        if username.trim().is_empty() || password.trim().is_empty() {
            log::warn!("Login rejected: empty credentials");
            return Ok(false);
        }
        // Tabs and newlines would corrupt the tab-separated cookie lines.
        if username.chars().any(char::is_control) {
            log::warn!("Login rejected: control characters in username");
            return Ok(false);
        }

        let mut state = self.state.lock().unwrap();

        let path = self.cookies_dir.join(COOKIES_FILE);
        let contents = self.render_cookie_file(username);
        write_atomic(&self.cookies_dir, &path, &contents)?;

        state.logged_in = true;
        state.username = username.to_string();
        state.cookies_file = Some(path);
        log::info!("Logged in as {username}");
        Ok(true)
    }

    /// Logs out, resetting the session to its initial state.
    ///
    /// The on-disk cookie file is left in place; use
    /// [`SessionManager::discard_cookies`] to remove it.
    pub fn logout(&self) {
        let mut state = self.state.lock().unwrap();
        if state.logged_in {
            log::info!("Logged out {}", state.username);
        }
        *state = SessionState::default();
    }

    /// Whether a session is currently active.
    #[must_use]
    pub fn is_logged_in(&self) -> bool {
        self.state.lock().unwrap().logged_in
    }

    /// The logged-in username, or an empty string when logged out.
    #[must_use]
    pub fn username(&self) -> String {
        self.state.lock().unwrap().username.clone()
    }

    /// Path of the active session's cookie file.
    ///
    /// The file's existence on disk is authoritative: returns `None`
    /// until a login or import succeeded and the file is still present.
    #[must_use]
    pub fn cookies_file(&self) -> Option<PathBuf> {
        let state = self.state.lock().unwrap();
        state.cookies_file.clone().filter(|path| path.exists())
    }

    /// Adopts an externally exported cookie container as the session.
    ///
    /// The container is copied into the cookies directory and the session
    /// becomes logged in; the username is left as it was, since a cookie
    /// export carries no username. Returns `Ok(false)` when the source
    /// cannot be read or does not look like a cookie container.
    ///
    /// # Errors
    ///
    /// Returns an error if the adopted copy cannot be written.
    pub fn import_cookies_from_file(&self, path: &Path) -> Result<bool> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(err) => {
                log::warn!("Cookie import failed to read {}: {err}", path.display());
                return Ok(false);
            }
        };

        if !looks_like_cookie_container(&contents) {
            log::warn!(
                "Cookie import rejected {}: not a cookie container",
                path.display()
            );
            return Ok(false);
        }

        let mut state = self.state.lock().unwrap();

        let dest = self.cookies_dir.join(COOKIES_FILE);
        write_atomic(&self.cookies_dir, &dest, &contents)?;

        state.logged_in = true;
        state.cookies_file = Some(dest);
        log::info!("Imported cookies from {}", path.display());
        Ok(true)
    }

    /// Deletes the on-disk cookie file, if any, and forgets its path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be removed.
    pub fn discard_cookies(&self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(path) = state.cookies_file.take() {
            match std::fs::remove_file(&path) {
                Ok(()) => {}
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                Err(err) => return Err(err.into()),
            }
        }
        Ok(())
    }

    /// Renders a fresh Netscape cookie file for a login session.
    fn render_cookie_file(&self, username: &str) -> String {
        let expiry = (Utc::now() + chrono::Duration::days(30)).timestamp();
        let token = uuid::Uuid::new_v4().to_string();
        let mut out = String::new();
        out.push_str(NETSCAPE_HEADER);
        out.push('\n');
        for (name, value) in [
            ("session_username", username),
            ("session_token", token.as_str()),
        ] {
            out.push_str(&format!(
                ".{}\tTRUE\t/\tTRUE\t{expiry}\t{name}\t{value}\n",
                self.cookie_domain
            ));
        }
        out
    }
}

/// Writes `contents` to `path` atomically (write tmp + rename).
fn write_atomic(dir: &Path, path: &Path, contents: &str) -> Result<()> {
    std::fs::create_dir_all(dir)?;

    let tmp_path = path.with_extension("txt.tmp");
    std::fs::write(&tmp_path, contents)?;

    // Cookie material grants account access; keep it owner-only on Unix.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(&tmp_path, perms)?;
    }

    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

/// Whether `contents` is recognizable as a Netscape-style cookie container.
///
/// Accepts files carrying the standard header as well as headerless
/// exports, as long as at least one line parses as a seven-field entry.
fn looks_like_cookie_container(contents: &str) -> bool {
    let mut lines = contents.lines().filter(|line| !line.trim().is_empty());
    let Some(first) = lines.next() else {
        return false;
    };
    if first.trim_start().starts_with(NETSCAPE_HEADER) {
        return true;
    }
    std::iter::once(first)
        .chain(lines)
        .filter(|line| !line.trim_start().starts_with('#'))
        .any(|line| line.split('\t').count() == 7)
}
