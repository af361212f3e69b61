use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::AutomationConfig;
use crate::errors::Result;

/// URL fragments that indicate an authenticated surface.
const AUTHENTICATED_MARKERS: &[&str] = &["/dashboard", "/workspaces", "/tables"];

/// URL fragments that indicate the sign-in flow. These dominate: a URL
/// showing both classes of marker is treated as unauthenticated.
const LOGIN_MARKERS: &[&str] = &["/login", "/signin", "/signup"];

/// On-disk snapshot: `{credentials, savedAt, identity?}`. The credential
/// blob is opaque; nothing outside this store reads its shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub credentials: Vec<Value>,
    pub saved_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SessionInfo {
    pub exists: bool,
    pub age_days: Option<i64>,
    pub identity: Option<String>,
}

pub struct SessionStore {
    profile_dir: PathBuf,
    file_name: String,
    max_age: Duration,
}

impl SessionStore {
    pub fn new(profile_dir: impl Into<PathBuf>, max_age_days: i64) -> Self {
        Self {
            profile_dir: profile_dir.into(),
            file_name: "session.json".to_string(),
            max_age: Duration::days(max_age_days),
        }
    }

    pub fn from_config(config: &AutomationConfig) -> Self {
        Self {
            profile_dir: config.profile_dir.clone(),
            file_name: config.session.file_name.clone(),
            max_age: Duration::days(config.session.max_age_days),
        }
    }

    pub fn profile_dir(&self) -> &Path {
        &self.profile_dir
    }

    pub fn session_path(&self) -> PathBuf {
        self.profile_dir.join(&self.file_name)
    }

    /// Create the profile directory if it does not exist yet.
    pub fn ensure_profile_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.profile_dir)?;
        Ok(())
    }

    /// Overwrite the stored snapshot with a fresh save timestamp.
    pub fn save_session(&self, credentials: Vec<Value>, identity: Option<&str>) -> Result<()> {
        self.ensure_profile_dir()?;
        let snapshot = SessionSnapshot {
            credentials,
            saved_at: Utc::now(),
            identity: identity.map(str::to_string),
        };
        let json = serde_json::to_string_pretty(&snapshot)?;
        fs::write(self.session_path(), json)?;
        debug!(path = %self.session_path().display(), "session snapshot saved");
        Ok(())
    }

    /// Stored credentials, unless the snapshot is absent, unreadable, or
    /// older than the max age. A stale snapshot stays on disk; only
    /// [`SessionStore::clear_session`] deletes it.
    pub fn load_session(&self) -> Option<Vec<Value>> {
        let raw = fs::read_to_string(self.session_path()).ok()?;
        let snapshot: SessionSnapshot = match serde_json::from_str(&raw) {
            Ok(snapshot) => snapshot,
            Err(err) => {
                warn!("session snapshot unreadable: {err}");
                return None;
            }
        };
        let age = Utc::now() - snapshot.saved_at;
        if age > self.max_age {
            debug!(
                age_days = age.num_days(),
                "stored session judged expired; leaving file in place"
            );
            return None;
        }
        Some(snapshot.credentials)
    }

    pub fn clear_session(&self) -> Result<()> {
        let path = self.session_path();
        if path.exists() {
            fs::remove_file(&path)?;
            debug!(path = %path.display(), "session snapshot cleared");
        }
        Ok(())
    }

    /// Pure heuristic over the current URL; no cookie or token inspection.
    pub fn is_authenticated(&self, url: &str) -> bool {
        let lowered = url.to_ascii_lowercase();
        if LOGIN_MARKERS.iter().any(|marker| lowered.contains(marker)) {
            return false;
        }
        AUTHENTICATED_MARKERS
            .iter()
            .any(|marker| lowered.contains(marker))
    }

    /// Existence, whole-day age, and identity of the stored snapshot.
    /// Any read or parse failure degrades to `exists: false`.
    pub fn session_info(&self) -> SessionInfo {
        let raw = match fs::read_to_string(self.session_path()) {
            Ok(raw) => raw,
            Err(_) => return SessionInfo::default(),
        };
        match serde_json::from_str::<SessionSnapshot>(&raw) {
            Ok(snapshot) => SessionInfo {
                exists: true,
                age_days: Some((Utc::now() - snapshot.saved_at).num_days()),
                identity: snapshot.identity,
            },
            Err(_) => SessionInfo::default(),
        }
    }
}
