use std::fmt;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Session file name in cache directory
const SESSION_FILE: &str = "session.json";

/// Buffer time before expiry to trigger a token refresh (5 minutes)
const TOKEN_REFRESH_BUFFER_MINUTES: i64 = 5;

/// A signed-in provider session.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub uid: String,
    pub email: Option<String>,
    pub id_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("uid", &self.uid)
            .field("email", &self.email)
            .field("id_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

impl Session {
    /// Check if the ID token will expire soon and should be re-issued
    pub fn needs_refresh(&self) -> bool {
        Utc::now() > self.expires_at - Duration::minutes(TOKEN_REFRESH_BUFFER_MINUTES)
    }
}

/// The provider's own persistence of the signed-in session, so a restart
/// comes back signed in.
#[derive(Debug, Clone)]
pub struct SessionFile {
    cache_dir: PathBuf,
}

impl SessionFile {
    pub fn new(cache_dir: PathBuf) -> Self {
        Self { cache_dir }
    }

    /// Load session from disk. Expired sessions are still returned: the
    /// refresh token can re-issue an ID token.
    pub fn load(&self) -> Result<Option<Session>> {
        let path = self.session_path();
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&path).context("Failed to read session file")?;
        let session: Session =
            serde_json::from_str(&contents).context("Failed to parse session file")?;
        Ok(Some(session))
    }

    pub fn save(&self, session: &Session) -> Result<()> {
        let path = self.session_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(session)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    pub fn clear(&self) -> Result<()> {
        let path = self.session_path();
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }

    fn session_path(&self) -> PathBuf {
        self.cache_dir.join(SESSION_FILE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(expires_in_minutes: i64) -> Session {
        Session {
            uid: "uid-1".to_string(),
            email: Some("ada@example.com".to_string()),
            id_token: "id-token".to_string(),
            refresh_token: "refresh-token".to_string(),
            expires_at: Utc::now() + Duration::minutes(expires_in_minutes),
        }
    }

    #[test]
    fn test_refresh_window() {
        assert!(!session(60).needs_refresh());
        assert!(session(3).needs_refresh());
        assert!(session(-1).needs_refresh());
    }

    #[test]
    fn test_debug_redacts_tokens() {
        let rendered = format!("{:?}", session(60));
        assert!(!rendered.contains("id-token"));
        assert!(!rendered.contains("refresh-token"));
        assert!(rendered.contains("uid-1"));
    }

    #[test]
    fn test_session_file_round_trip_and_clear() {
        let dir = tempfile::tempdir().unwrap();
        let file = SessionFile::new(dir.path().join("nested"));
        assert!(file.load().unwrap().is_none());

        let s = session(-5);
        file.save(&s).unwrap();
        assert_eq!(file.load().unwrap(), Some(s));

        file.clear().unwrap();
        assert!(file.load().unwrap().is_none());
    }
}
