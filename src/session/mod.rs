//! Session state and its durable storage.
//!
//! [`SessionManager`] is the single owner of the signed-in session: it
//! restores it at start-up, writes it after login or registration, and wipes
//! it on logout. Everything else receives a `&Session` explicitly.

mod auth;
mod guard;

pub use auth::{AuthError, Credentials, Registration};
pub use guard::{guard, landing_route, Access, Route};

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::value_objects::Role;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    pub role: Role,
}

/// An authenticated identity. The token is opaque and never logged.
#[derive(Clone, Debug)]
pub struct Session {
    token: SecretString,
    user: User,
    signed_in_at: DateTime<Utc>,
}

impl Session {
    pub fn new(token: impl Into<String>, user: User) -> Self {
        Self { token: SecretString::from(token.into()), user, signed_in_at: Utc::now() }
    }

    pub fn token(&self) -> &SecretString { &self.token }
    pub fn user(&self) -> &User { &self.user }
    pub fn role(&self) -> Role { self.user.role }
    pub fn signed_in_at(&self) -> DateTime<Utc> { self.signed_in_at }

    /// A blank token counts as signed out.
    pub fn has_token(&self) -> bool { !self.token.expose_secret().trim().is_empty() }
}

/// On-disk form of a [`Session`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredSession {
    pub token: String,
    pub user: User,
    pub signed_in_at: DateTime<Utc>,
}

impl From<&Session> for StoredSession {
    fn from(session: &Session) -> Self {
        Self {
            token: session.token.expose_secret().to_string(),
            user: session.user.clone(),
            signed_in_at: session.signed_in_at,
        }
    }
}

impl From<StoredSession> for Session {
    fn from(stored: StoredSession) -> Self {
        Self { token: SecretString::from(stored.token), user: stored.user, signed_in_at: stored.signed_in_at }
    }
}

#[derive(Debug, Error)]
pub enum SessionStoreError {
    #[error("session storage I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("corrupt session record: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// Durable storage for the session record.
pub trait SessionStore {
    fn load(&self) -> Result<Option<StoredSession>, SessionStoreError>;
    fn save(&self, session: &StoredSession) -> Result<(), SessionStoreError>;
    fn clear(&self) -> Result<(), SessionStoreError>;
}

/// Keeps the session as a JSON file.
#[derive(Clone, Debug)]
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self { Self { path: path.into() } }
    pub fn path(&self) -> &Path { &self.path }
}

impl SessionStore for FileSessionStore {
    fn load(&self) -> Result<Option<StoredSession>, SessionStoreError> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, session: &StoredSession) -> Result<(), SessionStoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        // write-then-rename so a crash never leaves half a record behind
        let tmp = self.path.with_extension("tmp");
        write_private(&tmp, &serde_json::to_vec_pretty(session)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn clear(&self) -> Result<(), SessionStoreError> {
        match fs::remove_file(&self.path) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }
}

/// Writes a file readable by the owner only; it holds the bearer token.
fn write_private(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(path)?;
    // mode only applies on creation; a leftover temp file keeps its bits
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(fs::Permissions::from_mode(0o600))?;
    }
    file.write_all(bytes)?;
    file.sync_all()
}

/// Process-local store, for tests and throwaway sessions.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    record: Mutex<Option<StoredSession>>,
}

impl SessionStore for MemorySessionStore {
    fn load(&self) -> Result<Option<StoredSession>, SessionStoreError> {
        Ok(self.record.lock().unwrap_or_else(|e| e.into_inner()).clone())
    }

    fn save(&self, session: &StoredSession) -> Result<(), SessionStoreError> {
        *self.record.lock().unwrap_or_else(|e| e.into_inner()) = Some(session.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), SessionStoreError> {
        *self.record.lock().unwrap_or_else(|e| e.into_inner()) = None;
        Ok(())
    }
}

#[derive(Debug)]
pub struct SessionManager<S> {
    store: S,
    current: Option<Session>,
}

impl<S: SessionStore> SessionManager<S> {
    /// Restores whatever session the store holds. An unreadable record is
    /// treated as signed out.
    pub fn restore(store: S) -> Self {
        let current = match store.load() {
            Ok(record) => record.map(Session::from).filter(Session::has_token),
            Err(e) => {
                tracing::warn!(error = %e, "ignoring unreadable session record");
                None
            }
        };
        Self { store, current }
    }

    pub fn current(&self) -> Option<&Session> { self.current.as_ref() }
    pub fn role(&self) -> Option<Role> { self.current.as_ref().map(Session::role) }
    pub fn store(&self) -> &S { &self.store }

    /// True iff durable storage holds a token. Freshness is not checked; an
    /// expired token only shows up as a 401 on the next call.
    pub fn is_authenticated(&self) -> bool {
        matches!(self.store.load(), Ok(Some(record)) if !record.token.is_empty())
    }

    pub(crate) fn establish(&mut self, session: Session) -> Result<&Session, SessionStoreError> {
        self.store.save(&StoredSession::from(&session))?;
        tracing::info!(role = %session.role(), email = %session.user().email, "signed in");
        Ok(&*self.current.insert(session))
    }

    /// Always succeeds locally; a storage failure is logged.
    pub fn logout(&mut self) {
        self.current = None;
        if let Err(e) = self.store.clear() {
            tracing::warn!(error = %e, "failed to clear stored session");
        }
        tracing::info!("signed out");
    }
}

#[cfg(test)]
pub(crate) fn customer_session() -> Session {
    let user = User { id: Some(2), name: "Casey".into(), email: "casey@example.com".into(), role: Role::Customer };
    Session::new("customer-token", user)
}

#[cfg(test)]
pub(crate) fn admin_session() -> Session {
    let user = User { id: Some(1), name: "Avery".into(), email: "avery@example.com".into(), role: Role::Admin };
    Session::new("admin-token", user)
}
