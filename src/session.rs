use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::Credentials;
use crate::error::ProtonErrorOut;

/// Serialized authentication artifacts. Opaque here; the adapter defines the format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionState(Value);

impl SessionState {
    pub fn new(blob: Value) -> Self {
        Self(blob)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }
}

/// The collaborator side of a reusable session.
#[async_trait]
pub trait SessionBackend: Send + Sync {
    /// Adopt a previously exported session. Fails when the blob is not understood.
    fn restore(&mut self, state: &SessionState) -> Result<(), ProtonErrorOut>;

    /// Current session, if one is active.
    fn export(&self) -> Option<SessionState>;

    /// Drop any active session.
    fn reset(&mut self);

    /// True while the active session is accepted by the service.
    async fn probe(&self) -> bool;

    async fn login(&mut self, credentials: &Credentials) -> Result<(), ProtonErrorOut>;
}

#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Missing or malformed files read as "no session".
    pub fn load(&self) -> Option<SessionState> {
        let text = fs::read_to_string(&self.path).ok()?;
        match serde_json::from_str::<SessionState>(&text) {
            Ok(state) if !state.as_value().is_null() => Some(state),
            Ok(_) => None,
            Err(e) => {
                debug!(path = %self.path.display(), error = %e, "ignoring malformed session file");
                None
            }
        }
    }

    pub fn save(&self, state: &SessionState) -> Result<(), ProtonErrorOut> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|e| ProtonErrorOut::config(format!("session dir mkdir failed: {e}")))?;
        }

        let text = serde_json::to_string(state)
            .map_err(|e| ProtonErrorOut::config(format!("session serialize failed: {e}")))?;

        // Best-effort atomic write.
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, text)
            .map_err(|e| ProtonErrorOut::config(format!("session write failed: {e}")))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let _ = fs::set_permissions(&tmp, fs::Permissions::from_mode(0o600));
        }

        fs::rename(&tmp, &self.path)
            .map_err(|e| ProtonErrorOut::config(format!("session rename failed: {e}")))
    }

    pub fn discard(&self) {
        if let Err(e) = fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %self.path.display(), error = %e, "could not remove stale session");
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOrigin {
    Restored,
    LoggedIn,
}

pub struct SessionManager {
    store: SessionStore,
    probe_timeout: Duration,
}

impl SessionManager {
    pub fn new(store: SessionStore, probe_timeout: Duration) -> Self {
        Self {
            store,
            probe_timeout,
        }
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Bounded liveness probe. A probe that does not answer in time counts as logged out.
    pub async fn validate<B>(&self, backend: &B) -> bool
    where
        B: SessionBackend + ?Sized,
    {
        match tokio::time::timeout(self.probe_timeout, backend.probe()).await {
            Ok(alive) => alive,
            Err(_) => {
                debug!(timeout_ms = self.probe_timeout.as_millis() as u64, "session probe timed out");
                false
            }
        }
    }

    /// Restores the cached session or logs in. Logs in at most once.
    pub async fn establish<B>(
        &self,
        backend: &mut B,
        credentials: &Credentials,
    ) -> Result<SessionOrigin, ProtonErrorOut>
    where
        B: SessionBackend + ?Sized,
    {
        if let Some(state) = self.store.load() {
            match backend.restore(&state) {
                Ok(()) => {
                    if self.validate(&*backend).await {
                        debug!("reusing cached session");
                        return Ok(SessionOrigin::Restored);
                    }
                    info!("cached session expired; logging in again");
                }
                Err(e) => info!(error = %e, "cached session unreadable; logging in again"),
            }
            self.store.discard();
            backend.reset();
        }

        backend.login(credentials).await?;

        if let Some(state) = backend.export() {
            self.store.save(&state)?;
        }
        Ok(SessionOrigin::LoggedIn)
    }

    /// Writes the latest session state back. Failures are logged, never fatal.
    pub fn persist<B>(&self, backend: &B)
    where
        B: SessionBackend + ?Sized,
    {
        let Some(state) = backend.export() else {
            return;
        };
        if let Err(e) = self.store.save(&state) {
            warn!(error = %e.message, "failed to persist session");
        }
    }
}
