//! User and request identity.
//!
//! Every request carries a user id that is stable for the installation and a
//! request id that is fresh for every session.  [`InstallationIdentity`]
//! stores the user id next to `settings.toml` and mints request ids from
//! random UUIDs.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// RequestId
// ---------------------------------------------------------------------------

/// Unique identifier of one search session.
///
/// Also the generation stamp on every collaborator event, so an event can be
/// matched against the session it belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(Uuid);

impl RequestId {
    /// A fresh random (v4) id.
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl From<Uuid> for RequestId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// ---------------------------------------------------------------------------
// IdentityProvider
// ---------------------------------------------------------------------------

/// Source of user and request identifiers.
pub trait IdentityProvider: Send + Sync {
    /// Identifier of the user, stable across runs of this installation.
    fn stable_user_id(&self) -> String;

    /// A request id never handed out before.
    fn new_request_id(&self) -> RequestId {
        RequestId::random()
    }
}

// ---------------------------------------------------------------------------
// InstallationIdentity
// ---------------------------------------------------------------------------

/// Errors raised while loading or creating the installation user id.
#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("cannot read user id from {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("cannot write user id to {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Identity backed by a `user-id` file.
///
/// The file is created with a random UUID on first use and read back on
/// every later run.
#[derive(Debug, Clone)]
pub struct InstallationIdentity {
    user_id: String,
}

impl InstallationIdentity {
    /// Load the user id from `path`, creating the file if it is missing or
    /// empty.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError`] when the file cannot be read or written.
    pub fn load_or_create(path: &Path) -> Result<Self, IdentityError> {
        if path.exists() {
            let stored = std::fs::read_to_string(path).map_err(|source| IdentityError::Read {
                path: path.to_path_buf(),
                source,
            })?;
            let stored = stored.trim();
            if !stored.is_empty() {
                return Ok(Self {
                    user_id: stored.to_string(),
                });
            }
        }

        let user_id = Uuid::new_v4().to_string();
        let write_err = |source| IdentityError::Write {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(write_err)?;
        }
        std::fs::write(path, &user_id).map_err(write_err)?;
        log::info!("created installation user id at {}", path.display());

        Ok(Self { user_id })
    }

    /// Identity with a fixed user id, not backed by any file.
    pub fn ephemeral(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
        }
    }
}

impl IdentityProvider for InstallationIdentity {
    fn stable_user_id(&self) -> String {
        self.user_id.clone()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use tempfile::tempdir;

    #[test]
    fn creates_user_id_on_first_use() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("nested").join("user-id");

        let identity = InstallationIdentity::load_or_create(&path).expect("create");
        let on_disk = std::fs::read_to_string(&path).expect("read back");

        assert_eq!(identity.stable_user_id(), on_disk);
        assert!(Uuid::parse_str(&on_disk).is_ok());
    }

    #[test]
    fn user_id_is_stable_across_loads() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("user-id");

        let first = InstallationIdentity::load_or_create(&path).expect("create");
        let second = InstallationIdentity::load_or_create(&path).expect("load");
        assert_eq!(first.stable_user_id(), second.stable_user_id());
    }

    #[test]
    fn empty_file_is_replaced() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("user-id");
        std::fs::write(&path, "  \n").expect("write");

        let identity = InstallationIdentity::load_or_create(&path).expect("load");
        assert!(!identity.stable_user_id().trim().is_empty());
    }

    #[test]
    fn request_ids_are_unique() {
        let identity = InstallationIdentity::ephemeral("user");
        let ids: HashSet<RequestId> = (0..500).map(|_| identity.new_request_id()).collect();
        assert_eq!(ids.len(), 500);
    }

    #[test]
    fn request_id_serialises_as_plain_string() {
        let id = RequestId::random();
        let json = serde_json::to_string(&id).expect("serialise");
        assert_eq!(json, format!("\"{id}\""));
    }
}
