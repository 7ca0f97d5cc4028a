//! Content-addressed cache of compiled planner revisions.
//!
//! Each [`BuildKey`] is materialized at most once: the in-process index is guarded by an async
//! mutex that stays locked for the duration of a build, and entries already present on disk
//! (marked by [`BUILD_INFO_FILE`]) are reused across processes. Entries are named after the
//! commit the revision resolved to, so a branch that moved since the last build is rebuilt.
mod backend;
pub use backend::{BUILD_INFO_FILE, BuildBackend, BuildInfo};

mod layout;
pub use layout::{ArtifactLayout, CachedBuild};

use std::{
    collections::HashMap,
    io,
    path::{Path, PathBuf},
    sync::Arc,
};

use gridlab_model::BuildKey;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::BuildError;

/// Resolved builds of one experiment, keyed by build identity.
pub type BuildIndex = HashMap<BuildKey, CachedBuild>;

/// Commit prefix length in entry directory names.
const GLOBAL_REV_CHARS: usize = 12;

pub struct RevisionCache {
    root: PathBuf,
    backend: Arc<dyn BuildBackend>,
    resolved: Mutex<BuildIndex>,
}

impl RevisionCache {
    pub fn new(root: impl Into<PathBuf>, backend: Arc<dyn BuildBackend>) -> Self {
        Self {
            root: root.into(),
            backend,
            resolved: Mutex::new(HashMap::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Cache directory of `key` at `global_rev`, whether or not it is materialized yet.
    pub fn entry_dir(&self, key: &BuildKey, global_rev: Option<&str>) -> PathBuf {
        match global_rev {
            Some(rev) => {
                let short: String = rev.chars().take(GLOBAL_REV_CHARS).collect();
                self.root.join(format!("{}-{short}", key.dir_name()))
            }
            None => self.root.join(key.dir_name()),
        }
    }

    /// Return the cached build of `key`, materializing it first if needed.
    pub async fn resolve(&self, key: &BuildKey) -> Result<CachedBuild, BuildError> {
        let mut resolved = self.resolved.lock().await;
        if let Some(build) = resolved.get(key) {
            debug!(%key, "revision already resolved");
            return Ok(build.clone());
        }

        let current = self.backend.resolve_rev(key).await?;
        let dir = self.entry_dir(key, current.as_deref());
        let build = match self.read_complete(key, current.as_deref(), &dir).await {
            Some(info) => {
                info!(%key, path = %dir.display(), "reusing cached revision");
                CachedBuild::new(key.clone(), &dir, info.global_rev)
            }
            None => self.materialize(key, current.as_deref(), &dir).await?,
        };

        resolved.insert(key.clone(), build.clone());
        Ok(build)
    }

    /// Resolve every key in order; stops at the first failing build.
    pub async fn resolve_all<'a, I>(&self, keys: I) -> Result<BuildIndex, BuildError>
    where
        I: IntoIterator<Item = &'a BuildKey>,
    {
        let mut index = BuildIndex::new();
        for key in keys {
            if index.contains_key(key) {
                continue;
            }
            let build = self.resolve(key).await?;
            index.insert(key.clone(), build);
        }
        Ok(index)
    }

    async fn read_complete(&self, key: &BuildKey, current: Option<&str>, dir: &Path) -> Option<BuildInfo> {
        let raw = match tokio::fs::read(dir.join(BUILD_INFO_FILE)).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(%key, error = %e, "cannot read build info, rebuilding");
                return None;
            }
        };
        match serde_json::from_slice::<BuildInfo>(&raw) {
            Ok(info) if &info.key == key => {
                if current.is_some() && info.global_rev.as_deref() != current {
                    warn!(%key, found = ?info.global_rev, expected = ?current, "cached build is of another commit, rebuilding");
                    return None;
                }
                Some(info)
            }
            Ok(info) => {
                warn!(%key, found = %info.key, "build info belongs to another key, rebuilding");
                None
            }
            Err(e) => {
                warn!(%key, error = %e, "corrupt build info, rebuilding");
                None
            }
        }
    }

    async fn materialize(
        &self,
        key: &BuildKey,
        current: Option<&str>,
        dir: &Path,
    ) -> Result<CachedBuild, BuildError> {
        let io_err = |path: &Path| {
            let key = key.to_string();
            let path = path.to_path_buf();
            move |source: io::Error| BuildError::Io { key, path, source }
        };

        let mut staging = dir.as_os_str().to_os_string();
        staging.push(".tmp");
        let staging = PathBuf::from(staging);
        remove_dir_if_exists(&staging).await.map_err(io_err(&staging))?;
        tokio::fs::create_dir_all(&staging)
            .await
            .map_err(io_err(&staging))?;

        info!(%key, backend = self.backend.name(), "caching revision");
        let info = match self.backend.materialize(key, &staging).await {
            Ok(info) => info,
            Err(e) => {
                if let Err(cleanup) = remove_dir_if_exists(&staging).await {
                    warn!(%key, error = %cleanup, "cannot remove staging directory");
                }
                return Err(e);
            }
        };

        if current.is_some() && info.global_rev.as_deref() != current {
            if let Err(cleanup) = remove_dir_if_exists(&staging).await {
                warn!(%key, error = %cleanup, "cannot remove staging directory");
            }
            return Err(BuildError::StepFailed {
                key: key.to_string(),
                step: "checkout".into(),
                reason: format!(
                    "revision moved from {} to {} during the build",
                    current.unwrap_or("-"),
                    info.global_rev.as_deref().unwrap_or("-")
                ),
            });
        }

        let marker = staging.join(BUILD_INFO_FILE);
        let body = serde_json::to_vec_pretty(&info).map_err(|e| BuildError::StepFailed {
            key: key.to_string(),
            step: "write build info".into(),
            reason: e.to_string(),
        })?;
        tokio::fs::write(&marker, body)
            .await
            .map_err(io_err(&marker))?;

        // An incomplete entry from an interrupted run has no marker; replace it.
        remove_dir_if_exists(dir).await.map_err(io_err(dir))?;
        tokio::fs::rename(&staging, dir)
            .await
            .map_err(io_err(dir))?;

        info!(%key, path = %dir.display(), global_rev = info.global_rev.as_deref().unwrap_or("-"), "revision cached");
        Ok(CachedBuild::new(key.clone(), dir, info.global_rev))
    }
}

async fn remove_dir_if_exists(path: &Path) -> io::Result<()> {
    match tokio::fs::remove_dir_all(path).await {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}
