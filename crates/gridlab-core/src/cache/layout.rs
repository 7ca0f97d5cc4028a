use std::path::{Path, PathBuf};

use gridlab_model::BuildKey;
use serde::{Deserialize, Serialize};

/// Where the launcher finds its pieces inside a materialized build.
///
/// All paths are relative to the cache entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ArtifactLayout {
    pub wrapper: PathBuf,
    pub server: PathBuf,
    pub planner: PathBuf,
    pub benchmarks: PathBuf,
}

impl Default for ArtifactLayout {
    fn default() -> Self {
        Self {
            wrapper: PathBuf::from("testbed/wrapper.sh"),
            server: PathBuf::from("testbed/run-server.py"),
            planner: PathBuf::from("prost.py"),
            benchmarks: PathBuf::from("testbed/benchmarks"),
        }
    }
}

/// A materialized build: its key and its location in the cache.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedBuild {
    key: BuildKey,
    path: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    global_rev: Option<String>,
}

impl CachedBuild {
    pub fn new(key: BuildKey, path: impl Into<PathBuf>, global_rev: Option<String>) -> Self {
        Self {
            key,
            path: path.into(),
            global_rev,
        }
    }

    pub fn key(&self) -> &BuildKey {
        &self.key
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn global_rev(&self) -> Option<&str> {
        self.global_rev.as_deref()
    }

    /// Absolute location of an artifact inside this build.
    pub fn artifact(&self, relative: &Path) -> PathBuf {
        self.path.join(relative)
    }
}
