use std::path::Path;

use async_trait::async_trait;
use gridlab_model::BuildKey;
use serde::{Deserialize, Serialize};

use crate::error::BuildError;

/// Marker file of a complete cache entry.
pub const BUILD_INFO_FILE: &str = "build-info.json";

/// Metadata written next to a materialized build.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildInfo {
    pub key: BuildKey,
    /// Globally unique revision (e.g. the full commit hash) the symbolic revision resolved to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub global_rev: Option<String>,
}

impl BuildInfo {
    pub fn new(key: BuildKey) -> Self {
        Self { key, global_rev: None }
    }

    pub fn with_global_rev(mut self, rev: impl Into<String>) -> Self {
        self.global_rev = Some(rev.into());
        self
    }
}

/// Produces the compiled artifact for one [`BuildKey`].
///
/// The cache hands over an empty `staging` directory and moves it into place once
/// `materialize` succeeds. Implementations must not touch anything outside `staging`.
#[async_trait]
pub trait BuildBackend: Send + Sync {
    /// Backend name used in logs.
    fn name(&self) -> &'static str;

    /// Commit the symbolic revision of `key` points to right now, if the backend can tell.
    ///
    /// The cache names entries after it, so a moved branch gets a fresh build.
    async fn resolve_rev(&self, _key: &BuildKey) -> Result<Option<String>, BuildError> {
        Ok(None)
    }

    /// Check out, compile and post-process `key` into `staging`.
    async fn materialize(&self, key: &BuildKey, staging: &Path) -> Result<BuildInfo, BuildError>;
}
