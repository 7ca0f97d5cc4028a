use std::{
    fmt,
    hash::{Hash, Hasher},
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Identity of one compiled artifact: repository, revision and build options.
///
/// Two keys are equal when repository and revision match and the options are equal as sets
/// after sorting; the order in which options were given does not matter. The options keep their
/// original order for invoking the build entrypoint.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildKey {
    repo: PathBuf,
    rev: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    options: Vec<String>,
}

impl BuildKey {
    pub fn new<P, R, I, O>(repo: P, rev: R, options: I) -> Self
    where
        P: Into<PathBuf>,
        R: Into<String>,
        I: IntoIterator<Item = O>,
        O: Into<String>,
    {
        Self {
            repo: repo.into(),
            rev: rev.into(),
            options: options.into_iter().map(Into::into).collect(),
        }
    }

    pub fn repo(&self) -> &Path {
        &self.repo
    }

    pub fn rev(&self) -> &str {
        &self.rev
    }

    /// Build options in the order they were given.
    pub fn options(&self) -> &[String] {
        &self.options
    }

    fn sorted_options(&self) -> Vec<&str> {
        let mut opts: Vec<&str> = self.options.iter().map(String::as_str).collect();
        opts.sort_unstable();
        opts
    }

    /// Stable SHA-256 (hex) over repository, revision and sorted options.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(b"repo:");
        hasher.update(self.repo.to_string_lossy().as_bytes());
        hasher.update(b"\nrev:");
        hasher.update(self.rev.trim().as_bytes());
        for opt in self.sorted_options() {
            hasher.update(b"\nopt:");
            hasher.update(opt.as_bytes());
        }
        hex::encode(hasher.finalize())
    }

    /// Cache directory name: `<repo-basename>-<16 hex chars of the digest>`.
    pub fn dir_name(&self) -> String {
        let base = self
            .repo
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| "repo".to_string());
        let base: String = base
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        format!("{base}-{}", &self.digest()[..16])
    }
}

impl PartialEq for BuildKey {
    fn eq(&self, other: &Self) -> bool {
        self.repo == other.repo
            && self.rev.trim() == other.rev.trim()
            && self.sorted_options() == other.sorted_options()
    }
}

impl Eq for BuildKey {}

impl Hash for BuildKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.repo.hash(state);
        self.rev.trim().hash(state);
        self.sorted_options().hash(state);
    }
}

impl fmt::Display for BuildKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.repo.display(), self.rev)?;
        if !self.options.is_empty() {
            write!(f, " [{}]", self.options.join(" "))?;
        }
        Ok(())
    }
}
