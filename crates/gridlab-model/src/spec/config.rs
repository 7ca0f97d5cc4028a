use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::BuildKey;

/// One algorithm configuration: a planner build plus the search-engine descriptor passed to it.
///
/// Equality ignores `name`: two configs are equal when they would run the same build with the
/// same descriptor, which is exactly the duplicate the grid builder rejects.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigSpec {
    /// Unique algorithm name used in properties and reports (e.g. `"ipc14"`).
    pub name: String,
    /// Path to the planner repository.
    pub repo: PathBuf,
    /// Revision to check out (branch, tag or commit).
    pub rev: String,
    /// Search-engine descriptor such as `IPC2011` or `THTS -act [UCB1]`; the launcher wraps it in brackets.
    pub descriptor: String,
    /// Options for the build entrypoint (build names, `-j6`, ...).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub build_options: Vec<String>,
}

impl ConfigSpec {
    pub fn new(
        name: impl Into<String>,
        repo: impl Into<PathBuf>,
        rev: impl Into<String>,
        descriptor: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            repo: repo.into(),
            rev: rev.into(),
            descriptor: descriptor.into(),
            build_options: Vec::new(),
        }
    }

    /// Builder-style helper to set build options.
    pub fn with_build_options<I, O>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = O>,
        O: Into<String>,
    {
        self.build_options = options.into_iter().map(Into::into).collect();
        self
    }

    /// Key of the cached build this config runs.
    pub fn build_key(&self) -> BuildKey {
        BuildKey::new(&self.repo, &self.rev, &self.build_options)
    }
}

impl PartialEq for ConfigSpec {
    fn eq(&self, other: &Self) -> bool {
        self.build_key() == other.build_key() && self.descriptor == other.descriptor
    }
}

#[cfg(test)]
mod tests {
    use super::ConfigSpec;

    #[test]
    fn equality_ignores_name() {
        let a = ConfigSpec::new("ipc14", "/src/prost", "master", "IPC2014");
        let b = ConfigSpec::new("ipc14-copy", "/src/prost", "master", "IPC2014");
        assert_eq!(a, b);
    }

    #[test]
    fn equality_considers_descriptor_and_build() {
        let base = ConfigSpec::new("a", "/src/prost", "master", "IPC2014");
        let other_desc = ConfigSpec::new("b", "/src/prost", "master", "IPC2011");
        let other_opts =
            ConfigSpec::new("c", "/src/prost", "master", "IPC2014").with_build_options(["debug"]);

        assert_ne!(base, other_desc);
        assert_ne!(base, other_opts);
    }

    #[test]
    fn deserializes_camel_case() {
        let json = r#"{
            "name": "ipc11",
            "repo": "/src/prost",
            "rev": "9758a9bb",
            "descriptor": "IPC2011",
            "buildOptions": ["-j6"]
        }"#;
        let cfg: ConfigSpec = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.build_options, vec!["-j6".to_string()]);
        assert_eq!(cfg.build_key().rev(), "9758a9bb");
    }
}
