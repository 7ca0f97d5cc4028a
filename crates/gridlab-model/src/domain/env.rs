use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Environment variables exported before a run's command is executed.
///
/// Used in two places: job scripts emit them as `export` lines in the setup block,
/// and the run launcher passes them to the server and planner processes.
/// Values are kept verbatim, so `$VAR` references are expanded by the shell
/// that evaluates the job script.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Env(BTreeMap<String, String>);

impl Env {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Set a variable, replacing any previous value.
    pub fn insert<K, V>(&mut self, key: K, value: V) -> &mut Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Iterate in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Combine two environments; entries from `other` win.
    pub fn merged(&self, other: &Env) -> Env {
        let mut out = self.0.clone();
        out.extend(other.0.iter().map(|(k, v)| (k.clone(), v.clone())));
        Env(out)
    }

    /// Render as `export KEY="VALUE"` lines for a POSIX shell.
    ///
    /// Double quotes keep `$VAR` expansion working while protecting spaces.
    pub fn export_lines(&self) -> Vec<String> {
        self.iter()
            .map(|(k, v)| format!("export {k}=\"{}\"", v.replace('"', "\\\"")))
            .collect()
    }
}

impl<K, V> FromIterator<(K, V)> for Env
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}
