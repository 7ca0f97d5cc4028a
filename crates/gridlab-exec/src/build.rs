//! Git checkout and compilation of planner revisions.
use std::{
    fs, io,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use flate2::{Compression, write::GzEncoder};
use gridlab_core::{BuildBackend, BuildError, BuildInfo};
use gridlab_model::{BuildKey, Env};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::{
    ExecError,
    subprocess::{LogConfig, StepCommand},
};

/// How a checked-out revision is compiled and slimmed down.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BuildRecipe {
    /// Entrypoint, relative to the checkout.
    pub program: String,
    /// Passed before the build key's options.
    pub args: Vec<String>,
    pub env: Env,
    /// Binary names to strip, searched below `strip_dir`.
    pub strip: Vec<String>,
    pub strip_dir: PathBuf,
    pub strip_program: String,
    /// Directories archived to `<dir>.tar.gz` and removed after the build.
    pub compress: Vec<PathBuf>,
}

impl Default for BuildRecipe {
    fn default() -> Self {
        Self {
            program: "./build.py".to_string(),
            args: Vec::new(),
            env: Env::new(),
            strip: vec!["rddl-parser".to_string(), "search".to_string()],
            strip_dir: PathBuf::from("builds"),
            strip_program: "strip".to_string(),
            compress: vec![PathBuf::from("src")],
        }
    }
}

pub struct GitBuildBackend {
    git: String,
    recipe: BuildRecipe,
    log: LogConfig,
}

impl GitBuildBackend {
    pub fn new(recipe: BuildRecipe) -> Self {
        Self {
            git: "git".to_string(),
            recipe,
            log: LogConfig::default(),
        }
    }

    pub fn with_git(mut self, git: impl Into<String>) -> Self {
        self.git = git.into();
        self
    }

    pub fn with_log(mut self, log: LogConfig) -> Self {
        self.log = log;
        self
    }

    fn git(&self, label: &str, key: &BuildKey) -> StepCommand {
        StepCommand::new(label, &self.git)
            .arg("-C")
            .arg(key.repo().to_string_lossy())
    }

    async fn rev_parse(&self, key: &BuildKey) -> Result<String, BuildError> {
        let out = self
            .git("rev-parse", key)
            .args(["rev-parse", "--verify"])
            .arg(format!("{}^{{commit}}", key.rev().trim()))
            .capture()
            .await
            .map_err(|e| step_error(key, "rev-parse", e))?;
        let rev = String::from_utf8_lossy(&out).trim().to_string();
        if rev.is_empty() {
            return Err(BuildError::StepFailed {
                key: key.to_string(),
                step: "rev-parse".into(),
                reason: "empty revision".into(),
            });
        }
        Ok(rev)
    }

    async fn export(&self, key: &BuildKey, rev: &str, staging: &Path) -> Result<(), BuildError> {
        let archive = self
            .git("archive", key)
            .args(["archive", "--format=tar", rev])
            .capture()
            .await
            .map_err(|e| step_error(key, "archive", e))?;
        debug!(%key, bytes = archive.len(), "unpacking revision");

        let target = staging.to_path_buf();
        blocking(key, "unpack", move || {
            tar::Archive::new(io::Cursor::new(archive)).unpack(&target)
        })
        .await
    }

    async fn compile(&self, key: &BuildKey, staging: &Path) -> Result<(), BuildError> {
        StepCommand::new("build", &self.recipe.program)
            .args(self.recipe.args.iter().cloned())
            .args(key.options().iter().cloned())
            .env(self.recipe.env.clone())
            .cwd(staging)
            .run(self.log)
            .await
            .map_err(|e| step_error(key, "build", e))
    }

    /// Strip failures only cost disk space; they are logged and ignored.
    async fn strip(&self, key: &BuildKey, staging: &Path) {
        let root = staging.join(&self.recipe.strip_dir);
        let binaries = find_named(&root, &self.recipe.strip);
        if binaries.is_empty() {
            debug!(%key, dir = %root.display(), "no binaries to strip");
            return;
        }
        let step = StepCommand::new("strip", &self.recipe.strip_program)
            .args(binaries.iter().map(|p| p.to_string_lossy().into_owned()));
        if let Err(e) = step.run(self.log).await {
            warn!(%key, error = %e, "strip failed; keeping unstripped binaries");
        }
    }

    async fn compress(&self, key: &BuildKey, staging: &Path) -> Result<(), BuildError> {
        for rel in &self.recipe.compress {
            let dir = staging.join(rel);
            if !dir.is_dir() {
                continue;
            }
            let rel = rel.clone();
            let staging = staging.to_path_buf();
            blocking(key, "compress", move || compress_dir(&staging, &rel)).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl BuildBackend for GitBuildBackend {
    fn name(&self) -> &'static str {
        "git"
    }

    async fn resolve_rev(&self, key: &BuildKey) -> Result<Option<String>, BuildError> {
        self.rev_parse(key).await.map(Some)
    }

    async fn materialize(&self, key: &BuildKey, staging: &Path) -> Result<BuildInfo, BuildError> {
        let rev = self.rev_parse(key).await?;
        info!(%key, global_rev = %rev, "checking out revision");
        self.export(key, &rev, staging).await?;
        self.compile(key, staging).await?;
        self.strip(key, staging).await;
        self.compress(key, staging).await?;
        Ok(BuildInfo::new(key.clone()).with_global_rev(rev))
    }
}

fn step_error(key: &BuildKey, step: &str, e: ExecError) -> BuildError {
    match e {
        ExecError::NonZeroExit { code, .. } => BuildError::NonZeroExit {
            key: key.to_string(),
            step: step.to_string(),
            code,
        },
        other => BuildError::StepFailed {
            key: key.to_string(),
            step: step.to_string(),
            reason: other.to_string(),
        },
    }
}

async fn blocking<F>(key: &BuildKey, step: &str, f: F) -> Result<(), BuildError>
where
    F: FnOnce() -> io::Result<()> + Send + 'static,
{
    let fail = |reason: String| BuildError::StepFailed {
        key: key.to_string(),
        step: step.to_string(),
        reason,
    };
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| fail(e.to_string()))?
        .map_err(|e| fail(e.to_string()))
}

/// Files below `root` whose name is in `names`, sorted.
fn find_named(root: &Path, names: &[String]) -> Vec<PathBuf> {
    if names.is_empty() || !root.is_dir() {
        return Vec::new();
    }
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .filter(|e| names.iter().any(|n| e.file_name() == n.as_str()))
        .map(|e| e.into_path())
        .collect()
}

/// Replace `<base>/<rel>` with `<base>/<rel>.tar.gz`.
fn compress_dir(base: &Path, rel: &Path) -> io::Result<()> {
    let dir = base.join(rel);
    let mut archive_name = rel.as_os_str().to_os_string();
    archive_name.push(".tar.gz");
    let file = fs::File::create(base.join(archive_name))?;

    let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));
    builder.append_dir_all(rel, &dir)?;
    builder.into_inner()?.finish()?;
    fs::remove_dir_all(&dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compress_replaces_directory_with_archive() {
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path().join("src");
        fs::create_dir_all(src.join("search")).unwrap();
        fs::write(src.join("search/main.cc"), b"int main() {}\n").unwrap();

        compress_dir(tmp.path(), Path::new("src")).unwrap();
        assert!(!src.exists());

        let gz = fs::File::open(tmp.path().join("src.tar.gz")).unwrap();
        let mut archive = tar::Archive::new(flate2::read::GzDecoder::new(gz));
        let names: Vec<PathBuf> = archive
            .entries()
            .unwrap()
            .map(|e| e.unwrap().path().unwrap().into_owned())
            .collect();
        assert!(names.contains(&PathBuf::from("src/search/main.cc")));
    }

    #[test]
    fn finds_binaries_by_name() {
        let tmp = tempfile::tempdir().unwrap();
        for p in ["release/search", "release/rddl-parser", "release/other", "debug/search"] {
            let path = tmp.path().join(p);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, b"").unwrap();
        }
        let found = find_named(tmp.path(), &["search".into(), "rddl-parser".into()]);
        assert_eq!(found.len(), 3);
        assert!(found.iter().all(|p| !p.ends_with("other")));
    }

    #[test]
    fn exit_codes_map_to_build_errors() {
        let key = BuildKey::new("/src/prost", "master", Vec::<String>::new());
        let e = step_error(
            &key,
            "build",
            ExecError::NonZeroExit {
                program: "./build.py".into(),
                code: Some(1),
            },
        );
        assert!(matches!(e, BuildError::NonZeroExit { code: Some(1), ref step, .. } if step == "build"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn builds_a_git_revision() {
        use std::process::Command;

        if !Command::new("git").arg("--version").status().is_ok_and(|s| s.success()) {
            return;
        }
        let tmp = tempfile::tempdir().unwrap();
        let repo = tmp.path().join("prost");
        fs::create_dir_all(repo.join("src")).unwrap();
        fs::write(repo.join("src/main.cc"), b"int main() {}\n").unwrap();
        fs::write(
            repo.join("build.py"),
            b"#!/bin/sh\nmkdir -p builds/release && echo \"$@\" > builds/release/options\n",
        )
        .unwrap();
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(repo.join("build.py"), fs::Permissions::from_mode(0o755)).unwrap();
        }
        let git = |args: &[&str]| {
            let ok = Command::new("git")
                .arg("-C")
                .arg(&repo)
                .args(["-c", "user.name=t", "-c", "user.email=t@example.org"])
                .args(args)
                .status()
                .map(|s| s.success())
                .unwrap_or(false);
            assert!(ok, "git {args:?} failed");
        };
        git(&["init", "-q"]);
        git(&["add", "."]);
        git(&["commit", "-q", "-m", "init"]);

        let staging = tmp.path().join("staging");
        fs::create_dir_all(&staging).unwrap();
        let key = BuildKey::new(&repo, "HEAD", ["-j2"]);
        let info = GitBuildBackend::new(BuildRecipe::default())
            .materialize(&key, &staging)
            .await
            .unwrap();

        assert_eq!(info.global_rev.as_deref().map(str::len), Some(40));
        assert_eq!(
            fs::read_to_string(staging.join("builds/release/options")).unwrap(),
            "-j2\n"
        );
        assert!(staging.join("src.tar.gz").is_file());
        assert!(!staging.join("src").exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn new_commit_on_branch_gets_a_new_cache_entry() {
        use gridlab_core::RevisionCache;
        use std::{process::Command, sync::Arc};

        if !Command::new("git").arg("--version").status().is_ok_and(|s| s.success()) {
            return;
        }
        let tmp = tempfile::tempdir().unwrap();
        let repo = tmp.path().join("prost");
        fs::create_dir_all(&repo).unwrap();
        fs::write(
            repo.join("build.py"),
            b"#!/bin/sh\nmkdir -p builds && cp VERSION builds/VERSION\n",
        )
        .unwrap();
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(repo.join("build.py"), fs::Permissions::from_mode(0o755)).unwrap();
        }
        let git = |args: &[&str]| {
            let ok = Command::new("git")
                .arg("-C")
                .arg(&repo)
                .args(["-c", "user.name=t", "-c", "user.email=t@example.org"])
                .args(args)
                .status()
                .map(|s| s.success())
                .unwrap_or(false);
            assert!(ok, "git {args:?} failed");
        };
        let commit = |version: &str| {
            fs::write(repo.join("VERSION"), version).unwrap();
            git(&["add", "."]);
            git(&["commit", "-q", "-m", version]);
        };
        git(&["init", "-q"]);
        commit("v1");

        let key = BuildKey::new(&repo, "HEAD", Vec::<String>::new());
        let cache_root = tmp.path().join("revision-cache");
        async fn resolve(root: &Path, key: &BuildKey) -> gridlab_core::CachedBuild {
            let backend = Arc::new(GitBuildBackend::new(BuildRecipe::default()));
            RevisionCache::new(root, backend).resolve(key).await.unwrap()
        }

        let old = resolve(&cache_root, &key).await;
        commit("v2");
        let new = resolve(&cache_root, &key).await;

        assert_ne!(new.path(), old.path());
        assert_ne!(new.global_rev(), old.global_rev());
        assert_eq!(fs::read_to_string(new.path().join("builds/VERSION")).unwrap(), "v2");
        assert_eq!(fs::read_to_string(old.path().join("builds/VERSION")).unwrap(), "v1");
    }

    #[tokio::test]
    async fn unknown_revision_is_a_build_error() {
        let tmp = tempfile::tempdir().unwrap();
        let key = BuildKey::new(tmp.path().join("missing"), "master", Vec::<String>::new());
        let err = GitBuildBackend::new(BuildRecipe::default())
            .materialize(&key, tmp.path())
            .await
            .unwrap_err();
        assert!(matches!(err, BuildError::NonZeroExit { .. } | BuildError::StepFailed { .. }));
    }
}
