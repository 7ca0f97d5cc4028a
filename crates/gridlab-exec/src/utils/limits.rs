//! POSIX rlimits for planner processes.
//!
//! Limits are installed in a `pre_exec` hook, so the child never runs without them. The soft
//! limit is set to the requested value; the hard limit is kept when it is already higher.
//! On non-Unix targets the request is logged and ignored.

use gridlab_model::MemoryLimit;
use tokio::process::Command;
#[cfg(not(unix))]
use tracing::warn;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RlimitConfig {
    /// Virtual address space (`RLIMIT_AS`) in bytes.
    pub max_address_space_bytes: Option<u64>,
    /// Open file descriptors (`RLIMIT_NOFILE`).
    pub max_open_files: Option<u64>,
    /// `RLIMIT_CORE = 0`.
    pub disable_core_dumps: bool,
}

impl RlimitConfig {
    /// Address-space limit equal to the run's memory budget, no core dumps.
    pub fn for_memory(limit: MemoryLimit) -> Self {
        Self {
            max_address_space_bytes: Some(limit.bytes()),
            max_open_files: None,
            disable_core_dumps: true,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.max_address_space_bytes.is_none()
            && self.max_open_files.is_none()
            && !self.disable_core_dumps
    }
}

/// Attach the configured limits to `cmd`.
pub fn attach_rlimits(cmd: &mut Command, config: &RlimitConfig) {
    if config.is_empty() {
        return;
    }

    #[cfg(unix)]
    unix_impl::attach(cmd, *config);

    #[cfg(not(unix))]
    {
        let _ = cmd;
        warn!(?config, "rlimits are not supported on this platform; ignoring");
    }
}

#[cfg(unix)]
mod unix_impl {
    use std::io;

    use tokio::process::Command;

    use super::RlimitConfig;
    use crate::utils::log::pre_exec_report;

    #[cfg(any(target_os = "linux", target_os = "android"))]
    type Resource = libc::__rlimit_resource_t;
    #[cfg(not(any(target_os = "linux", target_os = "android")))]
    type Resource = libc::c_int;

    struct Limit {
        resource: Resource,
        value: u64,
        label: &'static [u8],
    }

    fn planned(config: RlimitConfig) -> Vec<Limit> {
        let mut out = Vec::with_capacity(3);
        if let Some(v) = config.max_address_space_bytes {
            out.push(Limit {
                resource: libc::RLIMIT_AS as Resource,
                value: v,
                label: b"failed to set RLIMIT_AS",
            });
        }
        if let Some(v) = config.max_open_files {
            out.push(Limit {
                resource: libc::RLIMIT_NOFILE as Resource,
                value: v,
                label: b"failed to set RLIMIT_NOFILE",
            });
        }
        if config.disable_core_dumps {
            out.push(Limit {
                resource: libc::RLIMIT_CORE as Resource,
                value: 0,
                label: b"failed to set RLIMIT_CORE",
            });
        }
        out
    }

    pub(super) fn attach(cmd: &mut Command, config: RlimitConfig) {
        // Built before fork: the hook itself must not allocate.
        let limits = planned(config);
        unsafe {
            cmd.pre_exec(move || {
                for limit in &limits {
                    if let Err(e) = apply(limit.resource, limit.value) {
                        pre_exec_report(limit.label, e.raw_os_error());
                        return Err(e);
                    }
                }
                Ok(())
            });
        }
    }

    fn apply(resource: Resource, value: u64) -> io::Result<()> {
        let soft = libc::rlim_t::try_from(value).map_err(|_| {
            io::Error::new(io::ErrorKind::InvalidInput, "rlimit exceeds platform maximum")
        })?;

        let mut current = libc::rlimit {
            rlim_cur: 0,
            rlim_max: 0,
        };
        if unsafe { libc::getrlimit(resource, &mut current) } != 0 {
            return Err(io::Error::last_os_error());
        }

        let hard = if current.rlim_max == libc::RLIM_INFINITY || current.rlim_max > soft {
            current.rlim_max
        } else {
            soft
        };
        let next = libc::rlimit {
            rlim_cur: soft,
            rlim_max: hard,
        };
        if unsafe { libc::setrlimit(resource, &next) } != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_budget_becomes_address_space_limit() {
        let cfg = RlimitConfig::for_memory("2G".parse().unwrap());
        assert_eq!(cfg.max_address_space_bytes, Some(2 * 1024 * 1024 * 1024));
        assert!(cfg.disable_core_dumps);
        assert!(!cfg.is_empty());
        assert!(RlimitConfig::default().is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn child_sees_the_limits() {
        let cfg = RlimitConfig {
            max_address_space_bytes: Some(4 * 1024 * 1024 * 1024),
            max_open_files: Some(256),
            disable_core_dumps: true,
        };
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg("test \"$(ulimit -n)\" = 256 && test \"$(ulimit -c)\" = 0");
        attach_rlimits(&mut cmd, &cfg);

        let status = cmd.status().await.unwrap();
        assert!(status.success());
    }
}
