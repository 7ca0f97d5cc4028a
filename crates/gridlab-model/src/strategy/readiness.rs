use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

#[cfg(feature = "schema")]
use schemars::JsonSchema;

use crate::{
    BackoffStrategy,
    error::{ModelError, ModelResult},
};

/// How the launcher decides that the background server accepts connections.
///
/// The planner client must not connect before the server listens on its port.
/// - `Probe`: poll for a listening socket on the port with backoff until one appears or the
///   deadline passes. On Linux the kernel socket table is read; elsewhere a TCP connect is tried.
/// - `FixedDelay`: sleep for a fixed time and assume the server is up.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(JsonSchema))]
#[serde(rename_all = "camelCase", rename_all_fields = "camelCase", tag = "kind")]
pub enum ReadinessStrategy {
    Probe {
        #[serde(default)]
        backoff: BackoffStrategy,
        deadline_ms: u64,
    },
    FixedDelay { delay_ms: u64 },
}

/// Default probe deadline; generous because the server is a JVM that loads all benchmark files.
const DEFAULT_DEADLINE_MS: u64 = 300_000;

impl Default for ReadinessStrategy {
    fn default() -> Self {
        ReadinessStrategy::Probe {
            backoff: BackoffStrategy::default(),
            deadline_ms: DEFAULT_DEADLINE_MS,
        }
    }
}

impl FromStr for ReadinessStrategy {
    type Err = ModelError;

    /// Accepts `probe`, `probe:<deadline_ms>` and `delay:<ms>` (alias `sleep:<ms>`).
    fn from_str(s: &str) -> ModelResult<Self> {
        let norm = s.trim().to_ascii_lowercase();
        let (kind, arg) = match norm.split_once(':') {
            Some((k, a)) => (k, Some(a)),
            None => (norm.as_str(), None),
        };
        let parse_ms = |a: &str| {
            a.trim()
                .parse::<u64>()
                .map_err(|_| ModelError::UnknownReadiness(s.to_string()))
        };

        match (kind, arg) {
            ("probe", None) => Ok(ReadinessStrategy::default()),
            ("probe", Some(a)) => Ok(ReadinessStrategy::Probe {
                backoff: BackoffStrategy::default(),
                deadline_ms: parse_ms(a)?,
            }),
            ("delay" | "sleep", Some(a)) => Ok(ReadinessStrategy::FixedDelay { delay_ms: parse_ms(a)? }),
            _ => Err(ModelError::UnknownReadiness(s.to_string())),
        }
    }
}

/// The command-line form accepted by `FromStr`; a custom probe backoff is not representable.
impl fmt::Display for ReadinessStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadinessStrategy::Probe { deadline_ms, .. } => write!(f, "probe:{deadline_ms}"),
            ReadinessStrategy::FixedDelay { delay_ms } => write!(f, "delay:{delay_ms}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_probe() {
        assert!(matches!(
            ReadinessStrategy::default(),
            ReadinessStrategy::Probe { deadline_ms: DEFAULT_DEADLINE_MS, .. }
        ));
    }

    #[test]
    fn parses_cli_forms() {
        assert_eq!(
            "delay:45000".parse::<ReadinessStrategy>().unwrap(),
            ReadinessStrategy::FixedDelay { delay_ms: 45_000 }
        );
        assert!(matches!(
            "PROBE:1000".parse::<ReadinessStrategy>().unwrap(),
            ReadinessStrategy::Probe { deadline_ms: 1_000, .. }
        ));
        assert!("delay".parse::<ReadinessStrategy>().is_err());
        assert!("wait:10".parse::<ReadinessStrategy>().is_err());
    }

    #[test]
    fn display_parses_back() {
        for s in ["probe:1500", "delay:45000"] {
            let r: ReadinessStrategy = s.parse().unwrap();
            assert_eq!(r.to_string(), s);
        }
    }

    #[test]
    fn serde_is_tagged() {
        let json = r#"{"kind":"fixedDelay","delayMs":300}"#;
        let r: ReadinessStrategy = serde_json::from_str(json).unwrap();
        assert_eq!(r, ReadinessStrategy::FixedDelay { delay_ms: 300 });
    }
}
