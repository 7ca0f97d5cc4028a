use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};

const KB_PER_MB: u64 = 1024;
const KB_PER_GB: u64 = 1024 * 1024;

/// Memory budget parsed from `<integer>M` or `<integer>G`.
///
/// The suffix is mandatory and case-sensitive; anything else is rejected.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MemoryLimit {
    kb: u64,
}

impl MemoryLimit {
    pub const fn from_kb(kb: u64) -> Self {
        Self { kb }
    }

    pub const fn kb(&self) -> u64 {
        self.kb
    }

    pub const fn bytes(&self) -> u64 {
        self.kb.saturating_mul(1024)
    }
}

impl FromStr for MemoryLimit {
    type Err = ModelError;
    fn from_str(s: &str) -> ModelResult<Self> {
        let trimmed = s.trim();
        let invalid = || ModelError::InvalidMemoryLimit(s.to_string());

        let (number, factor) = if let Some(n) = trimmed.strip_suffix('M') {
            (n, KB_PER_MB)
        } else if let Some(n) = trimmed.strip_suffix('G') {
            (n, KB_PER_GB)
        } else {
            return Err(invalid());
        };

        let value: u64 = number.parse().map_err(|_| invalid())?;
        if value == 0 {
            return Err(invalid());
        }
        let kb = value.checked_mul(factor).ok_or_else(invalid)?;
        Ok(Self { kb })
    }
}

impl TryFrom<String> for MemoryLimit {
    type Error = ModelError;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<MemoryLimit> for String {
    fn from(m: MemoryLimit) -> Self {
        m.to_string()
    }
}

impl fmt::Display for MemoryLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.kb % KB_PER_GB == 0 {
            write!(f, "{}G", self.kb / KB_PER_GB)
        } else if self.kb % KB_PER_MB == 0 {
            write!(f, "{}M", self.kb / KB_PER_MB)
        } else {
            // Only reachable through `from_kb`; round up so the budget is never shrunk.
            write!(f, "{}M", self.kb.div_ceil(KB_PER_MB))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::MemoryLimit;

    #[test]
    fn megabytes_are_converted_to_kb() {
        let m: MemoryLimit = "3872M".parse().unwrap();
        assert_eq!(m.kb(), 3872 * 1024);
    }

    #[test]
    fn gigabytes_are_converted_to_kb() {
        let m: MemoryLimit = "4G".parse().unwrap();
        assert_eq!(m.kb(), 4 * 1024 * 1024);
        assert_eq!(m.bytes(), 4 * 1024 * 1024 * 1024);
    }

    #[test]
    fn rejects_unknown_or_missing_suffix() {
        for bad in ["4X", "4096", "4g", "M", "", "-1M", "1.5G", "0M"] {
            assert!(bad.parse::<MemoryLimit>().is_err(), "expected error for {bad:?}");
        }
    }

    #[test]
    fn rejects_overflow() {
        assert!("18446744073709551615G".parse::<MemoryLimit>().is_err());
    }

    #[test]
    fn display_prefers_largest_unit() {
        assert_eq!("4096M".parse::<MemoryLimit>().unwrap().to_string(), "4G");
        assert_eq!("3584M".parse::<MemoryLimit>().unwrap().to_string(), "3584M");
    }

    #[test]
    fn serde_uses_string_form() {
        let m: MemoryLimit = serde_json::from_str("\"6G\"").unwrap();
        assert_eq!(m.kb(), 6 * 1024 * 1024);
        assert_eq!(serde_json::to_string(&m).unwrap(), "\"6G\"");
        assert!(serde_json::from_str::<MemoryLimit>("\"6T\"").is_err());
    }
}
