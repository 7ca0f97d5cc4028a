use serde::{Deserialize, Serialize};

use crate::logger::object::{LoggerFormat, LoggerLevel, LoggerOutput, LoggerTimeZone};

/// Logger configuration, filled from `--log-*` flags or `GRIDLAB_LOG_*` variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LoggerConfig {
    pub format: LoggerFormat,
    /// Filter expression (e.g. `"info"`, `"gridlab_exec=debug,info"`).
    pub level: LoggerLevel,
    pub tz: LoggerTimeZone,
    /// Stream the text and json formats write to. Ignored by journald.
    pub output: LoggerOutput,
    pub with_targets: bool,
    pub use_color: bool,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            format: LoggerFormat::default(),
            level: LoggerLevel::default(),
            tz: LoggerTimeZone::default(),
            output: LoggerOutput::default(),
            with_targets: true,
            use_color: true,
        }
    }
}

impl LoggerConfig {
    /// Color is used only when enabled and the chosen output stream is a terminal.
    ///
    /// Inside a job array both streams are redirected to files, so this is false there.
    pub fn should_use_color(&self) -> bool {
        self.use_color && self.output.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_log_text_to_stderr() {
        let config = LoggerConfig::default();

        assert_eq!(config.format, LoggerFormat::Text);
        assert_eq!(config.tz, LoggerTimeZone::Utc);
        assert_eq!(config.output, LoggerOutput::Stderr);
        assert_eq!(config.level.as_str(), "info");
        assert!(config.with_targets);
        assert!(config.use_color);
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let config: LoggerConfig = serde_json::from_str("{}").unwrap();

        assert_eq!(config.level.as_str(), "info");
        assert_eq!(config.format, LoggerFormat::Text);
        assert_eq!(config.output, LoggerOutput::Stderr);
    }

    #[test]
    fn partial_config_uses_camel_case() {
        let json = r#"{"format": "json", "level": "gridlab_core=debug,info", "withTargets": false}"#;
        let config: LoggerConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config.format, LoggerFormat::Json);
        assert_eq!(config.level.as_str(), "gridlab_core=debug,info");
        assert!(!config.with_targets);
        assert!(config.use_color);
    }

    #[test]
    fn color_requires_opt_in() {
        let config = LoggerConfig {
            use_color: false,
            ..Default::default()
        };
        assert!(!config.should_use_color());
    }
}
