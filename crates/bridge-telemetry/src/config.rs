//! Telemetry configuration from environment variables.

use std::env;

/// Default service name in log output.
pub const DEFAULT_SERVICE_NAME: &str = "desktop-bridge";

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryConfig {
    /// Service name attached to startup logs
    pub service_name: String,

    /// `EnvFilter` directive (e.g. `info`, `bridge_hub=debug,info`)
    pub log_level: String,

    /// Emit JSON lines instead of human-readable output
    pub json_logs: bool,

    /// Colourise human-readable output
    pub ansi: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: DEFAULT_SERVICE_NAME.to_string(),
            log_level: "info".to_string(),
            json_logs: false,
            ansi: true,
        }
    }
}

impl TelemetryConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `BRIDGE_SERVICE_NAME`: Service name (default: desktop-bridge)
    /// - `BRIDGE_LOG_LEVEL` or `RUST_LOG`: Filter directive (default: info)
    /// - `BRIDGE_JSON_LOGS`: JSON output (default: false)
    /// - `NO_COLOR`: Disable ANSI colours when set
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env), reading variables through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            service_name: lookup("BRIDGE_SERVICE_NAME")
                .unwrap_or_else(|| DEFAULT_SERVICE_NAME.to_string()),

            log_level: lookup("BRIDGE_LOG_LEVEL")
                .or_else(|| lookup("RUST_LOG"))
                .unwrap_or_else(|| "info".to_string()),

            json_logs: lookup("BRIDGE_JSON_LOGS")
                .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
                .unwrap_or(false),

            ansi: lookup("NO_COLOR").is_none(),
        }
    }

    /// Defaults with a different service name.
    pub fn for_service(service_name: &str) -> Self {
        Self {
            service_name: service_name.to_string(),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = TelemetryConfig::default();
        assert_eq!(config.service_name, "desktop-bridge");
        assert_eq!(config.log_level, "info");
        assert!(!config.json_logs);
    }

    #[test]
    fn test_bridge_variables_take_precedence() {
        let vars: HashMap<&str, &str> = [
            ("BRIDGE_LOG_LEVEL", "debug"),
            ("RUST_LOG", "warn"),
            ("BRIDGE_JSON_LOGS", "TRUE"),
            ("BRIDGE_SERVICE_NAME", "bridge-hub"),
        ]
        .into_iter()
        .collect();
        let config = TelemetryConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string()));

        assert_eq!(config.log_level, "debug");
        assert!(config.json_logs);
        assert_eq!(config.service_name, "bridge-hub");
        assert!(config.ansi);
    }

    #[test]
    fn test_rust_log_fallback() {
        let config = TelemetryConfig::from_lookup(|k| (k == "RUST_LOG").then(|| "trace".into()));
        assert_eq!(config.log_level, "trace");
    }
}
