//! Configuration for the porthole dashboard daemon.
//!
//! Loaded from `porthole.toml` or plain environment variables
//! (`PORT`, `HOST`, `BIND`, `WORKERS`, `DEADLINE_SECS`), with CLI
//! flags applied on top by main.

use serde::Deserialize;

/// Top-level server settings.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Port the dashboard itself listens on (default: 5001). Always
    /// excluded from discovery results.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Host name used in browser-side service links (default: the
    /// machine's own host name).
    #[serde(default)]
    pub host: Option<String>,

    /// Address the dashboard binds to (default: "127.0.0.1").
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Concurrent web probes per discovery pass (default: 12).
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Wall-clock budget for one `/api/services` pass, in seconds
    /// (default: 45).
    #[serde(default = "default_deadline")]
    pub deadline_secs: u64,
}

fn default_port() -> u16 {
    5001
}

fn default_bind() -> String {
    "127.0.0.1".to_string()
}

fn default_workers() -> usize {
    porthole_core::discover::DEFAULT_WORKERS
}

fn default_deadline() -> u64 {
    45
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: None,
            bind: default_bind(),
            workers: default_workers(),
            deadline_secs: default_deadline(),
        }
    }
}

impl Settings {
    /// Host name shown in service links: the configured one, else the
    /// machine's, else plain `localhost`.
    pub fn display_host(&self) -> String {
        self.host.clone().unwrap_or_else(|| {
            hostname::get()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|_| "localhost".to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.port, 5001);
        assert_eq!(settings.bind, "127.0.0.1");
        assert_eq!(settings.workers, 12);
        assert_eq!(settings.deadline_secs, 45);
        assert_eq!(settings.host, None);
    }

    #[test]
    fn test_partial_input_fills_missing_fields() {
        let settings: Settings = serde_json::from_str("{\"port\": 8088}").unwrap();
        assert_eq!(settings.port, 8088);
        assert_eq!(settings.bind, "127.0.0.1");
        assert_eq!(settings.workers, 12);
    }

    #[test]
    fn test_explicit_host_wins_over_machine_name() {
        let settings = Settings {
            host: Some("devbox.local".to_string()),
            ..Settings::default()
        };
        assert_eq!(settings.display_host(), "devbox.local");
    }

    #[test]
    fn test_display_host_never_empty() {
        let settings = Settings::default();
        assert!(!settings.display_host().is_empty());
    }
}
