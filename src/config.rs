use std::{env, fs, path::Path, time::Duration};

use anyhow::{Context, Result};
use serde::Deserialize;
use url::Url;

/// Engine configuration. The defaults carry the reference constants used by
/// the dashboard: a fixed 3 s reconnect delay, a 300 ms debounce quiet
/// period, a 1000-event message buffer and a 500-entry dedup window.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    pub api_base_url: String,
    /// Explicit stream endpoint. When absent it is derived from
    /// `api_base_url` by swapping the scheme and appending `/ws`.
    #[serde(default)]
    pub ws_url: Option<String>,
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    #[serde(default = "default_message_buffer_cap")]
    pub message_buffer_cap: usize,
    #[serde(default = "default_dedup_cap")]
    pub dedup_cap: usize,
}

fn default_reconnect_delay_ms() -> u64 {
    3000
}

fn default_debounce_ms() -> u64 {
    300
}

fn default_message_buffer_cap() -> usize {
    1000
}

fn default_dedup_cap() -> usize {
    500
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8000".to_string(),
            ws_url: None,
            reconnect_delay_ms: default_reconnect_delay_ms(),
            debounce_ms: default_debounce_ms(),
            message_buffer_cap: default_message_buffer_cap(),
            dedup_cap: default_dedup_cap(),
        }
    }
}

impl EngineConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let data =
            fs::read_to_string(path.as_ref()).with_context(|| "Failed to read config file")?;
        Self::parse(&data)
    }

    pub(crate) fn parse(data: &str) -> Result<Self> {
        let mut raw: toml::Value =
            toml::from_str(data).with_context(|| "Failed to parse TOML config")?;
        // Support a nested [desk_sync] table or top-level entries.
        let table = if let Some(table) = raw
            .get_mut("desk_sync")
            .and_then(|v| v.as_table_mut())
            .cloned()
        {
            table
        } else {
            raw.try_into()
                .map_err(|_| anyhow::anyhow!("Invalid desk_sync config structure"))?
        };
        let mut cfg: EngineConfig = toml::from_str(&toml::to_string(&table)?)?;
        cfg.apply_env_overrides();
        cfg.validate()?;
        Ok(cfg)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(value) = env::var("DESK_API_BASE_URL") {
            self.api_base_url = value;
        }
        if let Ok(value) = env::var("DESK_WS_URL") {
            self.ws_url = Some(value);
        }
        override_u64("DESK_RECONNECT_DELAY_MS", &mut self.reconnect_delay_ms);
        override_u64("DESK_DEBOUNCE_MS", &mut self.debounce_ms);
        override_usize("DESK_MESSAGE_BUFFER_CAP", &mut self.message_buffer_cap);
        override_usize("DESK_DEDUP_CAP", &mut self.dedup_cap);
    }

    pub(crate) fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            !self.api_base_url.is_empty(),
            "api_base_url must not be empty"
        );
        anyhow::ensure!(
            self.reconnect_delay_ms > 0,
            "reconnect_delay_ms must be greater than zero"
        );
        anyhow::ensure!(
            self.debounce_ms > 0,
            "debounce_ms must be greater than zero"
        );
        anyhow::ensure!(
            self.message_buffer_cap > 0,
            "message_buffer_cap must be greater than zero"
        );
        anyhow::ensure!(self.dedup_cap > 1, "dedup_cap must be greater than one");
        Ok(())
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// The stream endpoint, derived from the REST base when not set
    /// explicitly.
    pub fn stream_url(&self) -> Result<Url, url::ParseError> {
        if let Some(explicit) = &self.ws_url {
            return Url::parse(explicit);
        }

        let mut candidate = self.api_base_url.clone();
        if candidate.starts_with("https://") {
            candidate = candidate.replacen("https://", "wss://", 1);
        } else if candidate.starts_with("http://") {
            candidate = candidate.replacen("http://", "ws://", 1);
        } else if !candidate.starts_with("ws://") && !candidate.starts_with("wss://") {
            candidate = format!("wss://{candidate}");
        }

        let mut url = Url::parse(&candidate)?;
        // Append to the base path; a proxied base like /gw keeps its prefix.
        let path = format!("{}/ws", url.path().trim_end_matches('/'));
        url.set_path(&path);
        Ok(url)
    }
}

fn override_u64(key: &str, field: &mut u64) {
    if let Ok(value) = env::var(key) {
        if let Ok(parsed) = value.parse::<u64>() {
            *field = parsed;
        }
    }
}

fn override_usize(key: &str, field: &mut usize) {
    if let Ok(value) = env::var(key) {
        if let Ok(parsed) = value.parse::<usize>() {
            *field = parsed;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_constants() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.reconnect_delay(), Duration::from_secs(3));
        assert_eq!(cfg.debounce(), Duration::from_millis(300));
        assert_eq!(cfg.message_buffer_cap, 1000);
        assert_eq!(cfg.dedup_cap, 500);
    }

    #[test]
    fn parses_top_level_entries() {
        let cfg = EngineConfig::parse(
            r#"
            api_base_url = "https://desk.example.com"
            debounce_ms = 150
            "#,
        )
        .unwrap();
        assert_eq!(cfg.api_base_url, "https://desk.example.com");
        assert_eq!(cfg.debounce_ms, 150);
        assert_eq!(cfg.reconnect_delay_ms, 3000);
    }

    #[test]
    fn parses_nested_table() {
        let cfg = EngineConfig::parse(
            r#"
            [desk_sync]
            api_base_url = "http://localhost:9000"
            dedup_cap = 64
            "#,
        )
        .unwrap();
        assert_eq!(cfg.dedup_cap, 64);
    }

    #[test]
    fn rejects_zero_debounce() {
        let result = EngineConfig::parse(
            r#"
            api_base_url = "http://localhost:8000"
            debounce_ms = 0
            "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn stream_url_is_derived_from_http_base() {
        let cfg = EngineConfig {
            api_base_url: "http://localhost:8000".to_string(),
            ..EngineConfig::default()
        };
        assert_eq!(cfg.stream_url().unwrap().as_str(), "ws://localhost:8000/ws");
    }

    #[test]
    fn stream_url_prefers_explicit_endpoint() {
        let cfg = EngineConfig {
            api_base_url: "https://desk.example.com".to_string(),
            ws_url: Some("wss://stream.example.com/feed".to_string()),
            ..EngineConfig::default()
        };
        assert_eq!(
            cfg.stream_url().unwrap().as_str(),
            "wss://stream.example.com/feed"
        );
    }

    #[test]
    fn stream_url_keeps_base_path_prefix() {
        let cfg = EngineConfig {
            api_base_url: "https://desk.example.com/gw".to_string(),
            ..EngineConfig::default()
        };
        assert_eq!(
            cfg.stream_url().unwrap().as_str(),
            "wss://desk.example.com/gw/ws"
        );

        // A trailing slash on the base does not double up.
        let cfg = EngineConfig {
            api_base_url: "https://desk.example.com/gw/".to_string(),
            ..EngineConfig::default()
        };
        assert_eq!(
            cfg.stream_url().unwrap().as_str(),
            "wss://desk.example.com/gw/ws"
        );
    }

    #[test]
    fn https_base_becomes_wss() {
        let cfg = EngineConfig {
            api_base_url: "https://desk.example.com".to_string(),
            ..EngineConfig::default()
        };
        assert_eq!(
            cfg.stream_url().unwrap().as_str(),
            "wss://desk.example.com/ws"
        );
    }
}
