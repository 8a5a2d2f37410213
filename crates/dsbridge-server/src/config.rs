use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};

/// Values shipped in sample env files. Refuse to start with any of them.
const PLACEHOLDER_SECRETS: &[&str] = &["", "change-me", "changeme", "secret", "your-secret-key"];

#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub discord_token: String,
    pub secret: String,
    pub namespace: String,
    pub host_url: String,
    pub db_path: PathBuf,
    pub banned_words_file: Option<PathBuf>,
    pub allowed_email_domain: Option<String>,
    pub reconnect_interval: Duration,
}

impl BridgeConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let discord_token = get("DISCORD_TOKEN").context("DISCORD_TOKEN is not set")?;

        let secret = get("APP_SECRET_KEY").unwrap_or_default();
        if PLACEHOLDER_SECRETS.contains(&secret.as_str()) {
            bail!("APP_SECRET_KEY is unset or still a placeholder; it must match the backend's secret");
        }

        let host_url = get("HOST_URL").context("HOST_URL is not set")?;

        let reconnect_interval = match get("RECONNECT_INTERVAL_SECS") {
            Some(raw) => Duration::from_secs(
                raw.parse()
                    .with_context(|| format!("RECONNECT_INTERVAL_SECS={:?} is not a number", raw))?,
            ),
            None => Duration::from_secs(5),
        };

        Ok(Self {
            discord_token,
            secret,
            namespace: get("SERVER_NAMESPACE").unwrap_or_else(|| "/bridge".into()),
            host_url,
            db_path: get("DSBRIDGE_DB_PATH")
                .unwrap_or_else(|| "dsbridge.db".into())
                .into(),
            banned_words_file: get("BANNED_WORDS_FILE").map(PathBuf::from),
            allowed_email_domain: get("ALLOWED_EMAIL_DOMAIN"),
            reconnect_interval,
        })
    }

    /// WebSocket URL of the backend. A bare host gets `wss://`; `http(s)://`
    /// is mapped to the matching WebSocket scheme.
    pub fn backend_url(&self) -> String {
        let url = self.host_url.trim_end_matches('/');
        if url.starts_with("ws://") || url.starts_with("wss://") {
            url.to_string()
        } else if let Some(rest) = url.strip_prefix("https://") {
            format!("wss://{}", rest)
        } else if let Some(rest) = url.strip_prefix("http://") {
            format!("ws://{}", rest)
        } else {
            format!("wss://{}", url)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> Result<BridgeConfig> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        BridgeConfig::from_lookup(|key| vars.get(key).cloned())
    }

    const REQUIRED: [(&str, &str); 3] = [
        ("DISCORD_TOKEN", "token"),
        ("APP_SECRET_KEY", "a-real-secret"),
        ("HOST_URL", "chat.example.org"),
    ];

    #[test]
    fn defaults_apply() {
        let cfg = config(&REQUIRED).unwrap();
        assert_eq!(cfg.namespace, "/bridge");
        assert_eq!(cfg.db_path, PathBuf::from("dsbridge.db"));
        assert_eq!(cfg.reconnect_interval, Duration::from_secs(5));
        assert!(cfg.banned_words_file.is_none());
        assert!(cfg.allowed_email_domain.is_none());
        assert_eq!(cfg.backend_url(), "wss://chat.example.org");
    }

    #[test]
    fn placeholder_secret_is_rejected() {
        let err = config(&[
            ("DISCORD_TOKEN", "token"),
            ("APP_SECRET_KEY", "change-me"),
            ("HOST_URL", "chat.example.org"),
        ])
        .unwrap_err();
        assert!(err.to_string().contains("APP_SECRET_KEY"));
    }

    #[test]
    fn missing_token_is_an_error() {
        assert!(config(&REQUIRED[1..]).is_err());
    }

    #[test]
    fn overrides_and_url_schemes() {
        let mut pairs = REQUIRED.to_vec();
        pairs.extend([
            ("SERVER_NAMESPACE", "/chat"),
            ("RECONNECT_INTERVAL_SECS", "2"),
            ("ALLOWED_EMAIL_DOMAIN", "example.org"),
            ("HOST_URL", "http://localhost:8080/socket/"),
        ]);
        let cfg = config(&pairs).unwrap();
        assert_eq!(cfg.namespace, "/chat");
        assert_eq!(cfg.reconnect_interval, Duration::from_secs(2));
        assert_eq!(cfg.allowed_email_domain.as_deref(), Some("example.org"));
        assert_eq!(cfg.backend_url(), "ws://localhost:8080/socket");
    }

    #[test]
    fn bad_interval_is_an_error() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("RECONNECT_INTERVAL_SECS", "soon"));
        assert!(config(&pairs).is_err());
    }
}
