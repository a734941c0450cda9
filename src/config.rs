use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context as _;

use crate::params::DEFAULT_PAGE_SIZE;

pub const DEFAULT_API_URL: &str = "https://index.tsyuri.com";
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Runtime settings, read from `NOVELSEARCH_*` variables and overridable
/// from the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub api_url: String,
    pub timeout: Duration,
    pub page_size: u32,
    pub prefs_path: PathBuf,
    /// Agent string used to pick the default display mode.
    pub user_agent: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_owned(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            page_size: DEFAULT_PAGE_SIZE,
            prefs_path: default_prefs_path(std::env::var_os("HOME").map(PathBuf::from)),
            user_agent: default_user_agent(),
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let var = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_owned())
                .filter(|v| !v.is_empty())
        };

        let mut config = Self {
            prefs_path: default_prefs_path(var("HOME").map(PathBuf::from)),
            ..Self::default()
        };

        if let Some(url) = var("NOVELSEARCH_API_URL") {
            config.api_url = url.trim_end_matches('/').to_owned();
        }
        if let Some(raw) = var("NOVELSEARCH_TIMEOUT_SECS") {
            config.timeout = Duration::from_secs(parse_timeout_secs(&raw).with_context(|| {
                format!("invalid NOVELSEARCH_TIMEOUT_SECS={raw:?}")
            })?);
        }
        if let Some(raw) = var("NOVELSEARCH_PAGE_SIZE") {
            config.page_size = parse_page_size(&raw)
                .with_context(|| format!("invalid NOVELSEARCH_PAGE_SIZE={raw:?}"))?;
        }
        if let Some(path) = var("NOVELSEARCH_PREFS") {
            config.prefs_path = PathBuf::from(path);
        }
        if let Some(agent) = var("NOVELSEARCH_USER_AGENT") {
            config.user_agent = agent;
        }

        Ok(config)
    }
}

pub fn parse_timeout_secs(raw: &str) -> anyhow::Result<u64> {
    let secs: u64 = raw.trim().parse().context("expected whole seconds")?;
    if !(1..=300).contains(&secs) {
        anyhow::bail!("timeout must be between 1 and 300 seconds, got {secs}");
    }
    Ok(secs)
}

pub fn parse_page_size(raw: &str) -> anyhow::Result<u32> {
    let size: u32 = raw.trim().parse().context("expected a positive integer")?;
    if !(1..=100).contains(&size) {
        anyhow::bail!("page size must be between 1 and 100, got {size}");
    }
    Ok(size)
}

fn default_prefs_path(home: Option<PathBuf>) -> PathBuf {
    match home {
        Some(home) => home.join(".novelsearch").join("prefs.json"),
        None => PathBuf::from(".novelsearch-prefs.json"),
    }
}

fn default_user_agent() -> String {
    concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")).to_owned()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let config = Config::from_lookup(lookup(&[("HOME", "/home/reader")])).unwrap();
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.timeout, Duration::from_secs(10));
        assert_eq!(config.page_size, 20);
        assert_eq!(
            config.prefs_path,
            PathBuf::from("/home/reader/.novelsearch/prefs.json")
        );
    }

    #[test]
    fn env_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("NOVELSEARCH_API_URL", "http://127.0.0.1:9000/api/"),
            ("NOVELSEARCH_TIMEOUT_SECS", " 3 "),
            ("NOVELSEARCH_PAGE_SIZE", "50"),
            ("NOVELSEARCH_PREFS", "/tmp/p.json"),
            ("NOVELSEARCH_USER_AGENT", "iPhone"),
        ]))
        .unwrap();
        assert_eq!(config.api_url, "http://127.0.0.1:9000/api");
        assert_eq!(config.timeout, Duration::from_secs(3));
        assert_eq!(config.page_size, 50);
        assert_eq!(config.prefs_path, PathBuf::from("/tmp/p.json"));
        assert_eq!(config.user_agent, "iPhone");
    }

    #[test]
    fn invalid_values_are_errors() {
        let err = Config::from_lookup(lookup(&[("NOVELSEARCH_PAGE_SIZE", "0")])).unwrap_err();
        assert!(format!("{err:#}").contains("NOVELSEARCH_PAGE_SIZE"));
        let err = Config::from_lookup(lookup(&[("NOVELSEARCH_TIMEOUT_SECS", "soon")])).unwrap_err();
        assert!(format!("{err:#}").contains("NOVELSEARCH_TIMEOUT_SECS"));
    }
}
