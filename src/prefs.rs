use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::Context as _;
use serde::{Deserialize, Serialize};

pub const THEME_KEY: &str = "themeMode";
pub const DISPLAY_KEY: &str = "displayMode";

const MOBILE_MARKERS: &[&str] = &["iPhone", "iPad", "iPod", "Android", "Mobile"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum DisplayMode {
    Infinite,
    Pagination,
}

impl DisplayMode {
    pub fn as_str(self) -> &'static str {
        match self {
            DisplayMode::Infinite => "infinite",
            DisplayMode::Pagination => "pagination",
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            DisplayMode::Infinite => DisplayMode::Pagination,
            DisplayMode::Pagination => DisplayMode::Infinite,
        }
    }

    /// Touch/mobile-class agents default to pagination.
    pub fn default_for_user_agent(user_agent: &str) -> Self {
        if MOBILE_MARKERS.iter().any(|m| user_agent.contains(m)) {
            DisplayMode::Pagination
        } else {
            DisplayMode::Infinite
        }
    }
}

impl fmt::Display for DisplayMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DisplayMode {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> anyhow::Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "infinite" => Ok(DisplayMode::Infinite),
            "pagination" => Ok(DisplayMode::Pagination),
            other => anyhow::bail!("unsupported display mode: {other}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ThemeMode {
    Light,
    Dark,
}

impl ThemeMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ThemeMode::Light => "light",
            ThemeMode::Dark => "dark",
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            ThemeMode::Light => ThemeMode::Dark,
            ThemeMode::Dark => ThemeMode::Light,
        }
    }
}

impl fmt::Display for ThemeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ThemeMode {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> anyhow::Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "light" => Ok(ThemeMode::Light),
            "dark" => Ok(ThemeMode::Dark),
            other => anyhow::bail!("unsupported theme mode: {other}"),
        }
    }
}

/// Durable string key/value storage (the browser's local storage).
pub trait PreferenceStore: Send {
    fn get(&self, key: &str) -> anyhow::Result<Option<String>>;
    fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    values: BTreeMap<String, String>,
}

impl PreferenceStore for MemoryStore {
    fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        Ok(self.values.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        self.values.insert(key.to_owned(), value.to_owned());
        Ok(())
    }
}

/// Preferences stored as a flat JSON object on disk.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> anyhow::Result<BTreeMap<String, String>> {
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(BTreeMap::new());
            }
            Err(err) => {
                return Err(err).with_context(|| format!("read: {}", self.path.display()));
            }
        };
        match serde_json::from_slice(&bytes) {
            Ok(values) => Ok(values),
            Err(err) => {
                // The next write replaces the file.
                tracing::warn!(
                    path = %self.path.display(),
                    error = %err,
                    "ignoring unreadable preferences file"
                );
                Ok(BTreeMap::new())
            }
        }
    }
}

impl PreferenceStore for JsonFileStore {
    fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        Ok(self.read_all()?.remove(key))
    }

    fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        let mut values = self.read_all()?;
        values.insert(key.to_owned(), value.to_owned());
        write_json_atomic(&self.path, &values)
    }
}

fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create parent dir: {}", parent.display()))?;
    }

    let tmp_path = path.with_extension(format!("tmp.{}", uuid::Uuid::new_v4().simple()));
    let data = serde_json::to_vec_pretty(value).context("serialize json")?;
    std::fs::write(&tmp_path, &data)
        .with_context(|| format!("write tmp: {}", tmp_path.display()))?;
    std::fs::rename(&tmp_path, path)
        .with_context(|| format!("rename tmp to final: {}", path.display()))?;
    Ok(())
}

/// Theme and display mode, read once at startup and written on change.
pub struct Preferences {
    theme: ThemeMode,
    display: DisplayMode,
    store: Box<dyn PreferenceStore>,
}

impl fmt::Debug for Preferences {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Preferences")
            .field("theme", &self.theme)
            .field("display", &self.display)
            .finish_non_exhaustive()
    }
}

impl Preferences {
    /// Loads stored values; unknown or missing values fall back to light
    /// theme and the device-class default display mode.
    pub fn load(store: Box<dyn PreferenceStore>, user_agent: &str) -> anyhow::Result<Self> {
        let theme = match store.get(THEME_KEY).context("read theme preference")? {
            Some(raw) => raw.parse().unwrap_or_else(|err| {
                tracing::warn!(?err, "ignoring stored theme");
                ThemeMode::Light
            }),
            None => ThemeMode::Light,
        };
        let fallback = DisplayMode::default_for_user_agent(user_agent);
        let display = match store.get(DISPLAY_KEY).context("read display preference")? {
            Some(raw) => raw.parse().unwrap_or_else(|err| {
                tracing::warn!(?err, "ignoring stored display mode");
                fallback
            }),
            None => fallback,
        };
        Ok(Self {
            theme,
            display,
            store,
        })
    }

    pub fn in_memory(user_agent: &str) -> Self {
        Self {
            theme: ThemeMode::Light,
            display: DisplayMode::default_for_user_agent(user_agent),
            store: Box::new(MemoryStore::default()),
        }
    }

    pub fn theme(&self) -> ThemeMode {
        self.theme
    }

    pub fn display_mode(&self) -> DisplayMode {
        self.display
    }

    pub fn set_display_mode(&mut self, mode: DisplayMode) -> anyhow::Result<()> {
        self.store
            .set(DISPLAY_KEY, mode.as_str())
            .context("persist display mode")?;
        self.display = mode;
        Ok(())
    }

    pub fn toggle_display_mode(&mut self) -> anyhow::Result<DisplayMode> {
        let next = self.display.toggled();
        self.set_display_mode(next)?;
        Ok(next)
    }

    pub fn set_theme(&mut self, theme: ThemeMode) -> anyhow::Result<()> {
        self.store
            .set(THEME_KEY, theme.as_str())
            .context("persist theme")?;
        self.theme = theme;
        Ok(())
    }

    pub fn toggle_theme(&mut self) -> anyhow::Result<ThemeMode> {
        let next = self.theme.toggled();
        self.set_theme(next)?;
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const IPHONE: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X)";
    const DESKTOP: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64)";

    #[test]
    fn device_class_defaults() {
        assert_eq!(
            DisplayMode::default_for_user_agent(IPHONE),
            DisplayMode::Pagination
        );
        assert_eq!(
            DisplayMode::default_for_user_agent("Mozilla/5.0 (Linux; Android 14) Mobile"),
            DisplayMode::Pagination
        );
        assert_eq!(
            DisplayMode::default_for_user_agent(DESKTOP),
            DisplayMode::Infinite
        );
    }

    #[test]
    fn stored_values_win_over_device_default() {
        let mut store = MemoryStore::default();
        store.set(DISPLAY_KEY, "infinite").unwrap();
        store.set(THEME_KEY, "dark").unwrap();
        let prefs = Preferences::load(Box::new(store), IPHONE).unwrap();
        assert_eq!(prefs.display_mode(), DisplayMode::Infinite);
        assert_eq!(prefs.theme(), ThemeMode::Dark);
    }

    #[test]
    fn garbage_values_fall_back() {
        let mut store = MemoryStore::default();
        store.set(DISPLAY_KEY, "sideways").unwrap();
        store.set(THEME_KEY, "neon").unwrap();
        let prefs = Preferences::load(Box::new(store), IPHONE).unwrap();
        assert_eq!(prefs.display_mode(), DisplayMode::Pagination);
        assert_eq!(prefs.theme(), ThemeMode::Light);
    }

    #[test]
    fn toggles_persist_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("prefs.json");

        let mut prefs = Preferences::load(Box::new(JsonFileStore::new(&path)), DESKTOP).unwrap();
        assert_eq!(prefs.display_mode(), DisplayMode::Infinite);
        assert_eq!(prefs.toggle_display_mode().unwrap(), DisplayMode::Pagination);
        assert_eq!(prefs.toggle_theme().unwrap(), ThemeMode::Dark);

        let reloaded = Preferences::load(Box::new(JsonFileStore::new(&path)), DESKTOP).unwrap();
        assert_eq!(reloaded.display_mode(), DisplayMode::Pagination);
        assert_eq!(reloaded.theme(), ThemeMode::Dark);

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"displayMode\": \"pagination\""));
    }

    #[test]
    fn corrupt_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.json");
        std::fs::write(&path, "{not json").unwrap();

        let mut prefs = Preferences::load(Box::new(JsonFileStore::new(&path)), IPHONE).unwrap();
        assert_eq!(prefs.theme(), ThemeMode::Light);
        assert_eq!(prefs.display_mode(), DisplayMode::Pagination);

        prefs.toggle_theme().unwrap();
        let reloaded = Preferences::load(Box::new(JsonFileStore::new(&path)), IPHONE).unwrap();
        assert_eq!(reloaded.theme(), ThemeMode::Dark);
    }
}
