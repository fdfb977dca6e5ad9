use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const CONFIG_RELATIVE_PATH: &str = ".taskline/config.toml";
const CONFIG_VERSION: u32 = 1;

pub const DEFAULT_TITLE: &str = "taskline";
pub const DEFAULT_SPINNER_INTERVAL_MS: u64 = 100;
pub const DEFAULT_INACTIVITY_THRESHOLD_MS: u64 = 3_000;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TrackerConfig {
    pub title: String,
    pub spinner_interval_ms: u64,
    pub inactivity_threshold_ms: u64,
    pub truncate_output: bool,
    /// Draw frames. `None` means draw only when stderr is a terminal.
    pub interactive: Option<bool>,
    pub keyboard: bool,
    pub color: bool,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            title: DEFAULT_TITLE.to_string(),
            spinner_interval_ms: DEFAULT_SPINNER_INTERVAL_MS,
            inactivity_threshold_ms: DEFAULT_INACTIVITY_THRESHOLD_MS,
            truncate_output: false,
            interactive: None,
            keyboard: true,
            color: true,
        }
    }
}

impl TrackerConfig {
    pub fn spinner_interval(&self) -> Duration {
        Duration::from_millis(self.spinner_interval_ms)
    }

    pub fn inactivity_threshold(&self) -> Duration {
        Duration::from_millis(self.inactivity_threshold_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
struct RawConfig {
    version: Option<u32>,
    tracker: Option<RawTrackerConfig>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawTrackerConfig {
    title: Option<String>,
    spinner_interval_ms: Option<u64>,
    inactivity_threshold_ms: Option<u64>,
    truncate_output: Option<bool>,
    interactive: Option<bool>,
    keyboard: Option<bool>,
    color: Option<bool>,
}

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_RELATIVE_PATH)
}

pub fn load_config(root: &Path) -> Result<Option<TrackerConfig>> {
    let path = config_path(root);
    if !path.exists() {
        return Ok(None);
    }
    load_config_file(&path).map(Some)
}

pub fn load_config_file(path: &Path) -> Result<TrackerConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("read tracker config {}", path.display()))?;
    let parsed: RawConfig =
        toml::from_str(&raw).with_context(|| format!("parse {}", path.display()))?;
    validate_config(parsed, path)
}

fn validate_config(raw: RawConfig, path: &Path) -> Result<TrackerConfig> {
    let version = raw
        .version
        .ok_or_else(|| anyhow::anyhow!("{} missing required `version`", path.display()))?;
    if version != CONFIG_VERSION {
        bail!(
            "{} has unsupported version {version}; expected version = {CONFIG_VERSION}",
            path.display()
        );
    }

    let mut cfg = TrackerConfig::default();
    let Some(tracker) = raw.tracker else {
        return Ok(cfg);
    };

    if let Some(title) = tracker
        .title
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
    {
        cfg.title = title;
    }
    if let Some(ms) = tracker.spinner_interval_ms {
        cfg.spinner_interval_ms = positive_ms(ms, "spinner_interval_ms", path)?;
    }
    if let Some(ms) = tracker.inactivity_threshold_ms {
        cfg.inactivity_threshold_ms = positive_ms(ms, "inactivity_threshold_ms", path)?;
    }
    if let Some(truncate) = tracker.truncate_output {
        cfg.truncate_output = truncate;
    }
    cfg.interactive = tracker.interactive;
    if let Some(keyboard) = tracker.keyboard {
        cfg.keyboard = keyboard;
    }
    if let Some(color) = tracker.color {
        cfg.color = color;
    }
    Ok(cfg)
}

fn positive_ms(value: u64, key: &str, path: &Path) -> Result<u64> {
    if value == 0 {
        bail!("{} has zero `[tracker].{key}`; expected a positive number of milliseconds", path.display());
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write_config(root: &Path, body: &str) {
        let path = config_path(root);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, body).unwrap();
    }

    #[test]
    fn missing_file_yields_none() {
        let tmp = tempdir().unwrap();
        assert!(load_config(tmp.path()).unwrap().is_none());
    }

    #[test]
    fn version_only_config_uses_defaults() {
        let tmp = tempdir().unwrap();
        write_config(tmp.path(), "version = 1");
        let cfg = load_config(tmp.path()).unwrap().unwrap();
        assert_eq!(cfg, TrackerConfig::default());
        assert_eq!(cfg.spinner_interval(), Duration::from_millis(100));
        assert_eq!(cfg.inactivity_threshold(), Duration::from_secs(3));
    }

    #[test]
    fn parses_tracker_section() {
        let tmp = tempdir().unwrap();
        write_config(
            tmp.path(),
            r#"
version = 1
[tracker]
title = "  build  "
spinner_interval_ms = 80
inactivity_threshold_ms = 500
truncate_output = true
interactive = false
keyboard = false
color = false
"#,
        );
        let cfg = load_config(tmp.path()).unwrap().unwrap();
        assert_eq!(cfg.title, "build");
        assert_eq!(cfg.spinner_interval_ms, 80);
        assert_eq!(cfg.inactivity_threshold_ms, 500);
        assert!(cfg.truncate_output);
        assert_eq!(cfg.interactive, Some(false));
        assert!(!cfg.keyboard);
        assert!(!cfg.color);
    }

    #[test]
    fn blank_title_falls_back_to_default() {
        let tmp = tempdir().unwrap();
        write_config(tmp.path(), "version = 1\n[tracker]\ntitle = \"   \"\n");
        let cfg = load_config(tmp.path()).unwrap().unwrap();
        assert_eq!(cfg.title, DEFAULT_TITLE);
    }

    #[test]
    fn rejects_missing_or_unsupported_version() {
        let tmp = tempdir().unwrap();
        write_config(tmp.path(), "[tracker]\ncolor = false\n");
        let err = load_config(tmp.path()).unwrap_err();
        assert!(format!("{err}").contains("missing required `version`"));

        write_config(tmp.path(), "version = 2");
        let err = load_config(tmp.path()).unwrap_err();
        assert!(format!("{err}").contains("unsupported version"));
    }

    #[test]
    fn rejects_zero_intervals() {
        let tmp = tempdir().unwrap();
        write_config(tmp.path(), "version = 1\n[tracker]\nspinner_interval_ms = 0\n");
        let err = load_config(tmp.path()).unwrap_err();
        assert!(format!("{err}").contains("zero `[tracker].spinner_interval_ms`"));
    }

    #[test]
    fn reports_parse_errors_with_path() {
        let tmp = tempdir().unwrap();
        write_config(tmp.path(), "version = ");
        let err = load_config(tmp.path()).unwrap_err();
        assert!(format!("{err}").contains("parse"));
    }
}
