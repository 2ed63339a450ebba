use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{anyhow, Context, Result};
use clap::ValueEnum;
use client_core::{ServiceConfig, DEFAULT_HISTORY_CAPACITY};
use serde::Deserialize;
use url::Url;

pub const DEFAULT_CONFIG_FILE: &str = "datacrew.toml";

/// Which presentation renders the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ViewKind {
    #[default]
    Workspace,
    Summary,
}

impl ViewKind {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "workspace" => Some(Self::Workspace),
            "summary" => Some(Self::Summary),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub service_url: String,
    pub request_timeout_secs: u64,
    pub history_capacity: usize,
    pub view: ViewKind,
    pub table_name: Option<String>,
    pub chart_dir: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            service_url: "http://localhost:5000".into(),
            request_timeout_secs: 30,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            view: ViewKind::Workspace,
            table_name: None,
            chart_dir: PathBuf::from("./charts"),
        }
    }
}

impl Settings {
    pub fn service_config(&self) -> Result<ServiceConfig> {
        let base_url = Url::parse(&self.service_url)
            .with_context(|| format!("invalid service url '{}'", self.service_url))?;
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(anyhow!(
                "service url '{}' must use http or https",
                self.service_url
            ));
        }
        Ok(ServiceConfig {
            base_url,
            request_timeout: Duration::from_secs(self.request_timeout_secs.max(1)),
            table_name: self.table_name.clone(),
        })
    }
}

/// Defaults, then the config file (explicit path or `datacrew.toml` if present), then env.
pub fn load_settings(path: Option<&Path>) -> Result<Settings> {
    let mut settings = match path {
        Some(path) => read_settings_file(path)?,
        None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
            read_settings_file(Path::new(DEFAULT_CONFIG_FILE))?
        }
        None => Settings::default(),
    };
    apply_env_overrides(&mut settings, |key| std::env::var(key).ok())?;
    Ok(settings)
}

fn read_settings_file(path: &Path) -> Result<Settings> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file '{}'", path.display()))?;
    parse_settings(&raw).with_context(|| format!("failed to parse config file '{}'", path.display()))
}

fn parse_settings(raw: &str) -> Result<Settings> {
    Ok(toml::from_str(raw)?)
}

fn apply_env_overrides(
    settings: &mut Settings,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<()> {
    if let Some(v) = lookup("DATACREW_SERVICE_URL") {
        settings.service_url = v;
    }
    if let Some(v) = lookup("APP__SERVICE_URL") {
        settings.service_url = v;
    }

    if let Some(v) = lookup("APP__REQUEST_TIMEOUT_SECS") {
        settings.request_timeout_secs = v
            .trim()
            .parse()
            .with_context(|| format!("APP__REQUEST_TIMEOUT_SECS is not a number: '{v}'"))?;
    }

    if let Some(v) = lookup("APP__HISTORY_CAPACITY") {
        settings.history_capacity = v
            .trim()
            .parse()
            .with_context(|| format!("APP__HISTORY_CAPACITY is not a number: '{v}'"))?;
    }

    if let Some(v) = lookup("APP__VIEW") {
        settings.view = ViewKind::parse(&v)
            .ok_or_else(|| anyhow!("APP__VIEW must be 'workspace' or 'summary', got '{v}'"))?;
    }

    if let Some(v) = lookup("APP__TABLE_NAME") {
        settings.table_name = Some(v);
    }

    if let Some(v) = lookup("APP__CHART_DIR") {
        settings.chart_dir = PathBuf::from(v);
    }

    Ok(())
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
