//! User settings persisted between invocations.
//!
//! Settings are loaded once in `main`, overlaid with CLI flags, and then
//! passed by value into every component. Nothing else reads the file.
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::util::write_json_pretty;

pub const DEFAULT_MODEL: &str = "mistral";
pub const DEFAULT_OLLAMA_HOST: &str = "localhost";
pub const DEFAULT_OLLAMA_PORT: u16 = 11434;
pub const DEFAULT_QUESTIONS_FILE: &str = "questions.md";

/// Environment variable that points at an alternate settings file.
pub const CONFIG_ENV: &str = "DOCKET_CONFIG";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub model: String,
    pub ollama_host: String,
    pub ollama_port: u16,
    pub questions_file: PathBuf,
    pub last_case_dir: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            ollama_host: DEFAULT_OLLAMA_HOST.to_string(),
            ollama_port: DEFAULT_OLLAMA_PORT,
            questions_file: PathBuf::from(DEFAULT_QUESTIONS_FILE),
            last_case_dir: None,
        }
    }
}

impl Settings {
    /// Base URL of the LM server, without a trailing slash.
    pub fn server_base(&self) -> String {
        format!("http://{}:{}", self.ollama_host, self.ollama_port)
    }

    pub fn generate_url(&self) -> String {
        format!("{}/api/generate", self.server_base())
    }

    /// Apply global CLI overrides on top of the persisted values.
    pub fn with_overrides(
        mut self,
        model: Option<&str>,
        host: Option<&str>,
        port: Option<u16>,
    ) -> Self {
        if let Some(model) = model.map(str::trim).filter(|value| !value.is_empty()) {
            self.model = model.to_string();
        }
        if let Some(host) = host.map(str::trim).filter(|value| !value.is_empty()) {
            self.ollama_host = host.to_string();
        }
        if let Some(port) = port {
            self.ollama_port = port;
        }
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.model.trim().is_empty() {
            return Err(anyhow!("model must be non-empty"));
        }
        if self.ollama_host.trim().is_empty() {
            return Err(anyhow!("ollama_host must be non-empty"));
        }
        if self.ollama_port == 0 {
            return Err(anyhow!("ollama_port must be non-zero"));
        }
        Ok(())
    }
}

/// Resolve the settings file location (`DOCKET_CONFIG` wins).
pub fn settings_path() -> Result<PathBuf> {
    if let Some(explicit) = std::env::var_os(CONFIG_ENV).filter(|value| !value.is_empty()) {
        return Ok(PathBuf::from(explicit));
    }
    let base = dirs::config_dir()
        .or_else(dirs::home_dir)
        .ok_or_else(|| anyhow!("cannot determine a config directory"))?;
    Ok(base.join("docket").join("config.json"))
}

/// Load settings, falling back to defaults when the file does not exist.
pub fn load_settings(path: &Path) -> Result<Settings> {
    if !path.is_file() {
        return Ok(Settings::default());
    }
    let bytes = fs::read(path).with_context(|| format!("read settings {}", path.display()))?;
    let settings: Settings = serde_json::from_slice(&bytes)
        .with_context(|| format!("parse settings {}", path.display()))?;
    settings.validate()?;
    Ok(settings)
}

pub fn save_settings(path: &Path, settings: &Settings) -> Result<()> {
    write_json_pretty(path, settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let settings = load_settings(&dir.path().join("absent.json")).expect("load");
        assert_eq!(settings, Settings::default());
        assert_eq!(
            settings.generate_url(),
            "http://localhost:11434/api/generate"
        );
    }

    #[test]
    fn saved_settings_load_back() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("cfg").join("config.json");
        let settings = Settings {
            model: "llama3:8b".to_string(),
            last_case_dir: Some(PathBuf::from("/cases/a")),
            ..Settings::default()
        };
        save_settings(&path, &settings).expect("save");
        assert_eq!(load_settings(&path).expect("load"), settings);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"ollama_host":"10.0.0.5"}"#).expect("write");
        let settings = load_settings(&path).expect("load");
        assert_eq!(settings.ollama_host, "10.0.0.5");
        assert_eq!(settings.model, DEFAULT_MODEL);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.json");
        fs::write(&path, "not json").expect("write");
        assert!(load_settings(&path).is_err());
    }

    #[test]
    fn overrides_ignore_blank_values() {
        let settings = Settings::default().with_overrides(Some("  "), Some("gpu-box"), Some(8080));
        assert_eq!(settings.model, DEFAULT_MODEL);
        assert_eq!(settings.server_base(), "http://gpu-box:8080");
    }
}
