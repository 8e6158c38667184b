use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use url::Url;

/// Backend used when neither the config file nor the environment names one
pub const DEFAULT_API_URL: &str = "https://kofa-backend-eu-2bb681b4e51a.herokuapp.com";

/// Environment variable overriding `api.base_url`
pub const API_URL_ENV: &str = "KOFA_API_URL";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
  #[serde(default)]
  pub api: ApiConfig,
  #[serde(default)]
  pub storage: StorageConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
  #[serde(default = "default_base_url")]
  pub base_url: String,
}

impl Default for ApiConfig {
  fn default() -> Self {
    Self {
      base_url: default_base_url(),
    }
  }
}

fn default_base_url() -> String {
  DEFAULT_API_URL.to_string()
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StorageConfig {
  /// SQLite file to use instead of the platform data directory
  pub path: Option<PathBuf>,
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./kofa.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/kofa/config.yaml
  ///
  /// With no file anywhere the defaults apply. `KOFA_API_URL` wins over
  /// whatever the file says.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    let config = match path {
      Some(p) => Self::load_from_path(&p)?,
      None => Self::default(),
    };

    config
      .with_api_url_override(std::env::var(API_URL_ENV).ok())
      .validated()
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("kofa.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("kofa").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::from_yaml(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  fn from_yaml(contents: &str) -> Result<Self> {
    // An empty file is a valid "use the defaults"
    if contents.trim().is_empty() {
      return Ok(Self::default());
    }
    Ok(serde_yaml::from_str(contents)?)
  }

  fn with_api_url_override(mut self, url: Option<String>) -> Self {
    if let Some(url) = url.filter(|u| !u.trim().is_empty()) {
      self.api.base_url = url.trim().to_string();
    }
    self
  }

  fn validated(self) -> Result<Self> {
    let url = Url::parse(&self.api.base_url)
      .map_err(|e| eyre!("Invalid API base URL {:?}: {}", self.api.base_url, e))?;
    if !matches!(url.scheme(), "http" | "https") {
      return Err(eyre!(
        "API base URL must be http or https, got {:?}",
        self.api.base_url
      ));
    }
    Ok(self)
  }

  /// Directory for the log file, next to the default database.
  pub fn log_dir() -> Option<PathBuf> {
    dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .map(|p| p.join("kofa").join("logs"))
  }
}
