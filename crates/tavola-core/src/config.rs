use std::fs;
use std::path::{
  Path,
  PathBuf
};
use std::time::Duration;

use anyhow::{
  Context,
  anyhow,
  bail
};
use serde::{
  Deserialize,
  Serialize
};
use tracing::{
  debug,
  info,
  warn
};

pub const CONFIG_ENV: &str = "TAVOLA_CONFIG";
pub const TOKEN_ENV: &str = "TAVOLA_TOKEN";

#[derive(
  Debug, Clone, PartialEq, Serialize, Deserialize,
)]
#[serde(default)]
pub struct ApiSettings {
  pub base_url:     String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub token:        Option<String>,
  pub timeout_secs: u64
}

impl Default for ApiSettings {
  fn default() -> Self {
    Self {
      base_url:     "http://localhost:5000/api"
        .to_string(),
      token:        None,
      timeout_secs: 30
    }
  }
}

impl ApiSettings {
  /// Host that serves uploaded images:
  /// the base URL without its `/api`
  /// suffix.
  pub fn asset_host(&self) -> String {
    let base = self.base_url.trim_end_matches('/');
    base
      .strip_suffix("/api")
      .unwrap_or(base)
      .to_string()
  }
}

#[derive(
  Debug, Clone, PartialEq, Serialize, Deserialize,
)]
#[serde(default)]
pub struct RefreshSettings {
  pub enabled:       bool,
  pub interval_secs: u64
}

impl Default for RefreshSettings {
  fn default() -> Self {
    Self {
      enabled:       true,
      interval_secs: 60
    }
  }
}

impl RefreshSettings {
  pub fn period(&self) -> Option<Duration> {
    self
      .enabled
      .then(|| Duration::from_secs(self.interval_secs))
  }
}

#[derive(
  Debug, Clone, PartialEq, Default, Serialize, Deserialize,
)]
#[serde(default)]
pub struct Config {
  pub api:          ApiSettings,
  pub refresh:      RefreshSettings,
  #[serde(skip)]
  pub loaded_files: Vec<PathBuf>
}

impl Config {
  /// Defaults, then the first config
  /// file found, then `TAVOLA_TOKEN`.
  #[tracing::instrument(skip(config_override))]
  pub fn load(
    config_override: Option<&Path>
  ) -> anyhow::Result<Self> {
    let mut cfg = match resolve_config_path(
      config_override
    )? {
      | Some(path) => {
        info!(config = %path.display(), "loading config");
        Self::load_file(&path)?
      }
      | None => {
        warn!("no config file found; using defaults");
        Self::default()
      }
    };

    cfg.apply_env(|key| std::env::var(key).ok());
    cfg.validate()?;
    Ok(cfg)
  }

  pub fn from_toml_str(
    text: &str
  ) -> anyhow::Result<Self> {
    let cfg = toml::from_str::<Self>(text)
      .map_err(anyhow::Error::new)
      .context("failed to parse config TOML")?;
    Ok(cfg)
  }

  fn load_file(path: &Path) -> anyhow::Result<Self> {
    let path = expand_tilde(path);
    let text = fs::read_to_string(&path)
      .with_context(|| {
        format!("failed to read {}", path.display())
      })?;
    let mut cfg = Self::from_toml_str(&text)
      .with_context(|| {
        format!("invalid config {}", path.display())
      })?;
    cfg.loaded_files.push(path);
    Ok(cfg)
  }

  pub fn apply_env<F>(&mut self, lookup: F)
  where
    F: Fn(&str) -> Option<String>
  {
    if let Some(token) = lookup(TOKEN_ENV)
      .filter(|token| !token.trim().is_empty())
    {
      debug!("api token taken from environment");
      self.api.token = Some(token);
    }
  }

  /// `key=value` pairs from `--set`,
  /// applied in order.
  #[tracing::instrument(skip(self, overrides))]
  pub fn apply_overrides<I>(
    &mut self,
    overrides: I
  ) -> anyhow::Result<()>
  where
    I: IntoIterator<Item = (String, String)>
  {
    for (key, value) in overrides {
      let key = key.trim();
      let value = value.trim();
      match key {
        | "api.token" => {
          self.api.token = Some(value.to_string())
            .filter(|v| !v.is_empty());
          debug!(key, "applying override");
          continue;
        }
        | "api.base_url" => {
          self.api.base_url = value.to_string();
        }
        | "api.timeout_secs" => {
          self.api.timeout_secs =
            parse_secs(key, value)?;
        }
        | "refresh.interval_secs" => {
          self.refresh.interval_secs =
            parse_secs(key, value)?;
        }
        | "refresh.enabled" => {
          self.refresh.enabled = parse_bool(value);
        }
        | other => {
          bail!("unknown config key: {other}")
        }
      }
      debug!(key, value, "applying override");
    }
    self.validate()
  }

  pub fn validate(&self) -> anyhow::Result<()> {
    if !(self.api.base_url.starts_with("http://")
      || self.api.base_url.starts_with("https://"))
    {
      bail!(
        "api.base_url must be an http(s) URL, got {}",
        self.api.base_url
      );
    }
    if self.api.timeout_secs == 0 {
      bail!("api.timeout_secs must be positive");
    }
    if self.refresh.enabled
      && self.refresh.interval_secs == 0
    {
      bail!("refresh.interval_secs must be positive");
    }
    Ok(())
  }
}

#[tracing::instrument(skip(override_path))]
fn resolve_config_path(
  override_path: Option<&Path>
) -> anyhow::Result<Option<PathBuf>> {
  if let Some(path) = override_path {
    let path = expand_tilde(path);
    if !path.is_file() {
      bail!(
        "config file {} does not exist",
        path.display()
      );
    }
    return Ok(Some(path));
  }

  if let Ok(env_path) = std::env::var(CONFIG_ENV) {
    let trimmed = env_path.trim();
    if !trimmed.is_empty() {
      return Ok(Some(expand_tilde(Path::new(
        trimmed
      ))));
    }
  }

  let candidate = dirs::config_dir()
    .map(|dir| dir.join("tavola").join("config.toml"));
  Ok(candidate.filter(|path| path.is_file()))
}

fn parse_secs(
  key: &str,
  value: &str
) -> anyhow::Result<u64> {
  value.parse::<u64>().map_err(|_| {
    anyhow!("{key} expects whole seconds, got {value:?}")
  })
}

fn expand_tilde(path: &Path) -> PathBuf {
  let text = path.to_string_lossy();
  if let Some(rest) = text.strip_prefix("~/")
    && let Some(home) = dirs::home_dir()
  {
    return home.join(rest);
  }
  path.to_path_buf()
}

fn parse_bool(s: &str) -> bool {
  matches!(
    s.trim().to_ascii_lowercase().as_str(),
    "1" | "y" | "yes" | "on" | "true"
  )
}

#[cfg(test)]
mod tests {
  use std::io::Write;

  use super::*;

  #[test]
  fn defaults_match_documented_values() {
    let cfg = Config::default();
    assert_eq!(cfg.api.base_url, "http://localhost:5000/api");
    assert_eq!(cfg.api.timeout_secs, 30);
    assert_eq!(
      cfg.refresh.period(),
      Some(Duration::from_secs(60))
    );
    assert_eq!(cfg.api.asset_host(), "http://localhost:5000");
  }

  #[test]
  fn partial_file_keeps_other_defaults() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
      file,
      "[api]\nbase_url = \"https://admin.example.com/api/\"\n\n[refresh]\nenabled = false"
    )
    .unwrap();

    let cfg = Config::load(Some(file.path())).unwrap();
    assert_eq!(cfg.api.timeout_secs, 30);
    assert_eq!(cfg.refresh.period(), None);
    assert_eq!(cfg.api.asset_host(), "https://admin.example.com");
    assert_eq!(cfg.loaded_files, vec![file.path().to_path_buf()]);
  }

  #[test]
  fn missing_override_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = Config::load(Some(&dir.path().join("nope.toml")))
      .unwrap_err();
    assert!(err.to_string().contains("does not exist"));
  }

  #[test]
  fn overrides_apply_in_order_and_reject_unknown_keys() {
    let mut cfg = Config::default();
    cfg
      .apply_overrides([
        ("refresh.interval_secs".to_string(), "15".to_string()),
        ("api.token".to_string(), "abc".to_string()),
        ("refresh.interval_secs".to_string(), "20".to_string())
      ])
      .unwrap();
    assert_eq!(cfg.refresh.interval_secs, 20);
    assert_eq!(cfg.api.token.as_deref(), Some("abc"));

    assert!(
      cfg
        .apply_overrides([(
          "colour".to_string(),
          "on".to_string()
        )])
        .is_err()
    );
    assert!(
      cfg
        .apply_overrides([(
          "api.timeout_secs".to_string(),
          "soon".to_string()
        )])
        .is_err()
    );
  }

  #[test]
  fn env_token_wins_over_file() {
    let mut cfg = Config::from_toml_str(
      "[api]\ntoken = \"from-file\""
    )
    .unwrap();
    cfg.apply_env(|key| {
      (key == TOKEN_ENV).then(|| "from-env".to_string())
    });
    assert_eq!(cfg.api.token.as_deref(), Some("from-env"));

    cfg.apply_env(|_| Some("  ".to_string()));
    assert_eq!(cfg.api.token.as_deref(), Some("from-env"));
  }

  #[test]
  fn zero_interval_is_rejected_when_enabled() {
    let cfg = Config::from_toml_str(
      "[refresh]\ninterval_secs = 0"
    )
    .unwrap();
    assert!(cfg.validate().is_err());
  }
}
