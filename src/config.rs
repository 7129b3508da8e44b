use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::fs;

pub const CONFIG_PATH_ENV: &str = "BUCKET_HOOK_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageType {
  Supabase,
  S3,
  Local,
}

#[derive(Deserialize, Debug, Clone)]
pub struct Config {
  pub app: AppConfig,
  pub storage: StorageConfig,
}

#[derive(Deserialize, Debug, Clone)]
pub struct AppConfig {
  pub listen: String,
  pub metrics_listen: String,
  pub max_body_size_mb: usize,
  pub enable_openapi: Option<bool>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct StorageConfig {
  pub storage_type: StorageType,
  pub bucket: String,
  /// Prefix for JSON documents. Images are stored at the bucket root.
  pub folder: String,
  pub supabase: Option<StorageConfigSupabase>,
  pub s3: Option<StorageConfigS3>,
  pub local: Option<StorageConfigLocal>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct StorageConfigSupabase {
  pub url: String,
  pub key: String,
}

#[derive(Deserialize, Debug, Clone)]
pub struct StorageConfigS3 {
  pub endpoint: String,
  pub access_key_id: String,
  pub secret_access_key: String,
  pub region: String,
  pub force_path_style: bool,
  pub base_url: String,
}

#[derive(Deserialize, Debug, Clone)]
pub struct StorageConfigLocal {
  pub path: String,
  pub base_url: String,
}

/// Reads and validates the config file. Any error here means the process must
/// not start serving.
pub fn parse(config_path: &str) -> Result<Config> {
  let toml_str = fs::read_to_string(config_path)
    .with_context(|| format!("failed to read config file: {}", config_path))?;

  from_toml(&toml_str)
}

pub fn from_toml(toml_str: &str) -> Result<Config> {
  let cfg: Config = toml::from_str(toml_str).context("failed to deserialize config")?;
  cfg.validate()?;

  Ok(cfg)
}

fn require(value: &str, name: &str) -> Result<()> {
  if value.trim().is_empty() {
    return Err(anyhow!("config value `{}` is missing or empty", name));
  }

  Ok(())
}

impl Config {
  pub fn validate(&self) -> Result<()> {
    require(&self.app.listen, "app.listen")?;
    require(&self.app.metrics_listen, "app.metrics_listen")?;
    require(&self.storage.bucket, "storage.bucket")?;
    require(&self.storage.folder, "storage.folder")?;

    match self.storage.storage_type {
      StorageType::Supabase => {
        let supabase = self
          .storage
          .supabase
          .as_ref()
          .ok_or_else(|| anyhow!("Supabase storage config is missing"))?;
        require(&supabase.url, "storage.supabase.url")?;
        require(&supabase.key, "storage.supabase.key")?;
      }
      StorageType::S3 => {
        let s3 = self
          .storage
          .s3
          .as_ref()
          .ok_or_else(|| anyhow!("S3 storage config is missing"))?;
        require(&s3.endpoint, "storage.s3.endpoint")?;
        require(&s3.access_key_id, "storage.s3.access_key_id")?;
        require(&s3.secret_access_key, "storage.s3.secret_access_key")?;
        require(&s3.base_url, "storage.s3.base_url")?;
      }
      StorageType::Local => {
        let local = self
          .storage
          .local
          .as_ref()
          .ok_or_else(|| anyhow!("local storage config is missing"))?;
        require(&local.path, "storage.local.path")?;
        require(&local.base_url, "storage.local.base_url")?;
      }
    }

    Ok(())
  }
}
