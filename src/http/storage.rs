use anyhow::{Context, Result};
use async_trait::async_trait;
use url::Url;

/// Everything a backend needs to know about an object it is asked to store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObjectRef {
  pub bucket: String,
  pub path: String,
  pub content_type: String,
  pub cache_control_seconds: u32,
}

impl StoredObjectRef {
  pub fn cache_control(&self) -> String {
    format!("max-age={}", self.cache_control_seconds)
  }
}

/// Object storage collaborator. Uploads must never overwrite an existing key.
#[async_trait]
pub trait Storage: Send + Sync {
  async fn upload_object(&self, data: Vec<u8>, object: &StoredObjectRef) -> Result<()>;

  async fn public_url(&self, object: &StoredObjectRef) -> Result<String>;
}

/// Parses a public base URL so that keys are joined below its last segment.
/// `Url::join` would otherwise replace a segment not ending in `/`.
pub fn parse_base_url(raw: &str) -> Result<Url> {
  let mut url = Url::parse(raw).context("failed to parse base url")?;
  if !url.path().ends_with('/') {
    let path = format!("{}/", url.path());
    url.set_path(&path);
  }

  Ok(url)
}
