use std::path::PathBuf;

use crate::http::storage::{parse_base_url, Storage, StoredObjectRef};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use url::Url;

/// Stores objects below `<path>/<bucket>/` and serves them from `base_url`.
pub struct Client {
  path: PathBuf,
  base_url: Url,
}

impl Client {
  pub fn new(path: PathBuf, base_url: &str) -> Result<Self> {
    let base_url = parse_base_url(base_url)?;

    Ok(Self { path, base_url })
  }
}

#[async_trait]
impl Storage for Client {
  async fn upload_object(&self, data: Vec<u8>, object: &StoredObjectRef) -> Result<()> {
    let file_path = self.path.join(&object.bucket).join(&object.path);
    let parent = file_path
      .parent()
      .ok_or_else(|| anyhow!("invalid object path: {}", object.path))?;

    tokio::fs::create_dir_all(parent)
      .await
      .with_context(|| format!("failed to create directory: {}", object.path))?;

    let mut file = tokio::fs::OpenOptions::new()
      .write(true)
      .create_new(true)
      .open(&file_path)
      .await
      .with_context(|| format!("failed to create file: {}", object.path))?;

    file
      .write_all(&data)
      .await
      .with_context(|| format!("failed to write file: {}", object.path))?;
    file
      .flush()
      .await
      .with_context(|| format!("failed to flush file: {}", object.path))?;

    Ok(())
  }

  async fn public_url(&self, object: &StoredObjectRef) -> Result<String> {
    let url = self
      .base_url
      .join(&format!("{}/{}", object.bucket, object.path))
      .with_context(|| format!("failed to build public url for: {}", object.path))?;

    Ok(url.to_string())
  }
}
