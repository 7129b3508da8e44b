use crate::http::storage::{Storage, StoredObjectRef};
use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use reqwest::header::{CACHE_CONTROL, CONTENT_TYPE};
use serde::Deserialize;
use tracing::debug;
use url::Url;

const OBJECT_PATH: [&str; 3] = ["storage", "v1", "object"];

/// Client for the Supabase Storage REST API.
pub struct Client {
  http: reqwest::Client,
  base_url: Url,
  key: String,
}

#[derive(Deserialize)]
struct ErrorBody {
  message: Option<String>,
  error: Option<String>,
}

impl Client {
  pub fn new(http: reqwest::Client, base_url: &str, key: &str) -> Result<Self> {
    let base_url = Url::parse(base_url).context("failed to parse supabase url")?;

    Ok(Self {
      http,
      base_url,
      key: key.to_owned(),
    })
  }

  /// `{base}/storage/v1/object[/public]/{bucket}/{key}`, percent-encoding each segment.
  fn object_url(&self, public: bool, object: &StoredObjectRef) -> Result<Url> {
    let mut url = self.base_url.clone();
    {
      let mut segments = url
        .path_segments_mut()
        .map_err(|_| anyhow!("supabase url cannot be a base: {}", self.base_url))?;
      segments.pop_if_empty().extend(OBJECT_PATH);
      if public {
        segments.push("public");
      }
      segments
        .push(&object.bucket)
        .extend(object.path.split('/'));
    }

    Ok(url)
  }
}

#[async_trait]
impl Storage for Client {
  async fn upload_object(&self, data: Vec<u8>, object: &StoredObjectRef) -> Result<()> {
    let url = self.object_url(false, object)?;

    debug!("uploading object: {} ({} bytes)", url, data.len());

    let res = self
      .http
      .post(url)
      .bearer_auth(&self.key)
      .header("apikey", &self.key)
      .header(CONTENT_TYPE, object.content_type.as_str())
      .header(CACHE_CONTROL, object.cache_control())
      .header("x-upsert", "false")
      .body(data)
      .send()
      .await
      .context("failed to reach supabase storage")?;

    let status = res.status();
    if !status.is_success() {
      let body = res.text().await.unwrap_or_default();
      let message = serde_json::from_str::<ErrorBody>(&body)
        .ok()
        .and_then(|b| b.message.or(b.error))
        .unwrap_or(body);

      bail!("supabase storage rejected upload ({}): {}", status, message);
    }

    Ok(())
  }

  async fn public_url(&self, object: &StoredObjectRef) -> Result<String> {
    Ok(self.object_url(true, object)?.to_string())
  }
}
