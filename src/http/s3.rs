use crate::config::StorageConfigS3;
use crate::http::storage::{parse_base_url, Storage, StoredObjectRef};
use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use tracing::debug;
use url::Url;

pub struct Client {
  s3_client: aws_sdk_s3::Client,
  base_url: Url,
}

/// Builds an SDK client with static credentials from the config.
pub fn sdk_client(storage_config: &StorageConfigS3) -> aws_sdk_s3::Client {
  let cred = aws_sdk_s3::config::Credentials::new(
    storage_config.access_key_id.clone(),
    storage_config.secret_access_key.clone(),
    None,
    None,
    "loaded-from-config",
  );

  let s3_config = aws_sdk_s3::config::Builder::new()
    .endpoint_url(storage_config.endpoint.clone())
    .credentials_provider(cred)
    .region(aws_sdk_s3::config::Region::new(
      storage_config.region.clone(),
    ))
    .force_path_style(storage_config.force_path_style) // apply bucketname as path param instead of pre-domain
    .behavior_version_latest()
    .build();

  aws_sdk_s3::Client::from_conf(s3_config)
}

impl Client {
  pub fn new(s3_client: aws_sdk_s3::Client, base_url: &str) -> Result<Self> {
    let base_url = parse_base_url(base_url)?;

    Ok(Self {
      s3_client,
      base_url,
    })
  }
}

#[async_trait]
impl Storage for Client {
  async fn upload_object(&self, data: Vec<u8>, object: &StoredObjectRef) -> Result<()> {
    debug!(
      "uploading object: {} to bucket: {} ({} bytes)",
      object.path,
      object.bucket,
      data.len()
    );

    let res = self
      .s3_client
      .put_object()
      .bucket(object.bucket.as_str())
      .key(object.path.as_str())
      .body(ByteStream::from(data))
      .cache_control(object.cache_control())
      .content_type(object.content_type.as_str())
      // Conditional write: the request fails if the key already exists
      .if_none_match("*")
      .send()
      .await
      .context("failed to upload object")?;

    debug!(
      "stored object: {} etag: {}",
      object.path,
      res.e_tag().unwrap_or("").trim_matches('"')
    );

    Ok(())
  }

  async fn public_url(&self, object: &StoredObjectRef) -> Result<String> {
    let url = self
      .base_url
      .join(&object.path)
      .with_context(|| format!("failed to build public url for: {}", object.path))?;

    Ok(url.to_string())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use wiremock::matchers::{header, method, path};
  use wiremock::{Mock, MockServer, ResponseTemplate};

  fn object() -> StoredObjectRef {
    StoredObjectRef {
      bucket: "uploads".to_owned(),
      path: "data/0b6d.json".to_owned(),
      content_type: "application/json".to_owned(),
      cache_control_seconds: 3600,
    }
  }

  fn client(endpoint: &str, base_url: &str) -> Client {
    let cfg = StorageConfigS3 {
      endpoint: endpoint.to_owned(),
      access_key_id: "access".to_owned(),
      secret_access_key: "secret".to_owned(),
      region: "us-east-1".to_owned(),
      force_path_style: true,
      base_url: base_url.to_owned(),
    };

    Client::new(sdk_client(&cfg), &cfg.base_url).unwrap()
  }

  #[tokio::test]
  async fn upload_is_conditional_and_cached() {
    let server = MockServer::start().await;

    Mock::given(method("PUT"))
      .and(path("/uploads/data/0b6d.json"))
      .and(header("if-none-match", "*"))
      .and(header("cache-control", "max-age=3600"))
      .and(header("content-type", "application/json"))
      .respond_with(ResponseTemplate::new(200).insert_header("ETag", "\"abc\""))
      .expect(1)
      .mount(&server)
      .await;

    let client = client(&server.uri(), "https://cdn.example.com/");

    client.upload_object(b"{}".to_vec(), &object()).await.unwrap();
  }

  #[tokio::test]
  async fn existing_key_fails_upload() {
    let server = MockServer::start().await;

    Mock::given(method("PUT"))
      .respond_with(
        ResponseTemplate::new(412)
          .insert_header("content-type", "application/xml")
          .set_body_string(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
             <Error><Code>PreconditionFailed</Code>\
             <Message>At least one of the pre-conditions you specified did not hold</Message>\
             </Error>",
          ),
      )
      .mount(&server)
      .await;

    let client = client(&server.uri(), "https://cdn.example.com/");

    assert!(client.upload_object(b"{}".to_vec(), &object()).await.is_err());
  }

  #[tokio::test]
  async fn public_url_keeps_base_path_without_trailing_slash() {
    let client = client("http://127.0.0.1:1", "https://cdn.example.com/media");

    let url = client.public_url(&object()).await.unwrap();

    assert_eq!(url, "https://cdn.example.com/media/data/0b6d.json");
  }
}
