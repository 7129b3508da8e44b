use std::fmt;
use std::sync::Arc;

use axum::http::Method;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::http::storage::{Storage, StoredObjectRef};

pub mod encoding;

pub const CACHE_CONTROL_SECONDS: u32 = 3600;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
  Base64Image,
  JsonDocument,
}

impl PayloadKind {
  pub fn content_type(self) -> &'static str {
    match self {
      PayloadKind::Base64Image => "image/png",
      PayloadKind::JsonDocument => "application/json",
    }
  }

  pub fn extension(self) -> &'static str {
    match self {
      PayloadKind::Base64Image => "png",
      PayloadKind::JsonDocument => "json",
    }
  }

  pub fn as_str(self) -> &'static str {
    match self {
      PayloadKind::Base64Image => "base64_image",
      PayloadKind::JsonDocument => "json_document",
    }
  }
}

impl fmt::Display for PayloadKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      PayloadKind::Base64Image => f.write_str("base64 image"),
      PayloadKind::JsonDocument => f.write_str("JSON document"),
    }
  }
}

/// Where the generated key lands in the bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathConvention {
  /// `<uuid>.<ext>` at the bucket root.
  FlatWithExtension,
  /// `<folder>/<uuid>.<ext>`.
  FolderPrefixed,
}

/// Body returned to the caller on success.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseShape {
  /// The URL as a bare JSON string.
  PlainUrl,
  /// `{"publicUrl": ...}`
  UrlField,
  /// `{"message": ..., "fileUrl": ..., "fileName": ...}`
  MessageAndFileInfo,
}

/// A webhook entry point, fixed when the router is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Endpoint {
  pub kind: PayloadKind,
  pub shape: ResponseShape,
  pub path_convention: PathConvention,
}

impl Endpoint {
  pub const IMAGE: Endpoint = Endpoint {
    kind: PayloadKind::Base64Image,
    shape: ResponseShape::UrlField,
    path_convention: PathConvention::FlatWithExtension,
  };

  pub const JSON: Endpoint = Endpoint {
    kind: PayloadKind::JsonDocument,
    shape: ResponseShape::MessageAndFileInfo,
    path_convention: PathConvention::FolderPrefixed,
  };

  pub const JSON_URL: Endpoint = Endpoint {
    kind: PayloadKind::JsonDocument,
    shape: ResponseShape::PlainUrl,
    path_convention: PathConvention::FolderPrefixed,
  };
}

/// Request body as the HTTP layer received it, before any shape check.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
  Text(String),
  Json(Value),
}

#[derive(Debug, Clone, PartialEq)]
pub enum UploadRequest {
  Base64Image(String),
  JsonDocument(Value),
}

impl UploadRequest {
  pub fn from_payload(kind: PayloadKind, payload: Option<Payload>) -> Result<Self, PublishError> {
    match (kind, payload) {
      (PayloadKind::Base64Image, Some(Payload::Text(s) | Payload::Json(Value::String(s))))
        if !s.is_empty() =>
      {
        Ok(UploadRequest::Base64Image(s))
      }
      (PayloadKind::JsonDocument, Some(Payload::Json(v @ (Value::Object(_) | Value::Array(_))))) => {
        Ok(UploadRequest::JsonDocument(v))
      }
      _ => Err(PublishError::InvalidPayload(kind)),
    }
  }

  pub fn kind(&self) -> PayloadKind {
    match self {
      UploadRequest::Base64Image(_) => PayloadKind::Base64Image,
      UploadRequest::JsonDocument(_) => PayloadKind::JsonDocument,
    }
  }

  pub fn to_bytes(&self) -> Result<Vec<u8>, PublishError> {
    match self {
      UploadRequest::Base64Image(data) => Ok(encoding::decode_base64_lenient(data)),
      UploadRequest::JsonDocument(doc) => {
        encoding::to_pretty_json(doc).map_err(|e| PublishError::InternalError {
          kind: PayloadKind::JsonDocument,
          message: e.to_string(),
        })
      }
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicUrlInfo {
  pub public_url: String,
  pub storage_key: String,
}

#[derive(Error, Debug)]
pub enum PublishError {
  #[error("method {0} not allowed")]
  MethodNotAllowed(Method),
  #[error("invalid {0} payload")]
  InvalidPayload(PayloadKind),
  #[error("storage upload failed: {0:#}")]
  StorageUploadFailed(anyhow::Error),
  #[error("public url resolution failed: {0:#}")]
  PublicUrlResolutionFailed(anyhow::Error),
  #[error("internal error processing {kind}: {message}")]
  InternalError { kind: PayloadKind, message: String },
}

impl PublishError {
  /// Stable label for metrics.
  pub fn as_str(&self) -> &'static str {
    match self {
      PublishError::MethodNotAllowed(_) => "method_not_allowed",
      PublishError::InvalidPayload(_) => "invalid_payload",
      PublishError::StorageUploadFailed(_) => "storage_upload_failed",
      PublishError::PublicUrlResolutionFailed(_) => "public_url_resolution_failed",
      PublishError::InternalError { .. } => "internal_error",
    }
  }
}

/// Validates a payload, stores it under a fresh key and resolves its public URL.
#[derive(Clone)]
pub struct UploadPublisher {
  storage: Arc<dyn Storage>,
  bucket: String,
  folder: String,
}

impl UploadPublisher {
  pub fn new(storage: Arc<dyn Storage>, bucket: &str, folder: &str) -> Self {
    Self {
      storage,
      bucket: bucket.to_owned(),
      folder: folder.to_owned(),
    }
  }

  pub fn storage_key(&self, kind: PayloadKind, convention: PathConvention) -> String {
    let id = Uuid::new_v4();

    match convention {
      PathConvention::FlatWithExtension => format!("{}.{}", id, kind.extension()),
      PathConvention::FolderPrefixed => format!("{}/{}.{}", self.folder, id, kind.extension()),
    }
  }

  pub async fn publish(
    &self,
    method: &Method,
    payload: Option<Payload>,
    endpoint: &Endpoint,
  ) -> Result<PublicUrlInfo, PublishError> {
    let res = self.try_publish(method, payload, endpoint).await;

    let outcome = match &res {
      Ok(_) => "ok",
      Err(e) => e.as_str(),
    };
    metrics::counter!("uploads_total", "kind" => endpoint.kind.as_str(), "outcome" => outcome)
      .increment(1);

    res
  }

  async fn try_publish(
    &self,
    method: &Method,
    payload: Option<Payload>,
    endpoint: &Endpoint,
  ) -> Result<PublicUrlInfo, PublishError> {
    if *method != Method::POST {
      return Err(PublishError::MethodNotAllowed(method.clone()));
    }

    let request = UploadRequest::from_payload(endpoint.kind, payload)?;
    debug!("received {} payload", request.kind());

    let data = request.to_bytes()?;

    let object = StoredObjectRef {
      bucket: self.bucket.clone(),
      path: self.storage_key(endpoint.kind, endpoint.path_convention),
      content_type: endpoint.kind.content_type().to_owned(),
      cache_control_seconds: CACHE_CONTROL_SECONDS,
    };
    debug!(
      "uploading {} bytes to {}/{}",
      data.len(),
      object.bucket,
      object.path
    );

    if let Err(e) = self.storage.upload_object(data, &object).await {
      error!("failed to upload {}: {:#}", object.path, e);
      return Err(PublishError::StorageUploadFailed(e));
    }
    info!("uploaded {}", object.path);

    let public_url = match self.storage.public_url(&object).await {
      Ok(url) => url,
      Err(e) => {
        error!(
          "failed to resolve public url for {}, object stays in bucket {}: {:#}",
          object.path, object.bucket, e
        );
        return Err(PublishError::PublicUrlResolutionFailed(e));
      }
    };
    debug!("public url for {}: {}", object.path, public_url);

    Ok(PublicUrlInfo {
      public_url,
      storage_key: object.path,
    })
  }
}
