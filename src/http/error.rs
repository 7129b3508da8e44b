use std::any::Any;

use axum::{
  http::StatusCode,
  response::{IntoResponse, Response},
  Json,
};
use serde::Serialize;
use tracing::error;
use utoipa::ToSchema;

use crate::publisher::{PayloadKind, PublishError};

#[derive(Serialize, ToSchema)]
pub struct ErrorBody {
  #[schema(value_type = String)]
  pub error: &'static str,
}

impl PublishError {
  pub fn status(&self) -> StatusCode {
    match self {
      PublishError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
      PublishError::InvalidPayload(_) => StatusCode::BAD_REQUEST,
      PublishError::StorageUploadFailed(_)
      | PublishError::PublicUrlResolutionFailed(_)
      | PublishError::InternalError { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }

  /// Caller-facing message. Backend detail never leaves the process.
  pub fn public_message(&self) -> &'static str {
    match self {
      PublishError::MethodNotAllowed(_) => "Method not allowed. Use POST.",
      PublishError::InvalidPayload(PayloadKind::Base64Image) => {
        "Invalid payload. Send a valid base64 string."
      }
      PublishError::InvalidPayload(PayloadKind::JsonDocument) => {
        "Invalid payload. Send a valid JSON document."
      }
      PublishError::StorageUploadFailed(_) => "Failed to upload file to storage.",
      PublishError::PublicUrlResolutionFailed(_) => "Failed to generate the public URL for the file.",
      PublishError::InternalError {
        kind: PayloadKind::Base64Image,
        ..
      } => "Internal error while processing the image.",
      PublishError::InternalError {
        kind: PayloadKind::JsonDocument,
        ..
      } => "Internal error while processing the JSON.",
    }
  }
}

impl IntoResponse for PublishError {
  fn into_response(self) -> Response {
    (
      self.status(),
      Json(ErrorBody {
        error: self.public_message(),
      }),
    )
      .into_response()
  }
}

/// Turns a handler panic into the same JSON shape as any other internal error.
pub fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response {
  let detail = if let Some(s) = err.downcast_ref::<String>() {
    s.as_str()
  } else if let Some(s) = err.downcast_ref::<&str>() {
    s
  } else {
    "unknown panic"
  };
  error!("handler panicked: {}", detail);

  (
    StatusCode::INTERNAL_SERVER_ERROR,
    Json(ErrorBody {
      error: "Internal error while processing the request.",
    }),
  )
    .into_response()
}

#[cfg(test)]
mod tests {
  use super::*;
  use anyhow::anyhow;
  use axum::http::Method;
  use http_body_util::BodyExt;

  async fn body_of(err: PublishError) -> (StatusCode, serde_json::Value) {
    let res = err.into_response();
    let status = res.status();
    let bytes = res.into_body().collect().await.unwrap().to_bytes();

    (status, serde_json::from_slice(&bytes).unwrap())
  }

  #[tokio::test]
  async fn backend_detail_is_not_exposed() {
    let (status, body) =
      body_of(PublishError::StorageUploadFailed(anyhow!("token sk_live_123 rejected"))).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, serde_json::json!({"error": "Failed to upload file to storage."}));
  }

  #[tokio::test]
  async fn maps_status_codes() {
    let (status, _) = body_of(PublishError::MethodNotAllowed(Method::GET)).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);

    let (status, body) = body_of(PublishError::InvalidPayload(PayloadKind::Base64Image)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid payload. Send a valid base64 string.");

    let (status, body) = body_of(PublishError::PublicUrlResolutionFailed(anyhow!("x"))).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Failed to generate the public URL for the file.");
  }

  #[tokio::test]
  async fn panics_become_internal_errors() {
    let res = panic_response(Box::new("boom"));

    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let bytes = res.into_body().collect().await.unwrap().to_bytes();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(
      body,
      serde_json::json!({"error": "Internal error while processing the request."})
    );
  }
}
