use axum::{
  body::Bytes,
  extract::{FromRequest, Request, State},
  http::{header::CONTENT_TYPE, HeaderMap, Method},
  response::{IntoResponse, Response},
  Json,
};
use serde::Serialize;
use tracing::debug;
use utoipa::ToSchema;

use crate::http::error::ErrorBody;
use crate::http::AppState;
use crate::publisher::{Endpoint, Payload, PublicUrlInfo, ResponseShape};

pub const SAVED_MESSAGE: &str = "JSON saved to storage.";

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UrlFieldResponse {
  pub public_url: String,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FileInfoResponse {
  #[schema(value_type = String)]
  pub message: &'static str,
  pub file_url: String,
  pub file_name: String,
}

/// Store a base64 encoded PNG and return its public URL.
#[utoipa::path(
  post,
  path = "/api/webhook/image",
  request_body(content = String, content_type = "text/plain", description = "Base64 encoded image"),
  responses(
    (status = 200, description = "Image stored", body = UrlFieldResponse),
    (status = 400, description = "Body missing or not a string", body = ErrorBody),
    (status = 405, description = "Method other than POST", body = ErrorBody),
    (status = 500, description = "Storage failure", body = ErrorBody),
  )
)]
pub async fn image(State(state): State<AppState>, req: Request) -> Response {
  handle(&state, &Endpoint::IMAGE, req).await
}

/// Store a JSON document and return its URL together with the storage key.
#[utoipa::path(
  post,
  path = "/api/webhook/json",
  responses(
    (status = 200, description = "Document stored", body = FileInfoResponse),
    (status = 400, description = "Body missing or not a JSON object", body = ErrorBody),
    (status = 405, description = "Method other than POST", body = ErrorBody),
    (status = 500, description = "Storage failure", body = ErrorBody),
  )
)]
pub async fn json(State(state): State<AppState>, req: Request) -> Response {
  handle(&state, &Endpoint::JSON, req).await
}

/// Store a JSON document and return only its URL, as a JSON string.
#[utoipa::path(
  post,
  path = "/api/webhook/json/url",
  responses(
    (status = 200, description = "Document stored", body = String),
    (status = 400, description = "Body missing or not a JSON object", body = ErrorBody),
    (status = 405, description = "Method other than POST", body = ErrorBody),
    (status = 500, description = "Storage failure", body = ErrorBody),
  )
)]
pub async fn json_url(State(state): State<AppState>, req: Request) -> Response {
  handle(&state, &Endpoint::JSON_URL, req).await
}

/// The body is only read once the method is known to be POST, so a wrong
/// method is answered with 405 whatever the body looks like.
async fn handle(state: &AppState, endpoint: &Endpoint, req: Request) -> Response {
  let method = req.method().clone();

  let payload = if method == Method::POST {
    let headers = req.headers().clone();
    match Bytes::from_request(req, state).await {
      Ok(body) => read_payload(&headers, &body),
      Err(rejection) => return rejection.into_response(),
    }
  } else {
    None
  };

  match state.publisher.publish(&method, payload, endpoint).await {
    Ok(info) => render(endpoint.shape, info),
    Err(e) => e.into_response(),
  }
}

fn render(shape: ResponseShape, info: PublicUrlInfo) -> Response {
  match shape {
    ResponseShape::PlainUrl => Json(info.public_url).into_response(),
    ResponseShape::UrlField => Json(UrlFieldResponse {
      public_url: info.public_url,
    })
    .into_response(),
    ResponseShape::MessageAndFileInfo => Json(FileInfoResponse {
      message: SAVED_MESSAGE,
      file_url: info.public_url,
      file_name: info.storage_key,
    })
    .into_response(),
  }
}

/// JSON bodies are parsed when the content type says so, anything else is
/// taken as text. An empty, malformed or non UTF-8 body counts as absent.
pub fn read_payload(headers: &HeaderMap, body: &[u8]) -> Option<Payload> {
  if body.is_empty() {
    return None;
  }

  if is_json(headers) {
    match serde_json::from_slice(body) {
      Ok(value) => Some(Payload::Json(value)),
      Err(e) => {
        debug!("malformed JSON body: {}", e);
        None
      }
    }
  } else {
    match std::str::from_utf8(body) {
      Ok(text) => Some(Payload::Text(text.to_owned())),
      Err(e) => {
        debug!("body is not UTF-8: {}", e);
        None
      }
    }
  }
}

fn is_json(headers: &HeaderMap) -> bool {
  headers
    .get(CONTENT_TYPE)
    .and_then(|v| v.to_str().ok())
    .and_then(|v| v.split(';').next())
    .map(|mime| {
      let mime = mime.trim();
      mime.eq_ignore_ascii_case("application/json") || mime.ends_with("+json")
    })
    .unwrap_or(false)
}

#[cfg(test)]
mod tests {
  use super::*;
  use axum::http::HeaderValue;
  use serde_json::json;

  fn headers(content_type: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_str(content_type).unwrap());
    headers
  }

  #[test]
  fn json_content_type_is_parsed() {
    let payload = read_payload(&headers("application/json; charset=utf-8"), br#"{"a":1}"#);

    assert_eq!(payload, Some(Payload::Json(json!({"a": 1}))));
  }

  #[test]
  fn vendor_json_content_type_is_parsed() {
    let payload = read_payload(&headers("application/vnd.api+json"), b"[1]");

    assert_eq!(payload, Some(Payload::Json(json!([1]))));
  }

  #[test]
  fn other_content_types_are_text() {
    let payload = read_payload(&headers("text/plain"), b"aGVsbG8=");

    assert_eq!(payload, Some(Payload::Text("aGVsbG8=".to_owned())));
    assert_eq!(
      read_payload(&HeaderMap::new(), b"{}"),
      Some(Payload::Text("{}".to_owned()))
    );
  }

  #[test]
  fn empty_and_malformed_bodies_are_absent() {
    assert_eq!(read_payload(&headers("application/json"), b""), None);
    assert_eq!(read_payload(&headers("application/json"), b"{\"a\":"), None);
    assert_eq!(read_payload(&headers("text/plain"), &[0xff, 0xfe]), None);
  }
}
