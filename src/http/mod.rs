use anyhow::{anyhow, Context};
use axum::{
  extract::{DefaultBodyLimit, MatchedPath, Request},
  middleware::{self, Next},
  response::IntoResponse,
  routing::{any, get},
  Router,
};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::future::ready;
use std::{path::Path, sync::Arc};
use tokio::signal;
use tokio::time::{Duration, Instant};
use tower_http::{
  catch_panic::CatchPanicLayer,
  timeout::TimeoutLayer,
  trace::{self, TraceLayer},
};
use tracing::{info, Level};
use utoipa::OpenApi;
use utoipa_redoc::{Redoc, Servable};

use crate::config::{Config, StorageType};
use crate::publisher::UploadPublisher;
use anyhow::Result;

pub mod error;
pub mod local_storage;
pub mod s3;
pub mod storage;
pub mod supabase;
pub mod webhook;

pub const IMAGE_ROUTE: &str = "/api/webhook/image";
pub const JSON_ROUTE: &str = "/api/webhook/json";
pub const JSON_URL_ROUTE: &str = "/api/webhook/json/url";

#[derive(OpenApi)]
#[openapi(
  paths(webhook::image, webhook::json, webhook::json_url),
  components(schemas(
    webhook::UrlFieldResponse,
    webhook::FileInfoResponse,
    error::ErrorBody
  )),
  info(
    title = "Bucket Hook API",
    version = "0.1.0",
    description = "Webhooks that store base64 images and JSON documents in object storage"
  )
)]
struct ApiDoc;

#[derive(Clone)]
pub struct AppState {
  publisher: UploadPublisher,
}

/// Builds the storage client selected in the config.
pub fn storage_from_config(cfg: &Config) -> Result<Arc<dyn storage::Storage>> {
  let storage_client: Arc<dyn storage::Storage> = match cfg.storage.storage_type {
    StorageType::Supabase => {
      let supabase_config = cfg
        .storage
        .supabase
        .as_ref()
        .ok_or_else(|| anyhow!("Supabase storage config is missing"))?;

      let http = reqwest::Client::builder()
        .user_agent(concat!("bucket-hook/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("failed to build http client")?;

      Arc::new(supabase::Client::new(
        http,
        &supabase_config.url,
        &supabase_config.key,
      )?)
    }
    StorageType::S3 => {
      let storage_config = cfg
        .storage
        .s3
        .as_ref()
        .ok_or_else(|| anyhow!("S3 storage config is missing"))?;

      let client = s3::sdk_client(storage_config);
      Arc::new(s3::Client::new(client, &storage_config.base_url)?)
    }
    StorageType::Local => {
      let local_config = cfg
        .storage
        .local
        .as_ref()
        .ok_or_else(|| anyhow!("local storage config is missing"))?;

      Arc::new(local_storage::Client::new(
        Path::new(&local_config.path).to_path_buf(),
        &local_config.base_url,
      )?)
    }
  };

  Ok(storage_client)
}

pub fn bootstrap(cfg: &Config) -> Result<Router> {
  let storage_client = storage_from_config(cfg)?;

  Ok(router(cfg, storage_client))
}

/// Routes every webhook to the shared publisher. Each route accepts any method
/// so that the publisher answers non-POST requests with its own 405 body.
pub fn router(cfg: &Config, storage_client: Arc<dyn storage::Storage>) -> Router {
  let state = AppState {
    publisher: UploadPublisher::new(storage_client, &cfg.storage.bucket, &cfg.storage.folder),
  };

  let mut app = Router::new()
    .route(IMAGE_ROUTE, any(webhook::image))
    .route(JSON_ROUTE, any(webhook::json))
    .route(JSON_URL_ROUTE, any(webhook::json_url))
    .layer(DefaultBodyLimit::max(
      cfg.app.max_body_size_mb * 1000 * 1000,
    ))
    .with_state(state);

  // Conditionally add OpenAPI routes if enabled
  if cfg.app.enable_openapi.unwrap_or(false) {
    app = app
      .merge(Redoc::with_url("/redoc", ApiDoc::openapi()))
      .route(
        "/api-docs/openapi.json",
        get(|| async { axum::Json(ApiDoc::openapi()) }),
      );
  }

  app.layer((
    middleware::from_fn(track_metrics),
    TraceLayer::new_for_http()
      .make_span_with(trace::DefaultMakeSpan::new().level(Level::INFO))
      .on_response(trace::DefaultOnResponse::new().level(Level::INFO)),
    TimeoutLayer::new(Duration::from_secs(60)),
    CatchPanicLayer::custom(error::panic_response),
  ))
}

pub async fn serve(router: Router, listen: &str) -> Result<()> {
  let listener = tokio::net::TcpListener::bind(listen)
    .await
    .with_context(|| format!("failed to bind to address: {}", listen))?;
  info!("listening on {}", listen);

  axum::serve(listener, router)
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("error running HTTP server")
}

async fn healthz() -> &'static str {
  "pong"
}

async fn shutdown_signal() {
  let ctrl_c = async {
    if let Err(e) = signal::ctrl_c().await {
      tracing::error!("failed to install Ctrl+C handler: {}", e);
      std::future::pending::<()>().await;
    }
  };

  #[cfg(unix)]
  let terminate = async {
    match signal::unix::signal(signal::unix::SignalKind::terminate()) {
      Ok(mut sig) => {
        sig.recv().await;
      }
      Err(e) => {
        tracing::error!("failed to install signal handler: {}", e);
        std::future::pending::<()>().await;
      }
    }
  };

  #[cfg(not(unix))]
  let terminate = std::future::pending::<()>();

  tokio::select! {
      _ = ctrl_c => {},
      _ = terminate => {},
  }
}

pub async fn serve_metrics(listen: &str) -> Result<()> {
  let app = metrics_app()?;

  let listener = tokio::net::TcpListener::bind(listen)
    .await
    .with_context(|| format!("failed to bind to address: {}", listen))?;
  info!("metrics listening on {}", listen);

  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("error running metrics HTTP server")
}

fn metrics_app() -> Result<Router> {
  let recorder_handle = setup_metrics_recorder()?;

  Ok(
    Router::new()
      .route("/metrics", get(move || ready(recorder_handle.render())))
      .route("/healthz", get(healthz)),
  )
}

fn setup_metrics_recorder() -> Result<PrometheusHandle> {
  const EXPONENTIAL_SECONDS: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
  ];

  let handle = PrometheusBuilder::new()
    .set_buckets_for_metric(
      Matcher::Full("http_requests_duration_seconds".to_string()),
      EXPONENTIAL_SECONDS,
    )
    .context("invalid histogram buckets")?
    .install_recorder()
    .context("failed to install metrics recorder")?;

  Ok(handle)
}

async fn track_metrics(req: Request, next: Next) -> impl IntoResponse {
  let start = Instant::now();
  let path = if let Some(matched_path) = req.extensions().get::<MatchedPath>() {
    matched_path.as_str().to_owned()
  } else {
    req.uri().path().to_owned()
  };
  let method = req.method().clone();

  let response = next.run(req).await;

  let latency = start.elapsed().as_secs_f64();
  let status = response.status().as_u16().to_string();

  let labels = [
    ("method", method.to_string()),
    ("path", path),
    ("status", status),
  ];

  metrics::counter!("http_requests_total", &labels).increment(1);
  metrics::histogram!("http_requests_duration_seconds", &labels).record(latency);

  response
}
