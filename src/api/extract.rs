//! Request helpers shared by the handlers

use std::net::SocketAddr;

use axum::{
    async_trait,
    extract::{ConnectInfo, FromRequestParts, multipart::Field},
    http::request::Parts,
};
use prometheus::HistogramTimer;

use crate::error::AppError;
use crate::metrics::{HTTP_REQUEST_DURATION_SECONDS, HTTP_REQUESTS_TOTAL};
use crate::service::MediaUpload;
use crate::storage::MAX_VIDEO_BYTES;

/// Client address for audit lines
///
/// First `X-Forwarded-For` hop, else the socket peer, else `"unknown"`.
#[derive(Debug, Clone)]
pub struct ClientIp(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let forwarded = parts
            .headers
            .get("x-forwarded-for")
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(',').next())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(ToOwned::to_owned);

        let ip = forwarded
            .or_else(|| {
                parts
                    .extensions
                    .get::<ConnectInfo<SocketAddr>>()
                    .map(|ConnectInfo(addr)| addr.ip().to_string())
            })
            .unwrap_or_else(|| "unknown".to_string());

        Ok(ClientIp(ip))
    }
}

/// Duration timer plus success counter for one endpoint
///
/// Failures are counted by `AppError::into_response`.
pub struct RequestMetrics {
    method: &'static str,
    endpoint: &'static str,
    _timer: HistogramTimer,
}

impl RequestMetrics {
    pub fn start(method: &'static str, endpoint: &'static str) -> Self {
        Self {
            method,
            endpoint,
            _timer: HTTP_REQUEST_DURATION_SECONDS
                .with_label_values(&[method, endpoint])
                .start_timer(),
        }
    }

    /// Count a successful response and pass the value through
    pub fn ok<T>(self, value: T) -> T {
        HTTP_REQUESTS_TOTAL
            .with_label_values(&[self.method, self.endpoint, "200"])
            .inc();
        value
    }
}

/// Read a file field into memory, refusing anything above the video limit
pub async fn read_upload(mut field: Field<'_>) -> Result<MediaUpload, AppError> {
    let content_type = field
        .content_type()
        .map(ToOwned::to_owned)
        .ok_or_else(|| AppError::Validation("Missing content type for uploaded file".to_string()))?;

    let mut data = Vec::new();
    while let Some(chunk) = field
        .chunk()
        .await
        .map_err(|e| AppError::Validation(format!("Failed to read upload: {}", e)))?
    {
        if data.len() + chunk.len() > MAX_VIDEO_BYTES {
            return Err(AppError::PayloadTooLarge(format!(
                "Uploads are limited to {} MiB",
                MAX_VIDEO_BYTES / (1024 * 1024)
            )));
        }
        data.extend_from_slice(&chunk);
    }

    Ok(MediaUpload { content_type, data })
}

/// Read a text field; blank values become `None`
pub async fn read_text(field: Field<'_>) -> Result<Option<String>, AppError> {
    let text = field
        .text()
        .await
        .map_err(|e| AppError::Validation(format!("Failed to read form field: {}", e)))?;
    let text = text.trim();
    Ok((!text.is_empty()).then(|| text.to_string()))
}
