use crate::models::predict_types::{ImageReference, PredictResponse};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use std::time::Duration;

pub const API_URL_ENV: &str = "LEAFLENSE_API_URL";
const DEFAULT_API_URL: &str = "http://localhost:8000/predict";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Endpoint the client should target: environment override first,
/// compiled-in default otherwise.
pub fn endpoint_from_env() -> String {
    std::env::var(API_URL_ENV).unwrap_or_else(|_| DEFAULT_API_URL.to_string())
}

#[derive(Debug, thiserror::Error)]
pub enum PredictError {
    #[error("failed to read image {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("server returned {0}")]
    Status(reqwest::StatusCode),
    #[error("response body is not a prediction")]
    Malformed,
}

/// HTTP client for the remote classifier. All request configuration
/// (headers, timeout, endpoint normalization) happens at construction,
/// so a `TransportClient` value fully describes where and how uploads go.
#[derive(Debug, Clone)]
pub struct TransportClient {
    client: reqwest::Client,
    endpoint: String,
}

impl TransportClient {
    pub fn new(base_url: &str) -> Result<Self, PredictError> {
        Self::with_timeout(base_url, REQUEST_TIMEOUT)
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self, PredictError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            endpoint: normalize_endpoint(base_url),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Upload one image as a multipart POST and parse the classifier
    /// response. The body carries exactly one part named `file`; its
    /// content type comes from the image reference (reqwest sets the
    /// surrounding multipart boundary header itself).
    pub async fn predict(&self, image: &ImageReference) -> Result<PredictResponse, PredictError> {
        let bytes = tokio::fs::read(&image.path)
            .await
            .map_err(|e| PredictError::Io {
                path: image.path.display().to_string(),
                source: e,
            })?;

        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(image.file_name_or_default().to_string())
            .mime_str(image.mime_type_or_default())?;
        let form = reqwest::multipart::Form::new().part("file", part);

        let response = self
            .client
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(PredictError::Status(status));
        }

        response
            .json::<PredictResponse>()
            .await
            .map_err(|_| PredictError::Malformed)
    }
}

/// Strip exactly one trailing slash, if present.
fn normalize_endpoint(base_url: &str) -> String {
    base_url.strip_suffix('/').unwrap_or(base_url).to_string()
}
