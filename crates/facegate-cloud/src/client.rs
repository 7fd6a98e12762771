use std::time::Duration;

use facegate_core::{
    ComparisonResult, DetectionResult, EncodedImage, FaceAnalyzer, FaceComparer, FaceError,
    ServiceError,
};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::wire::{
    CompareRequest, CompareResponse, DetectRequest, DetectResponse, ErrorBody, ImagePayload,
};

/// Connection settings for the face service.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Base URL; `/detect-faces` and `/compare-faces` are appended.
    pub endpoint: String,
    /// Sent as a bearer token when set.
    pub api_key: Option<String>,
    pub timeout: Duration,
}

impl ServiceConfig {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: None,
            timeout: Self::DEFAULT_TIMEOUT,
        }
    }
}

/// HTTP client implementing both face capabilities against one endpoint.
#[derive(Debug, Clone)]
pub struct FaceServiceClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

/// A decoded response, or the raw failure for the caller to classify.
enum Reply<T> {
    Ok(T),
    Rejected { status: StatusCode, body: Vec<u8> },
}

impl FaceServiceClient {
    pub fn new(config: ServiceConfig) -> Result<Self, ServiceError> {
        let endpoint = config.endpoint.trim().trim_end_matches('/').to_string();
        if endpoint.is_empty() {
            return Err(ServiceError::Misconfigured("endpoint is empty".into()));
        }
        if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
            return Err(ServiceError::Misconfigured(format!(
                "endpoint must be an http(s) URL: {endpoint}"
            )));
        }
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ServiceError::Misconfigured(e.to_string()))?;

        Ok(Self {
            http,
            endpoint,
            api_key: config.api_key.filter(|k| !k.is_empty()),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Validate raw bytes and run one detection.
    pub async fn detect_bytes(&self, bytes: Vec<u8>) -> Result<DetectionResult, FaceError> {
        let image = EncodedImage::parse(bytes)?;
        self.detect_faces(&image).await
    }

    /// Validate both payloads and run one comparison.
    pub async fn compare_bytes(
        &self,
        source: Vec<u8>,
        target: Vec<u8>,
        similarity_threshold: f32,
    ) -> Result<ComparisonResult, FaceError> {
        let source = EncodedImage::parse(source)?;
        let target = EncodedImage::parse(target)?;
        self.compare_faces(&source, &target, similarity_threshold)
            .await
    }

    async fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<Reply<T>, ServiceError> {
        let url = format!("{}/{path}", self.endpoint);
        let mut request = self.http.post(&url).json(body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(transport_error)?;
        let status = response.status();
        let bytes = response.bytes().await.map_err(transport_error)?;
        tracing::debug!(%url, status = status.as_u16(), bytes = bytes.len(), "face service replied");

        if !status.is_success() {
            return Ok(Reply::Rejected {
                status,
                body: bytes.to_vec(),
            });
        }
        serde_json::from_slice(&bytes)
            .map(Reply::Ok)
            .map_err(|e| ServiceError::MalformedResponse(format!("{path}: {e}")))
    }
}

fn transport_error(e: reqwest::Error) -> ServiceError {
    if e.is_timeout() {
        ServiceError::Unreachable(format!("timed out: {e}"))
    } else if e.is_decode() {
        ServiceError::MalformedResponse(e.to_string())
    } else {
        ServiceError::Unreachable(e.to_string())
    }
}

fn rejection(status: StatusCode, body: &[u8]) -> ServiceError {
    let message = ErrorBody::message(body).unwrap_or_else(|| {
        status
            .canonical_reason()
            .unwrap_or("unknown status")
            .to_string()
    });
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ServiceError::Misconfigured(message),
        _ => ServiceError::Status {
            status: status.as_u16(),
            message,
        },
    }
}

impl FaceAnalyzer for FaceServiceClient {
    async fn detect_faces(&self, image: &EncodedImage) -> Result<DetectionResult, FaceError> {
        match self
            .post::<_, DetectResponse>("detect-faces", &DetectRequest::new(image))
            .await?
        {
            Reply::Ok(resp) => Ok(resp.into()),
            Reply::Rejected { status, body } => Err(rejection(status, &body).into()),
        }
    }
}

impl FaceComparer for FaceServiceClient {
    async fn compare_faces(
        &self,
        source: &EncodedImage,
        target: &EncodedImage,
        similarity_threshold: f32,
    ) -> Result<ComparisonResult, FaceError> {
        let request = CompareRequest {
            source_image: ImagePayload::encode(source),
            target_image: ImagePayload::encode(target),
            similarity_threshold,
        };
        match self
            .post::<_, CompareResponse>("compare-faces", &request)
            .await?
        {
            Reply::Ok(resp) => Ok(resp.into()),
            Reply::Rejected { status, body } => {
                // Some gateways report "no match" as a client error with a normal body
                if status.is_client_error() {
                    if let Ok(resp) = serde_json::from_slice::<CompareResponse>(&body) {
                        if resp.is_empty_match() {
                            tracing::debug!(status = status.as_u16(), "no-match reply with error status");
                            return Ok(resp.into());
                        }
                    }
                }
                Err(rejection(status, &body).into())
            }
        }
    }
}
