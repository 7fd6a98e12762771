use thiserror::Error;

/// A payload was rejected locally, before any capability call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("image payload is empty")]
    Empty,
    #[error("image payload too small: {len} bytes (minimum {min})")]
    TooSmall { len: usize, min: usize },
    #[error("unsupported image encoding (expected JPEG or PNG)")]
    UnsupportedEncoding,
    #[error("image payload is not decodable: {0}")]
    Undecodable(String),
}

/// The frame source could not deliver a frame.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    #[error("camera access denied: {0}")]
    PermissionDenied(String),
    #[error("camera busy")]
    Busy,
    #[error("camera unavailable: {0}")]
    Unavailable(String),
}

/// The external face-analysis capability failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    #[error("face service unreachable: {0}")]
    Unreachable(String),
    #[error("face service misconfigured: {0}")]
    Misconfigured(String),
    #[error("face service returned status {status}: {message}")]
    Status { status: u16, message: String },
    #[error("malformed face service response: {0}")]
    MalformedResponse(String),
}

/// Umbrella error returned by capability calls.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FaceError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Device(#[from] DeviceError),
    #[error(transparent)]
    Service(#[from] ServiceError),
}
