//! Encoded-image validation.
//!
//! Every payload handed to a face capability goes through [`EncodedImage::parse`]
//! first. Only two encodings are accepted, identified by their magic bytes, and
//! the header must decode cleanly. Anything else is rejected locally with a
//! [`ValidationError`] and never reaches the network.

use std::fmt;
use std::io::Cursor;
use std::sync::Arc;

use sha2::{Digest, Sha256};

use crate::error::ValidationError;

/// Smallest payload worth decoding. Real frames are kilobytes; anything this
/// small is a truncated write or a placeholder.
pub const MIN_IMAGE_BYTES: usize = 32;

const JPEG_MAGIC: [u8; 2] = [0xFF, 0xD8];
const PNG_MAGIC: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

/// The two accepted encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Jpeg,
    Png,
}

impl ImageFormat {
    /// Identify the encoding from the leading bytes, if it is one we accept.
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(&PNG_MAGIC) {
            Some(Self::Png)
        } else if bytes.starts_with(&JPEG_MAGIC) {
            Some(Self::Jpeg)
        } else {
            None
        }
    }

    fn codec(self) -> image::ImageFormat {
        match self {
            Self::Jpeg => image::ImageFormat::Jpeg,
            Self::Png => image::ImageFormat::Png,
        }
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Jpeg => f.write_str("jpeg"),
            Self::Png => f.write_str("png"),
        }
    }
}

/// A validated, encoded image. Cheap to clone.
#[derive(Clone)]
pub struct EncodedImage {
    bytes: Arc<[u8]>,
    format: ImageFormat,
    width: u32,
    height: u32,
}

impl EncodedImage {
    /// Validate `bytes` and wrap them.
    ///
    /// Checks, in order: non-empty, at least [`MIN_IMAGE_BYTES`], a JPEG or PNG
    /// signature, and a header that decodes to non-zero dimensions.
    pub fn parse(bytes: impl Into<Vec<u8>>) -> Result<Self, ValidationError> {
        let bytes: Vec<u8> = bytes.into();
        if bytes.is_empty() {
            return Err(ValidationError::Empty);
        }
        if bytes.len() < MIN_IMAGE_BYTES {
            return Err(ValidationError::TooSmall {
                len: bytes.len(),
                min: MIN_IMAGE_BYTES,
            });
        }
        let format = ImageFormat::sniff(&bytes).ok_or(ValidationError::UnsupportedEncoding)?;

        let (width, height) =
            image::ImageReader::with_format(Cursor::new(bytes.as_slice()), format.codec())
                .into_dimensions()
                .map_err(|e| ValidationError::Undecodable(e.to_string()))?;
        if width == 0 || height == 0 {
            return Err(ValidationError::Undecodable(format!(
                "zero-sized image {width}x{height}"
            )));
        }

        Ok(Self {
            bytes: bytes.into(),
            format,
            width,
            height,
        })
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn format(&self) -> ImageFormat {
        self.format
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// SHA-256 hex digest of the encoded bytes, used to identify an image in
    /// logs without logging its content.
    pub fn fingerprint(&self) -> String {
        format!("{:x}", Sha256::digest(&self.bytes))
    }
}

impl fmt::Debug for EncodedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncodedImage")
            .field("format", &self.format)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("len", &self.bytes.len())
            .finish()
    }
}
