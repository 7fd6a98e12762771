//! Provider JSON shapes and their conversion into core results.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use facegate_core::{
    BoundingBox, ComparisonResult, DetectedFace, DetectionResult, EncodedImage, FaceMatch,
    UnmatchedFace,
};
use serde::{Deserialize, Serialize};

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct ImagePayload {
    bytes: String,
}

impl ImagePayload {
    pub(crate) fn encode(image: &EncodedImage) -> Self {
        Self {
            bytes: STANDARD.encode(image.bytes()),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct DetectRequest {
    pub image: ImagePayload,
    pub attributes: [&'static str; 1],
}

impl DetectRequest {
    pub(crate) fn new(image: &EncodedImage) -> Self {
        Self {
            image: ImagePayload::encode(image),
            attributes: ["ALL"],
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct CompareRequest {
    pub source_image: ImagePayload,
    pub target_image: ImagePayload,
    pub similarity_threshold: f32,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct WireBox {
    left: f32,
    top: f32,
    width: f32,
    height: f32,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct WireFace {
    confidence: f32,
    #[serde(default)]
    bounding_box: Option<WireBox>,
}

/// Face reported by the compare call. Gateways may drop `Confidence`.
#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ComparedFace {
    #[serde(default)]
    confidence: Option<f32>,
    #[serde(default)]
    bounding_box: Option<WireBox>,
}

impl ComparedFace {
    fn confidence(&self) -> f32 {
        self.confidence.map(percent).unwrap_or(0.0)
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct WireMatch {
    similarity: f32,
    face: ComparedFace,
}

/// Unmatched entry, either bare (provider) or wrapped in `Face` (gateway).
#[derive(Deserialize)]
#[serde(untagged)]
enum WireUnmatched {
    Wrapped {
        #[serde(rename = "Face")]
        face: ComparedFace,
    },
    Bare(ComparedFace),
}

impl WireUnmatched {
    fn into_face(self) -> ComparedFace {
        match self {
            Self::Wrapped { face } | Self::Bare(face) => face,
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct DetectResponse {
    face_details: Vec<WireFace>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct CompareResponse {
    face_matches: Vec<WireMatch>,
    #[serde(default)]
    unmatched_faces: Vec<WireUnmatched>,
}

/// Error body of a failed call. Gateways disagree on the casing.
#[derive(Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(alias = "Message")]
    message: Option<String>,
}

impl ErrorBody {
    pub(crate) fn message(body: &[u8]) -> Option<String> {
        serde_json::from_slice::<ErrorBody>(body)
            .ok()
            .and_then(|b| b.message)
            .filter(|m| !m.trim().is_empty())
    }
}

fn percent(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 100.0)
    }
}

impl From<WireBox> for BoundingBox {
    fn from(b: WireBox) -> Self {
        BoundingBox {
            left: b.left,
            top: b.top,
            width: b.width,
            height: b.height,
        }
    }
}

impl From<DetectResponse> for DetectionResult {
    fn from(resp: DetectResponse) -> Self {
        DetectionResult {
            faces: resp
                .face_details
                .into_iter()
                .map(|f| DetectedFace {
                    confidence: percent(f.confidence),
                    bounding_box: f.bounding_box.map(Into::into),
                })
                .collect(),
        }
    }
}

impl CompareResponse {
    pub(crate) fn is_empty_match(&self) -> bool {
        self.face_matches.is_empty()
    }
}

impl From<CompareResponse> for ComparisonResult {
    fn from(resp: CompareResponse) -> Self {
        ComparisonResult {
            matches: resp
                .face_matches
                .into_iter()
                .map(|m| FaceMatch {
                    similarity: percent(m.similarity),
                    face_confidence: m.face.confidence(),
                    bounding_box: m.face.bounding_box.map(Into::into),
                })
                .collect(),
            unmatched: resp
                .unmatched_faces
                .into_iter()
                .map(WireUnmatched::into_face)
                .map(|f| UnmatchedFace {
                    face_confidence: f.confidence(),
                    bounding_box: f.bounding_box.map(Into::into),
                })
                .collect(),
        }
    }
}
