//! Face-analysis results and the two capability traits that produce them.

use std::future::Future;

use serde::Serialize;

use crate::encoded::EncodedImage;
use crate::error::FaceError;

/// Face location as fractions of the image dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BoundingBox {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectedFace {
    /// Detection confidence in [0, 100].
    pub confidence: f32,
    pub bounding_box: Option<BoundingBox>,
}

/// Faces found in one frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DetectionResult {
    pub faces: Vec<DetectedFace>,
}

impl DetectionResult {
    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    /// Classify the frame against the single-face confidence gate.
    ///
    /// Qualifies only with exactly one face whose confidence is strictly
    /// above `threshold`.
    pub fn qualify(&self, threshold: f32) -> Qualification {
        match self.faces.as_slice() {
            [] => Qualification::NoFace,
            [face] if face.confidence > threshold => Qualification::Qualified {
                confidence: face.confidence,
            },
            [face] => Qualification::LowConfidence {
                confidence: face.confidence,
            },
            faces => Qualification::MultipleFaces { count: faces.len() },
        }
    }
}

/// Outcome of the single-face confidence gate for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Qualification {
    Qualified { confidence: f32 },
    NoFace,
    MultipleFaces { count: usize },
    LowConfidence { confidence: f32 },
}

impl Qualification {
    pub fn is_qualified(&self) -> bool {
        matches!(self, Self::Qualified { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FaceMatch {
    pub similarity: f32,
    pub face_confidence: f32,
    pub bounding_box: Option<BoundingBox>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnmatchedFace {
    pub face_confidence: f32,
    pub bounding_box: Option<BoundingBox>,
}

/// Result of comparing a source face against a target image.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ComparisonResult {
    /// In the order the service returned them.
    pub matches: Vec<FaceMatch>,
    pub unmatched: Vec<UnmatchedFace>,
}

impl ComparisonResult {
    /// Similarity of the first match. No re-ranking is applied.
    pub fn top_similarity(&self) -> Option<f32> {
        self.matches.first().map(|m| m.similarity)
    }
}

/// External face-detection capability.
pub trait FaceAnalyzer: Send + Sync {
    fn detect_faces(
        &self,
        image: &EncodedImage,
    ) -> impl Future<Output = Result<DetectionResult, FaceError>> + Send;
}

/// External face-matching capability.
pub trait FaceComparer: Send + Sync {
    /// Compare the face in `source` against faces in `target`. Matches below
    /// `similarity_threshold` are reported as unmatched.
    fn compare_faces(
        &self,
        source: &EncodedImage,
        target: &EncodedImage,
        similarity_threshold: f32,
    ) -> impl Future<Output = Result<ComparisonResult, FaceError>> + Send;
}
