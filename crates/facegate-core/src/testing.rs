//! Scripted capability doubles for deterministic session tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::analysis::{
    ComparisonResult, DetectedFace, DetectionResult, FaceAnalyzer, FaceComparer, FaceMatch,
    UnmatchedFace,
};
use crate::encoded::tests::png_bytes;
use crate::encoded::EncodedImage;
use crate::error::{DeviceError, FaceError};
use crate::frame::{Frame, FrameSource};

pub fn faces(confidences: &[f32]) -> DetectionResult {
    DetectionResult {
        faces: confidences
            .iter()
            .map(|&confidence| DetectedFace {
                confidence,
                bounding_box: None,
            })
            .collect(),
    }
}

pub fn matched(similarity: f32) -> ComparisonResult {
    ComparisonResult {
        matches: vec![FaceMatch {
            similarity,
            face_confidence: 99.5,
            bounding_box: None,
        }],
        unmatched: Vec::new(),
    }
}

pub fn unmatched() -> ComparisonResult {
    ComparisonResult {
        matches: Vec::new(),
        unmatched: vec![UnmatchedFace {
            face_confidence: 99.1,
            bounding_box: None,
        }],
    }
}

pub fn reference() -> EncodedImage {
    EncodedImage::parse(png_bytes()).unwrap()
}

/// Frame source replaying a script of captures, then a fixed fallback frame.
pub struct ScriptedSource {
    access: Result<(), DeviceError>,
    ready: Result<(), DeviceError>,
    script: Mutex<VecDeque<Result<Vec<u8>, DeviceError>>>,
    fallback: Vec<u8>,
    captures: AtomicUsize,
}

impl ScriptedSource {
    pub fn new(script: Vec<Result<Vec<u8>, DeviceError>>) -> Self {
        Self {
            access: Ok(()),
            ready: Ok(()),
            script: Mutex::new(script.into()),
            fallback: png_bytes(),
            captures: AtomicUsize::new(0),
        }
    }

    pub fn always(frame: Vec<u8>) -> Self {
        Self {
            fallback: frame,
            ..Self::new(Vec::new())
        }
    }

    pub fn deny_access(mut self, err: DeviceError) -> Self {
        self.access = Err(err);
        self
    }

    pub fn fail_ready(mut self, err: DeviceError) -> Self {
        self.ready = Err(err);
        self
    }

    pub fn captures(&self) -> usize {
        self.captures.load(Ordering::SeqCst)
    }
}

impl FrameSource for ScriptedSource {
    async fn request_access(&self) -> Result<(), DeviceError> {
        self.access.clone()
    }

    async fn wait_ready(&self) -> Result<(), DeviceError> {
        self.ready.clone()
    }

    async fn capture(&self) -> Result<Frame, DeviceError> {
        self.captures.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Ok(self.fallback.clone()))
            .map(Frame::new)
    }
}

/// Analyzer replaying scripted results, then reporting an empty frame.
pub struct ScriptedAnalyzer {
    script: Mutex<VecDeque<Result<DetectionResult, FaceError>>>,
    latency: Duration,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedAnalyzer {
    pub fn new(script: Vec<Result<DetectionResult, FaceError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            latency: Duration::ZERO,
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Every result is qualifying with the given confidence.
    pub fn confident(times: usize, confidence: f32) -> Self {
        Self::new((0..times).map(|_| Ok(faces(&[confidence]))).collect())
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

impl FaceAnalyzer for ScriptedAnalyzer {
    async fn detect_faces(&self, _image: &EncodedImage) -> Result<DetectionResult, FaceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        let next = self.script.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Ok(DetectionResult::default()))
    }
}

/// Comparer replaying scripted results, then reporting no match.
pub struct ScriptedComparer {
    script: Mutex<VecDeque<Result<ComparisonResult, FaceError>>>,
    latency: Duration,
    calls: AtomicUsize,
    thresholds: Mutex<Vec<f32>>,
}

impl ScriptedComparer {
    pub fn new(script: Vec<Result<ComparisonResult, FaceError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            latency: Duration::ZERO,
            calls: AtomicUsize::new(0),
            thresholds: Mutex::new(Vec::new()),
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn thresholds(&self) -> Vec<f32> {
        self.thresholds.lock().unwrap().clone()
    }
}

impl FaceComparer for ScriptedComparer {
    async fn compare_faces(
        &self,
        _source: &EncodedImage,
        _target: &EncodedImage,
        similarity_threshold: f32,
    ) -> Result<ComparisonResult, FaceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.thresholds.lock().unwrap().push(similarity_threshold);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        let next = self.script.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Ok(ComparisonResult::default()))
    }
}
