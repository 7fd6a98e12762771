//! HTTP clients for the external face detection and comparison service.

mod client;
mod wire;

pub use client::{FaceServiceClient, ServiceConfig};
