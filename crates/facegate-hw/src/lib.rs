//! Frame sources for facegate sessions.

mod replay;
mod snapshot;

pub use replay::ReplaySource;
pub use snapshot::SnapshotSource;
