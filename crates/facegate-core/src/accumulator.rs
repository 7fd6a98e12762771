/// Counts consecutive qualifying detections.
///
/// Pure state, no I/O. Any disqualifying poll must call [`reset`](Self::reset).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsistencyAccumulator {
    count: u32,
    required: u32,
}

impl ConsistencyAccumulator {
    pub const DEFAULT_REQUIRED: u32 = 3;

    pub fn new(required: u32) -> Self {
        Self {
            count: 0,
            required: required.max(1),
        }
    }

    /// Count one qualifying detection. Returns true once the run reaches the
    /// required length.
    pub fn record_qualifying(&mut self) -> bool {
        self.count = self.count.saturating_add(1);
        self.count >= self.required
    }

    pub fn reset(&mut self) {
        self.count = 0;
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn required(&self) -> u32 {
        self.required
    }
}

impl Default for ConsistencyAccumulator {
    fn default() -> Self {
        Self::new(Self::DEFAULT_REQUIRED)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reaches_required_on_third() {
        let mut acc = ConsistencyAccumulator::default();
        assert!(!acc.record_qualifying());
        assert!(!acc.record_qualifying());
        assert!(acc.record_qualifying());
        assert_eq!(acc.count(), 3);
    }

    #[test]
    fn test_count_tracks_run_length() {
        let mut acc = ConsistencyAccumulator::new(10);
        for n in 1..=7 {
            acc.record_qualifying();
            assert_eq!(acc.count(), n);
        }
    }

    #[test]
    fn test_reset_from_any_count() {
        let mut acc = ConsistencyAccumulator::default();
        acc.record_qualifying();
        acc.record_qualifying();
        acc.reset();
        assert_eq!(acc.count(), 0);
        assert!(!acc.record_qualifying());
    }

    #[test]
    fn test_zero_required_is_clamped() {
        let mut acc = ConsistencyAccumulator::new(0);
        assert_eq!(acc.required(), 1);
        assert!(acc.record_qualifying());
    }
}
