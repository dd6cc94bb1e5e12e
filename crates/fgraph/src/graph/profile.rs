use std::time::Duration;

/// Optional profiling sink owned by a graph.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct GraphProfile {
    /// Total wall time spent in successful `validate()` calls.
    pub validate_time: Duration,
    pub validate_calls: usize,
}

impl GraphProfile {
    pub fn add_validate_time(&mut self, duration: Duration) {
        self.validate_time = self.validate_time.saturating_add(duration);
        self.validate_calls = self.validate_calls.saturating_add(1);
    }

    pub fn reset(&mut self) {
        *self = GraphProfile::default();
    }
}
