use crate::jumps::JumpValue;
use std::time::Duration;

/// Tuning knobs of a probe run.
///
/// All values are fixed at build time; [`Default`] gives the values used by the `cache_probe` binary.
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    /// Size of each chain buffer, in address-sized slots.
    pub buffer_capacity: usize,
    /// Upper bound on the traversal counts sampled per stride.
    pub traversal_ceiling: usize,
    /// Number of timed traversals per sample before taking the median.
    pub tries_per_sample: usize,
    /// Relative tolerance used by the jump detector.
    pub jump_error_margin: f64,
    /// Maximum difference between jump indices of neighbouring strides within a group.
    pub group_tolerance: usize,
    /// Traversals at or below this duration are below clock resolution and discarded.
    pub min_viable_duration: Duration,
    /// Which latency is reported at a detected jump.
    pub jump_value: JumpValue,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        ProbeConfig {
            buffer_capacity: 1 << 26,
            traversal_ceiling: 100,
            tries_per_sample: 50,
            jump_error_margin: 0.2,
            group_tolerance: 3,
            min_viable_duration: Duration::from_nanos(10),
            jump_value: JumpValue::AfterRise,
        }
    }
}
