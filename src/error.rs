use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ProbeError>;

/// Failures that end a probe run.
///
/// None of these are retried: the sweep stops at the first one and no report is produced.
#[derive(Error, Debug)]
pub enum ProbeError {
    /// Every trial for a traversal count finished at or below the viability floor.
    ///
    /// The clock cannot resolve a traversal of this length.
    #[error("no viable sample for {spots} spots: all {tries} tries took at most {min_viable:?}")]
    MeasurementFailure {
        spots: usize,
        tries: usize,
        min_viable: Duration,
    },
    /// The chain buffer for a stride could not be allocated.
    #[error("failed to allocate {slots} slots for stride {stride}")]
    AllocationFailure {
        slots: usize,
        stride: usize,
        #[source]
        source: std::collections::TryReserveError,
    },
    #[error("stride {stride} is outside 1..={capacity} slots")]
    InvalidStride { stride: usize, capacity: usize },
}
