//! Infers the geometry of a CPU cache by timing pointer chains.
//!
//! For every stride in a power-of-two sweep, a [`Chain`] of slot indices is laid out over a page-aligned buffer.
//! The [`LatencySampler`] times walks of increasing length along the chain,
//! and the jump detector marks the walk length at which latency rises sharply,
//! i.e. where the walked slots stop fitting into one cache set.
//! Grouping these jump positions across strides yields the associativity and size of the cache.
//!
//! ```no_run
//! use cache_probe::{Probe, ProbeConfig, Tabled};
//!
//! let mut probe = Probe::new(ProbeConfig::default());
//! let report = probe.run(&mut Tabled::new()).unwrap();
//! if let Some(estimate) = report.estimate {
//!     println!("{} ways, {} bytes", estimate.associativity, estimate.size_bytes);
//! }
//! ```

mod chain;
mod config;
mod error;
mod formats;
mod groups;
mod jumps;
mod page;
mod probe;
mod sampler;
mod stopwatch;

pub use chain::{ADDRESS_WIDTH, Chain};
pub use config::ProbeConfig;
pub use error::{ProbeError, Result};
pub use formats::{Csv, Format, Latency, Tabled};
pub use groups::{CacheEstimate, LastGroup, StrideJumpTable, find_last_group};
pub use jumps::{
    JumpValue, Jumps, first_interesting_jump, spots_with_jumps, within_error_margin,
};
pub use page::page_size;
pub use probe::{Probe, ProbeReport, StrideRecord, record_jump, stride_sweep};
pub use sampler::LatencySampler;
pub use stopwatch::{InstantStopwatch, Stopwatch};

/// Convert number of bytes to formatted string
pub fn format_size(bytes: usize) -> String {
    const GB: f64 = 1024.0 * 1024.0 * 1024.0;
    const MB: f64 = 1024.0 * 1024.0;
    const KB: f64 = 1024.0;

    let bytes = bytes as f64;
    if bytes >= GB {
        format!("{:.2} GiB", bytes / GB)
    } else if bytes >= MB {
        format!("{:.2} MiB", bytes / MB)
    } else if bytes >= KB {
        format!("{:.2} KiB", bytes / KB)
    } else {
        format!("{bytes} B")
    }
}

#[test]
fn test_format_size() {
    assert_eq!(format_size(512), "512 B");
    assert_eq!(format_size(5120), "5.00 KiB");
    assert_eq!(format_size(1 << 29), "512.00 MiB");
    assert_eq!(format_size(3 << 30), "3.00 GiB");
}
