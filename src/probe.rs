use crate::{
    chain::{ADDRESS_WIDTH, Chain},
    config::ProbeConfig,
    error::Result,
    formats::Format,
    groups::{CacheEstimate, StrideJumpTable, find_last_group},
    jumps::{Jumps, first_interesting_jump, spots_with_jumps},
    page::page_size,
    sampler::LatencySampler,
    stopwatch::{InstantStopwatch, Stopwatch},
};
use log::{debug, error, info, warn};
use std::{error::Error, iter, time::Duration};

/// Measurements taken for one stride.
#[derive(Debug, Clone)]
pub struct StrideRecord {
    /// Distance between chain slots, in address-sized slots.
    pub stride: usize,
    /// Number of slots on the chain before capping at the traversal ceiling.
    pub chain_len: usize,
    /// Median latency per traversal count, starting at count 1.
    pub latencies: Vec<Duration>,
    pub jumps: Jumps,
}

impl StrideRecord {
    pub fn stride_bytes(&self) -> usize {
        self.stride * ADDRESS_WIDTH
    }

    pub fn first_interesting_jump(&self) -> Option<usize> {
        first_interesting_jump(&self.jumps)
    }
}

/// Result of a complete sweep.
#[derive(Debug, Clone)]
pub struct ProbeReport {
    /// Whether this binary was built with optimizations.
    pub optimized: bool,
    pub buffer_capacity: usize,
    pub page_size: usize,
    pub table: StrideJumpTable,
    /// `None` if no stride showed an interesting jump.
    pub estimate: Option<CacheEstimate>,
}

/// Strides swept for a buffer of `buffer_capacity` slots: powers of two from one address width up to the capacity.
pub fn stride_sweep(buffer_capacity: usize) -> impl Iterator<Item = usize> {
    iter::successors(Some(ADDRESS_WIDTH), |stride| stride.checked_mul(2))
        .take_while(move |&stride| stride <= buffer_capacity)
}

/// Adds the first interesting jump of `record` to `table`.
///
/// Strides with no jump past the baseline are left out.
pub fn record_jump(mut table: StrideJumpTable, record: &StrideRecord) -> StrideJumpTable {
    if let Some(jump) = record.first_interesting_jump() {
        table.insert(record.stride, jump);
    }
    table
}

/// Drives the stride sweep.
pub struct Probe<S = InstantStopwatch> {
    config: ProbeConfig,
    page_size: usize,
    sampler: LatencySampler<S>,
}

impl Probe {
    pub fn new(config: ProbeConfig) -> Self {
        Self::with_stopwatch(config, InstantStopwatch::new())
    }
}

impl<S: Stopwatch> Probe<S> {
    pub fn with_stopwatch(config: ProbeConfig, stopwatch: S) -> Self {
        Probe {
            config,
            page_size: page_size(),
            sampler: LatencySampler::with_stopwatch(stopwatch),
        }
    }

    pub fn config(&self) -> &ProbeConfig {
        &self.config
    }

    /// Builds a chain for `stride`, samples every traversal count up to the ceiling and detects jumps.
    ///
    /// The chain buffer is released before this returns, on success and on failure.
    pub fn measure_stride(&mut self, stride: usize) -> Result<StrideRecord> {
        let chain = Chain::build(self.config.buffer_capacity, stride, self.page_size)?;
        let spots = chain.spots(self.config.traversal_ceiling);
        debug!(
            "stride {stride}: chain of {} slots at {:#x}, sampling up to {spots} spots",
            chain.len(),
            chain.base_address()
        );
        let mut latencies = Vec::with_capacity(spots);
        for count in 1..=spots {
            let latency = self.sampler.bench_median(
                &chain,
                count,
                chain.entry(),
                self.config.tries_per_sample,
                self.config.min_viable_duration,
            )?;
            debug!("stride {stride}: {count} spots took {latency:?}");
            latencies.push(latency);
        }
        let jumps = spots_with_jumps(
            &latencies,
            self.config.jump_error_margin,
            self.config.jump_value,
        );
        Ok(StrideRecord {
            stride,
            chain_len: chain.len(),
            latencies,
            jumps,
        })
    }

    /// Sweeps all strides, reporting each to `format`, and infers the cache geometry.
    ///
    /// The first failing stride aborts the sweep.
    pub fn run(
        &mut self,
        format: &mut dyn Format,
    ) -> std::result::Result<ProbeReport, Box<dyn Error>> {
        let mut table = StrideJumpTable::new();
        for stride in stride_sweep(self.config.buffer_capacity) {
            let record = self.measure_stride(stride).inspect_err(|e| {
                error!("stride {stride} failed: {e}");
            })?;
            match record.first_interesting_jump() {
                Some(jump) => info!(
                    "stride {stride} ({} bytes): first jump at {jump} spots",
                    record.stride_bytes()
                ),
                None => warn!("stride {stride}: no jump past the baseline"),
            }
            format.push(&record)?;
            table = record_jump(table, &record);
        }
        let estimate =
            find_last_group(&table, self.config.group_tolerance).map(CacheEstimate::from_group);
        if estimate.is_none() {
            warn!("no stride showed a latency jump, cannot estimate cache geometry");
        }
        let report = ProbeReport {
            optimized: cfg!(not(debug_assertions)),
            buffer_capacity: self.config.buffer_capacity,
            page_size: self.page_size,
            table,
            estimate,
        };
        format.finish(&report)?;
        Ok(report)
    }
}

#[cfg(test)]
use crate::{error::ProbeError, stopwatch::ScriptedStopwatch};

#[cfg(test)]
#[derive(Default)]
struct Recorder {
    strides: Vec<usize>,
    finished: bool,
}

#[cfg(test)]
impl Format for Recorder {
    fn push(&mut self, record: &StrideRecord) -> std::result::Result<(), Box<dyn Error>> {
        self.strides.push(record.stride);
        Ok(())
    }

    fn finish(&mut self, _report: &ProbeReport) -> std::result::Result<(), Box<dyn Error>> {
        self.finished = true;
        Ok(())
    }
}

#[cfg(test)]
fn test_config() -> ProbeConfig {
    ProbeConfig {
        buffer_capacity: 64 * ADDRESS_WIDTH,
        traversal_ceiling: 6,
        tries_per_sample: 1,
        min_viable_duration: Duration::from_nanos(1),
        group_tolerance: 1,
        ..ProbeConfig::default()
    }
}

#[test]
fn test_stride_sweep() {
    let strides: Vec<_> = stride_sweep(64 * ADDRESS_WIDTH).collect();
    let expected: Vec<_> = (0..7).map(|p| ADDRESS_WIDTH << p).collect();
    assert_eq!(strides, expected);
    assert_eq!(stride_sweep(ADDRESS_WIDTH - 1).count(), 0);
}

#[test]
fn test_measure_stride_detects_jump() {
    let mut probe = Probe::with_stopwatch(
        test_config(),
        ScriptedStopwatch::from_nanos([10, 10, 10, 50, 52, 55]),
    );
    let record = probe.measure_stride(ADDRESS_WIDTH).unwrap();
    assert_eq!(record.chain_len, 64);
    assert_eq!(record.latencies.len(), 6);
    assert_eq!(record.first_interesting_jump(), Some(4));
    assert_eq!(record.jumps.get(&4), Some(&Duration::from_nanos(50)));
    assert_eq!(record.stride_bytes(), ADDRESS_WIDTH * ADDRESS_WIDTH);
}

#[test]
fn test_record_jump_skips_flat_strides() {
    let flat = StrideRecord {
        stride: 16,
        chain_len: 8,
        latencies: vec![Duration::from_nanos(10); 4],
        jumps: Jumps::from([(1, Duration::from_nanos(10))]),
    };
    let table = record_jump(StrideJumpTable::new(), &flat);
    assert!(table.is_empty());
    let rising = StrideRecord {
        jumps: Jumps::from([
            (1, Duration::from_nanos(10)),
            (3, Duration::from_nanos(40)),
            (7, Duration::from_nanos(90)),
        ]),
        ..flat
    };
    let table = record_jump(table, &rising);
    assert_eq!(table, StrideJumpTable::from([(16, 3)]));
}

#[test]
fn test_run_infers_geometry() {
    // chain lengths are 64, 32, 16, 8, 4, 2, 1; the ceiling caps them at 6
    let early = [10, 10, 50, 50, 50, 50];
    let late = [10, 10, 10, 10, 50, 50];
    let mut script = Vec::new();
    for _ in 0..2 {
        script.extend(early);
    }
    for _ in 0..2 {
        script.extend(late);
    }
    script.extend([10; 4 + 2 + 1]);

    let mut probe = Probe::with_stopwatch(test_config(), ScriptedStopwatch::from_nanos(script));
    let mut recorder = Recorder::default();
    let report = probe.run(&mut recorder).unwrap();

    let strides: Vec<_> = stride_sweep(64 * ADDRESS_WIDTH).collect();
    assert_eq!(recorder.strides, strides);
    assert!(recorder.finished);
    assert_eq!(
        report.table,
        StrideJumpTable::from([
            (strides[0], 3),
            (strides[1], 3),
            (strides[2], 5),
            (strides[3], 5),
        ])
    );
    let estimate = report.estimate.unwrap();
    assert_eq!(estimate.stride, strides[2]);
    assert_eq!(estimate.associativity, 4);
    assert_eq!(estimate.size_bytes, strides[2] * ADDRESS_WIDTH * 4);
    assert_eq!(report.buffer_capacity, 64 * ADDRESS_WIDTH);
}

#[test]
fn test_run_without_jumps_has_no_estimate() {
    let mut probe = Probe::with_stopwatch(test_config(), ScriptedStopwatch::from_nanos([25]));
    let mut recorder = Recorder::default();
    let report = probe.run(&mut recorder).unwrap();
    assert!(report.table.is_empty());
    assert_eq!(report.estimate, None);
    assert!(recorder.finished);
}

#[test]
fn test_measurement_failure_aborts_run() {
    let config = ProbeConfig {
        min_viable_duration: Duration::from_nanos(10),
        ..test_config()
    };
    let mut probe = Probe::with_stopwatch(config, ScriptedStopwatch::from_nanos([4]));
    let mut recorder = Recorder::default();
    let err = probe.run(&mut recorder).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<ProbeError>(),
        Some(ProbeError::MeasurementFailure { spots: 1, .. })
    ));
    assert!(recorder.strides.is_empty());
    assert!(!recorder.finished);
}
