use crate::{
    chain::Chain,
    error::{ProbeError, Result},
    stopwatch::{InstantStopwatch, Stopwatch},
};
use std::{hint::black_box, time::Duration};

/// Times traversals of a [`Chain`].
pub struct LatencySampler<S = InstantStopwatch> {
    stopwatch: S,
}

impl Default for LatencySampler {
    fn default() -> Self {
        Self::new()
    }
}

impl LatencySampler {
    pub fn new() -> Self {
        Self::with_stopwatch(InstantStopwatch::new())
    }
}

impl<S: Stopwatch> LatencySampler<S> {
    pub fn with_stopwatch(stopwatch: S) -> Self {
        LatencySampler { stopwatch }
    }

    /// Times `spots` dependent loads starting at `entry`.
    pub fn bench(&mut self, chain: &Chain, spots: usize, entry: usize) -> Duration {
        self.stopwatch.reset();
        self.stopwatch.start();
        let end = chain.walk(black_box(entry), black_box(spots));
        self.stopwatch.stop();
        black_box(end);
        self.stopwatch.read()
    }

    /// Runs [`bench`](Self::bench) `tries` times and returns the median of the viable results.
    ///
    /// Results at or below `min_viable` are below clock resolution and discarded.
    /// For an even number of survivors the lower middle one is returned.
    pub fn bench_median(
        &mut self,
        chain: &Chain,
        spots: usize,
        entry: usize,
        tries: usize,
        min_viable: Duration,
    ) -> Result<Duration> {
        let mut results = Vec::with_capacity(tries);
        for _ in 0..tries {
            let result = self.bench(chain, spots, entry);
            if result > min_viable {
                results.push(result);
            }
        }
        if results.is_empty() {
            return Err(ProbeError::MeasurementFailure {
                spots,
                tries,
                min_viable,
            });
        }
        let median = (results.len() - 1) / 2;
        let (_, median, _) = results.select_nth_unstable(median);
        Ok(*median)
    }
}

#[cfg(test)]
use crate::stopwatch::ScriptedStopwatch;

#[cfg(test)]
fn test_chain() -> Chain {
    Chain::build(1 << 10, 8, 4096).unwrap()
}

#[test]
fn test_median_of_viable_results() {
    let chain = test_chain();
    let mut sampler =
        LatencySampler::with_stopwatch(ScriptedStopwatch::from_nanos([50, 5, 30, 40, 10]));
    let median = sampler
        .bench_median(&chain, 4, chain.entry(), 5, Duration::from_nanos(10))
        .unwrap();
    // survivors are 30, 40, 50
    assert_eq!(median, Duration::from_nanos(40));
}

#[test]
fn test_even_survivors_take_lower_middle() {
    let chain = test_chain();
    let mut sampler =
        LatencySampler::with_stopwatch(ScriptedStopwatch::from_nanos([80, 20, 60, 40]));
    let median = sampler
        .bench_median(&chain, 4, chain.entry(), 4, Duration::from_nanos(10))
        .unwrap();
    assert_eq!(median, Duration::from_nanos(40));
}

#[test]
fn test_all_below_floor_is_measurement_failure() {
    let chain = test_chain();
    let mut sampler = LatencySampler::with_stopwatch(ScriptedStopwatch::from_nanos([3, 10, 7]));
    let err = sampler
        .bench_median(&chain, 7, chain.entry(), 3, Duration::from_nanos(10))
        .unwrap_err();
    assert!(matches!(
        err,
        ProbeError::MeasurementFailure {
            spots: 7,
            tries: 3,
            ..
        }
    ));
}

#[test]
fn test_zero_tries_is_measurement_failure() {
    let chain = test_chain();
    let mut sampler = LatencySampler::with_stopwatch(ScriptedStopwatch::from_nanos([100]));
    assert!(
        sampler
            .bench_median(&chain, 1, chain.entry(), 0, Duration::ZERO)
            .is_err()
    );
}

#[test]
fn test_median_is_drawn_from_viable_set() {
    use rand::Rng;
    let chain = test_chain();
    let mut rng = rand::rng();
    let floor = Duration::from_nanos(10);
    for _ in 0..100 {
        let script: Vec<u64> = (0..9).map(|_| rng.random_range(0..40)).collect();
        let mut sampler = LatencySampler::with_stopwatch(ScriptedStopwatch::from_nanos(
            script.iter().copied(),
        ));
        match sampler.bench_median(&chain, 2, chain.entry(), script.len(), floor) {
            Ok(median) => {
                assert!(median > floor);
                assert!(script.contains(&(median.as_nanos() as u64)));
            }
            Err(_) => assert!(script.iter().all(|&x| x <= 10)),
        }
    }
}

#[test]
fn test_wall_clock_bench_runs() {
    let chain = test_chain();
    let mut sampler = LatencySampler::new();
    let short = sampler.bench(&chain, 1, chain.entry());
    let long = sampler.bench(&chain, chain.len() * 1000, chain.entry());
    assert!(long > short);
}
