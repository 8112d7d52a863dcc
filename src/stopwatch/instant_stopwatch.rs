use super::Stopwatch;
use std::time::{Duration, Instant};

/// Measures elapsed wall-clock time with [`Instant`].
///
/// Holds the accumulated duration while stopped and the adjusted start instant while running.
pub struct InstantStopwatch {
    time: Result<Duration, Instant>,
}

impl Default for InstantStopwatch {
    fn default() -> Self {
        Self::new()
    }
}

impl InstantStopwatch {
    pub fn new() -> Self {
        Self {
            time: Ok(Duration::ZERO),
        }
    }
}

impl Stopwatch for InstantStopwatch {
    #[inline(always)]
    fn start(&mut self) {
        let Ok(duration) = self.time else {
            panic!("stopwatch already running")
        };
        self.time = Err(Instant::now() - duration);
    }

    #[inline(always)]
    fn stop(&mut self) {
        let Err(start) = self.time else {
            panic!("stopwatch already stopped")
        };
        self.time = Ok(Instant::now() - start);
    }

    fn reset(&mut self) {
        assert!(self.time.is_ok(), "stopwatch reset while running");
        self.time = Ok(Duration::ZERO)
    }

    fn read(&self) -> Duration {
        let Ok(duration) = self.time else {
            panic!("stopwatch read while running")
        };
        duration
    }
}

#[test]
fn test_accumulates_until_reset() {
    let mut sw = InstantStopwatch::new();
    assert_eq!(sw.read(), Duration::ZERO);
    sw.start();
    std::thread::sleep(Duration::from_millis(2));
    sw.stop();
    let first = sw.read();
    assert!(first >= Duration::from_millis(2));
    sw.start();
    sw.stop();
    assert!(sw.read() >= first);
    sw.reset();
    assert_eq!(sw.read(), Duration::ZERO);
}

#[test]
#[should_panic(expected = "stopwatch already running")]
fn test_double_start_panics() {
    let mut sw = InstantStopwatch::new();
    sw.start();
    sw.start();
}
