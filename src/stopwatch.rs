mod instant_stopwatch;

pub use instant_stopwatch::InstantStopwatch;

use std::time::Duration;

/// A `Stopwatch` is used by the [`LatencySampler`](crate::LatencySampler) to time chain traversals.
///
/// It accumulates the time between [`start`](Self::start) and [`stop`](Self::stop)
/// until it is [`reset`](Self::reset).
/// The default is [`InstantStopwatch`], which reads the monotonic wall clock.
pub trait Stopwatch {
    /// Start timing.
    fn start(&mut self);
    /// Stop timing.
    fn stop(&mut self);
    /// Reset the accumulated time to zero.
    fn reset(&mut self);
    /// Time accumulated while running.
    ///
    /// Must not be called while the stopwatch is running.
    fn read(&self) -> Duration;
}

impl Stopwatch for Box<dyn Stopwatch> {
    fn start(&mut self) {
        (**self).start();
    }

    fn stop(&mut self) {
        (**self).stop();
    }

    fn reset(&mut self) {
        (**self).reset();
    }

    fn read(&self) -> Duration {
        (**self).read()
    }
}

/// A stopwatch that replays a fixed list of readings, one per start/stop cycle.
///
/// Once the script is exhausted it starts over.
#[cfg(test)]
pub(crate) struct ScriptedStopwatch {
    script: Vec<Duration>,
    cycle: usize,
    running: bool,
}

#[cfg(test)]
impl ScriptedStopwatch {
    pub(crate) fn from_nanos(script: impl IntoIterator<Item = u64>) -> Self {
        ScriptedStopwatch {
            script: script.into_iter().map(Duration::from_nanos).collect(),
            cycle: 0,
            running: false,
        }
    }
}

#[cfg(test)]
impl Stopwatch for ScriptedStopwatch {
    fn start(&mut self) {
        assert!(!self.running, "already started");
        self.running = true;
    }

    fn stop(&mut self) {
        assert!(self.running, "already stopped");
        self.running = false;
        self.cycle += 1;
    }

    fn reset(&mut self) {}

    fn read(&self) -> Duration {
        assert!(!self.running, "read while running");
        self.script[(self.cycle + self.script.len() - 1) % self.script.len()]
    }
}
