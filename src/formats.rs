mod csv;
mod latency;
mod tabled;

pub use self::csv::Csv;
pub use latency::Latency;
pub use self::tabled::Tabled;

use crate::probe::{ProbeReport, StrideRecord};
use std::error::Error;

/// Receives the results of a probe run.
///
/// [`push`](Self::push) is called once per stride as soon as the stride has been measured,
/// [`finish`](Self::finish) once after the sweep completed.
/// Neither is called for a stride whose measurement failed.
pub trait Format {
    fn push(&mut self, record: &StrideRecord) -> Result<(), Box<dyn Error>>;
    fn finish(&mut self, report: &ProbeReport) -> Result<(), Box<dyn Error>>;
}

impl Format for Box<dyn Format> {
    fn push(&mut self, record: &StrideRecord) -> Result<(), Box<dyn Error>> {
        (**self).push(record)
    }

    fn finish(&mut self, report: &ProbeReport) -> Result<(), Box<dyn Error>> {
        (**self).finish(report)
    }
}
