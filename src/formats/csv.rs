use super::Format;
use crate::probe::{ProbeReport, StrideRecord};
use std::{
    error::Error,
    io::{Stdout, Write, stdout},
};

const HEADER: [&str; 6] = [
    "stride",
    "stride_bytes",
    "chain_len",
    "baseline_ns",
    "first_jump",
    "first_jump_ns",
];

/// Writes one CSV row per stride, flushed as soon as the stride is measured.
///
/// Strides without an interesting jump have empty `first_jump` fields.
pub struct Csv<W: Write = Stdout> {
    header_written: bool,
    writer: csv::Writer<W>,
}

impl Default for Csv {
    fn default() -> Self {
        Self::new()
    }
}

impl Csv {
    pub fn new() -> Self {
        Self::with_writer(stdout())
    }
}

impl<W: Write> Csv<W> {
    pub fn with_writer(writer: W) -> Self {
        Csv {
            header_written: false,
            writer: csv::Writer::from_writer(writer),
        }
    }

    pub fn into_inner(self) -> Result<W, Box<dyn Error>> {
        self.writer.into_inner().map_err(|e| e.into_error().into())
    }
}

impl<W: Write> Format for Csv<W> {
    fn push(&mut self, record: &StrideRecord) -> Result<(), Box<dyn Error>> {
        if !self.header_written {
            self.header_written = true;
            self.writer.write_record(HEADER)?;
        }
        let baseline = record
            .jumps
            .get(&1)
            .map(|x| x.as_nanos().to_string())
            .unwrap_or_default();
        let first_jump = record.first_interesting_jump();
        let first_jump_ns = first_jump
            .and_then(|jump| record.jumps.get(&jump))
            .map(|x| x.as_nanos().to_string())
            .unwrap_or_default();
        self.writer.write_record([
            record.stride.to_string(),
            record.stride_bytes().to_string(),
            record.chain_len.to_string(),
            baseline,
            first_jump.map(|x| x.to_string()).unwrap_or_default(),
            first_jump_ns,
        ])?;
        self.writer.flush()?;
        Ok(())
    }

    fn finish(&mut self, _report: &ProbeReport) -> Result<(), Box<dyn Error>> {
        self.header_written = false;
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
use crate::{chain::ADDRESS_WIDTH, jumps::Jumps};
#[cfg(test)]
use std::time::Duration;

#[test]
fn test_csv_rows() {
    let mut csv = Csv::with_writer(Vec::new());
    let rising = StrideRecord {
        stride: 16,
        chain_len: 1024,
        latencies: Vec::new(),
        jumps: Jumps::from([(1, Duration::from_nanos(20)), (9, Duration::from_nanos(70))]),
    };
    let flat = StrideRecord {
        stride: 32,
        chain_len: 512,
        latencies: Vec::new(),
        jumps: Jumps::from([(1, Duration::from_nanos(25))]),
    };
    csv.push(&rising).unwrap();
    csv.push(&flat).unwrap();
    let output = String::from_utf8(csv.into_inner().unwrap()).unwrap();
    let expected = format!(
        "stride,stride_bytes,chain_len,baseline_ns,first_jump,first_jump_ns\n\
         16,{},1024,20,9,70\n\
         32,{},512,25,,\n",
        16 * ADDRESS_WIDTH,
        32 * ADDRESS_WIDTH
    );
    assert_eq!(output, expected);
}
