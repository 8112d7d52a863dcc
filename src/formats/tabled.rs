use super::{Format, Latency};
use crate::{
    ADDRESS_WIDTH, format_size,
    probe::{ProbeReport, StrideRecord},
};
use std::{
    error::Error,
    fmt::Write as _,
    io::{Stdout, Write, stdout},
};
use tabled::settings::Style;

struct Row {
    stride: usize,
    stride_bytes: usize,
    chain_len: usize,
    baseline: String,
    jumps: String,
    first_jump: String,
}

/// Collects all strides and prints a human readable report once the sweep is done.
///
/// The report consists of the run parameters, a markdown table with one row per stride,
/// and the inferred cache geometry.
pub struct Tabled<W: Write = Stdout> {
    rows: Vec<Row>,
    writer: W,
}

impl Default for Tabled {
    fn default() -> Self {
        Self::new()
    }
}

impl Tabled {
    pub fn new() -> Self {
        Self::with_writer(stdout())
    }
}

impl<W: Write> Tabled<W> {
    pub fn with_writer(writer: W) -> Self {
        Tabled {
            rows: Vec::new(),
            writer,
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn render(&self, report: &ProbeReport) -> Result<String, std::fmt::Error> {
        let mut out = String::new();
        writeln!(out, "Optimized: {}", report.optimized)?;
        writeln!(
            out,
            "Buffer capacity: {} slots ({})",
            report.buffer_capacity,
            format_size(report.buffer_capacity * ADDRESS_WIDTH)
        )?;
        writeln!(out, "Page size: {} bytes", report.page_size)?;

        let mut table = tabled::builder::Builder::new();
        table.push_record([
            "stride",
            "bytes",
            "chain",
            "baseline",
            "jumps",
            "first jump",
        ]);
        for row in &self.rows {
            table.push_record([
                row.stride.to_string(),
                row.stride_bytes.to_string(),
                row.chain_len.to_string(),
                row.baseline.clone(),
                row.jumps.clone(),
                row.first_jump.clone(),
            ]);
        }
        let mut table = table.build();
        table.with(Style::markdown());
        writeln!(out, "\n{table}\n")?;

        write!(out, "Stride jump table:")?;
        for (stride, jump) in &report.table {
            write!(out, "\t{stride}:{jump}")?;
        }
        writeln!(out)?;

        match &report.estimate {
            Some(estimate) => {
                writeln!(
                    out,
                    "Large stride: {}, max spots that fit into set: {}",
                    estimate.stride, estimate.associativity
                )?;
                writeln!(out, "Cache associativity: {}", estimate.associativity)?;
                writeln!(out, "Cache size (bytes): {}", estimate.size_bytes)?;
                writeln!(out, "Cache size (KB): {}", estimate.kib())?;
                writeln!(out, "Cache size (MB): {}", estimate.mib())?;
            }
            None => writeln!(out, "⚠️ No stride showed a latency jump.")?,
        }
        Ok(out)
    }
}

impl<W: Write> Format for Tabled<W> {
    fn push(&mut self, record: &StrideRecord) -> Result<(), Box<dyn Error>> {
        let jumps = record
            .jumps
            .iter()
            .map(|(spots, latency)| format!("{spots}@{}", Latency(*latency).to_string().trim()))
            .collect::<Vec<_>>()
            .join(" ");
        self.rows.push(Row {
            stride: record.stride,
            stride_bytes: record.stride_bytes(),
            chain_len: record.chain_len,
            baseline: record
                .jumps
                .get(&1)
                .map(|x| Latency(*x).to_string())
                .unwrap_or_default(),
            jumps,
            first_jump: record
                .first_interesting_jump()
                .map(|x| x.to_string())
                .unwrap_or_else(|| "-".to_string()),
        });
        Ok(())
    }

    fn finish(&mut self, report: &ProbeReport) -> Result<(), Box<dyn Error>> {
        let rendered = self.render(report)?;
        self.writer.write_all(rendered.as_bytes())?;
        self.writer.flush()?;
        self.rows.clear();
        Ok(())
    }
}

#[cfg(test)]
use crate::{
    groups::{CacheEstimate, LastGroup, StrideJumpTable},
    jumps::Jumps,
};
#[cfg(test)]
use std::time::Duration;

#[cfg(test)]
fn report(estimate: Option<CacheEstimate>) -> ProbeReport {
    ProbeReport {
        optimized: false,
        buffer_capacity: 1 << 20,
        page_size: 4096,
        table: StrideJumpTable::from([(8, 5), (16, 40)]),
        estimate,
    }
}

#[test]
fn test_report_contents() {
    let mut tabled = Tabled::with_writer(Vec::new());
    tabled
        .push(&StrideRecord {
            stride: 16,
            chain_len: 65536,
            latencies: Vec::new(),
            jumps: Jumps::from([(1, Duration::from_nanos(20)), (40, Duration::from_nanos(90))]),
        })
        .unwrap();
    let estimate = CacheEstimate::from_group(LastGroup {
        stride: 16,
        associativity: 39,
    });
    tabled.finish(&report(Some(estimate))).unwrap();
    let output = String::from_utf8(tabled.into_inner()).unwrap();
    assert!(output.starts_with("Optimized: false\n"));
    assert!(output.contains(&format!(
        "Buffer capacity: 1048576 slots ({})",
        format_size((1 << 20) * ADDRESS_WIDTH)
    )));
    assert!(output.contains("| stride |"));
    assert!(output.contains("1@20.0 ns 40@90.0 ns"));
    assert!(output.contains("Stride jump table:\t8:5\t16:40\n"));
    assert!(output.contains("Large stride: 16, max spots that fit into set: 39\n"));
    assert!(output.contains("Cache associativity: 39\n"));
    assert!(output.contains(&format!(
        "Cache size (bytes): {}\n",
        16 * ADDRESS_WIDTH * 39
    )));
}

#[test]
fn test_report_without_estimate() {
    let mut tabled = Tabled::with_writer(Vec::new());
    tabled.finish(&report(None)).unwrap();
    let output = String::from_utf8(tabled.into_inner()).unwrap();
    assert!(output.contains("No stride showed a latency jump"));
    assert!(!output.contains("Cache size"));
}
