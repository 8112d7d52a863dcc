use std::{fmt, time::Duration};

const UNITS: [(&str, f64); 4] = [("s", 1e9), ("ms", 1e6), ("µs", 1e3), ("ns", 1.0)];

/// Renders a [`Duration`] with fixed width (10 characters) for table cells.
///
/// The value is scaled to the largest unit it reaches and shown with one decimal (`  52.0 ns`, `   1.5 µs`).
pub struct Latency(pub Duration);

impl fmt::Display for Latency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let nanos = self.0.as_nanos() as f64;
        let (unit, scale) = UNITS
            .into_iter()
            .find(|&(_, scale)| nanos >= scale)
            .unwrap_or(UNITS[3]);
        write!(f, "{:7.1} {unit:<2}", nanos / scale)
    }
}

#[test]
fn test_latency() {
    let cases = [
        (0, "    0.0 ns"),
        (10, "   10.0 ns"),
        (999, "  999.0 ns"),
        (1_000, "    1.0 µs"),
        (1_500, "    1.5 µs"),
        (250_000, "  250.0 µs"),
        (2_000_000, "    2.0 ms"),
        (3_000_000_000, "    3.0 s "),
    ];
    for (nanos, expected) in cases {
        let rendered = Latency(Duration::from_nanos(nanos)).to_string();
        assert_eq!(rendered, expected);
        assert_eq!(rendered.chars().count(), 10);
    }
}
