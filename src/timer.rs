//! Wall-clock measurement of a benchmark phase.
//!
//! A `TimeMeasure` is started right before the measured work and consumed by
//! `finish`, which derives the six-line report printed at the end of a run:
//!
//! ```text
//! nanoseconds: 123456789
//! milliseconds: 123.456789
//! seconds: 0.123456789
//! iterations: 50000
//! per iteration: 2469 ns
//! iterations per second: 405000
//! ```

use std::fmt;
use std::time::{Duration, Instant};

/// Running measurement, started at construction.
#[derive(Debug, Clone, Copy)]
pub struct TimeMeasure {
    start: Instant,
}

impl TimeMeasure {
    /// Record the current monotonic time as the start of the measured phase.
    pub fn start() -> Self {
        TimeMeasure {
            start: Instant::now(),
        }
    }

    /// Stop the measurement and derive the report for `iterations` operations.
    pub fn finish(self, iterations: u64) -> Result<Report, TimerError> {
        Report::from_elapsed(self.start.elapsed(), iterations)
    }
}

/// Timing statistics for one measured phase.
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub nanoseconds: u128,
    pub milliseconds: f64,
    pub seconds: f64,
    pub iterations: u64,
    pub per_iteration_ns: u64,
    pub iterations_per_second: u64,
}

impl Report {
    /// Derive a report from an elapsed duration.
    ///
    /// Per-iteration and per-second values are undefined for zero iterations,
    /// so that case is an error rather than a silently bogus number.
    pub fn from_elapsed(elapsed: Duration, iterations: u64) -> Result<Self, TimerError> {
        if iterations == 0 {
            return Err(TimerError::DivisionByZero);
        }

        let nanoseconds = elapsed.as_nanos();
        let seconds = elapsed.as_secs_f64();
        let per_iteration_ns = (nanoseconds as f64 / iterations as f64).round() as u64;
        // A zero-length phase yields +inf, which saturates
        let iterations_per_second = (iterations as f64 / seconds).round() as u64;

        Ok(Report {
            nanoseconds,
            milliseconds: seconds * 1000.0,
            seconds,
            iterations,
            per_iteration_ns,
            iterations_per_second,
        })
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "nanoseconds: {}", self.nanoseconds)?;
        writeln!(f, "milliseconds: {:?}", self.milliseconds)?;
        writeln!(f, "seconds: {:?}", self.seconds)?;
        writeln!(f, "iterations: {}", self.iterations)?;
        writeln!(f, "per iteration: {} ns", self.per_iteration_ns)?;
        writeln!(f, "iterations per second: {}", self.iterations_per_second)
    }
}

/// Timer errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerError {
    DivisionByZero,
}

impl fmt::Display for TimerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimerError::DivisionByZero => {
                write!(f, "division by zero: iteration count must be positive")
            }
        }
    }
}

impl std::error::Error for TimerError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_values() {
        let report = Report::from_elapsed(Duration::from_millis(1500), 3).unwrap();
        assert_eq!(report.nanoseconds, 1_500_000_000);
        assert_eq!(report.milliseconds, 1500.0);
        assert_eq!(report.seconds, 1.5);
        assert_eq!(report.iterations, 3);
        assert_eq!(report.per_iteration_ns, 500_000_000);
        assert_eq!(report.iterations_per_second, 2);
    }

    #[test]
    fn test_per_iteration_rounding() {
        let report = Report::from_elapsed(Duration::from_nanos(1_000_000), 3).unwrap();
        let exact = report.nanoseconds as f64 / 3.0;
        assert!((report.per_iteration_ns as f64 - exact).abs() <= 1.0);
        assert_eq!(report.per_iteration_ns, 333_333);

        let exact = 3.0 / report.seconds;
        assert!((report.iterations_per_second as f64 - exact).abs() <= 1.0);
        assert_eq!(report.iterations_per_second, 3000);
    }

    #[test]
    fn test_zero_iterations() {
        assert_eq!(
            Report::from_elapsed(Duration::from_secs(1), 0),
            Err(TimerError::DivisionByZero)
        );
        assert_eq!(
            TimeMeasure::start().finish(0),
            Err(TimerError::DivisionByZero)
        );
    }

    #[test]
    fn test_single_iteration() {
        let report = TimeMeasure::start().finish(1).unwrap();
        assert_eq!(report.iterations, 1);
        assert_eq!(report.per_iteration_ns as u128, report.nanoseconds);
    }

    #[test]
    fn test_display_format() {
        let report = Report::from_elapsed(Duration::from_millis(1500), 3).unwrap();
        let text = report.to_string();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines,
            vec![
                "nanoseconds: 1500000000",
                "milliseconds: 1500.0",
                "seconds: 1.5",
                "iterations: 3",
                "per iteration: 500000000 ns",
                "iterations per second: 2",
            ]
        );
    }
}
