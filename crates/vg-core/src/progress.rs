//! Caller-facing progress view derived from a job's status and the time
//! it has been tracked.
//!
//! The percentage is an estimate only. It is capped below 100 until the
//! remote service actually reports completion.

use crate::status::JobStatus;

/// Expected wait for a job still queued on the remote side.
pub const PENDING_ESTIMATE_SECS: u64 = 120;
/// Expected wait once the remote side reports it is rendering.
pub const PROCESSING_ESTIMATE_SECS: u64 = 90;
/// Ceiling for the estimate while the job is in flight.
pub const IN_FLIGHT_CAP_PERCENT: f32 = 90.0;

#[derive(Debug, Clone, PartialEq)]
pub struct ProgressView {
    pub status: JobStatus,
    pub percent: f32,
    pub elapsed_secs: u64,
    pub estimated_total_secs: u64,
    pub label: &'static str,
}

impl ProgressView {
    pub fn remaining_secs(&self) -> u64 {
        self.estimated_total_secs.saturating_sub(self.elapsed_secs)
    }

    /// `elapsed / estimated`, e.g. `1:05 / 2:00`
    pub fn clock(&self) -> String {
        format!(
            "{} / {}",
            format_clock(self.elapsed_secs),
            format_clock(self.estimated_total_secs)
        )
    }

    pub fn remaining(&self) -> String {
        format_clock(self.remaining_secs())
    }
}

pub fn estimated_total_secs(status: JobStatus) -> u64 {
    match status {
        JobStatus::Pending => PENDING_ESTIMATE_SECS,
        _ => PROCESSING_ESTIMATE_SECS,
    }
}

pub fn estimate(status: JobStatus, elapsed_secs: u64) -> ProgressView {
    let estimated_total_secs = estimated_total_secs(status);
    let percent = match status {
        JobStatus::Completed => 100.0,
        _ => {
            let raw = elapsed_secs as f32 / estimated_total_secs as f32 * 100.0;
            raw.min(IN_FLIGHT_CAP_PERCENT)
        }
    };

    ProgressView {
        status,
        percent,
        elapsed_secs,
        estimated_total_secs,
        label: status.label(),
    }
}

/// `m:ss`
pub fn format_clock(secs: u64) -> String {
    format!("{}:{:02}", secs / 60, secs % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_uses_longer_baseline() {
        let view = estimate(JobStatus::Pending, 60);
        assert_eq!(view.estimated_total_secs, 120);
        assert!((view.percent - 50.0).abs() < f32::EPSILON);
        assert_eq!(view.label, "Initializing");
    }

    #[test]
    fn processing_baseline() {
        let view = estimate(JobStatus::Processing, 45);
        assert_eq!(view.estimated_total_secs, 90);
        assert!((view.percent - 50.0).abs() < f32::EPSILON);
    }

    #[test]
    fn never_reaches_100_while_in_flight() {
        for elapsed in [89, 90, 500, 10_000] {
            let view = estimate(JobStatus::Processing, elapsed);
            assert!(view.percent <= IN_FLIGHT_CAP_PERCENT);
        }
        assert_eq!(estimate(JobStatus::Pending, 10_000).percent, 90.0);
    }

    #[test]
    fn completed_reports_full() {
        assert_eq!(estimate(JobStatus::Completed, 3).percent, 100.0);
    }

    #[test]
    fn remaining_saturates() {
        let view = estimate(JobStatus::Processing, 200);
        assert_eq!(view.remaining_secs(), 0);
        assert_eq!(view.remaining(), "0:00");
    }

    #[test]
    fn clock_formatting() {
        assert_eq!(format_clock(0), "0:00");
        assert_eq!(format_clock(65), "1:05");
        assert_eq!(format_clock(600), "10:00");
        assert_eq!(estimate(JobStatus::Pending, 65).clock(), "1:05 / 2:00");
    }
}
