use std::fmt;

use vg_core::{JobStatus, Orientation, Quality, VideoDuration};

use crate::generator::db::job::JobRecord;

/// Summary of the stored job history.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationStats {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    /// Whole percent of `total` that completed.
    pub success_rate: u32,
    pub favorites: usize,
    /// Whole seconds, over completed records that carry a completion time.
    pub average_generation_secs: u64,
    pub most_used_duration: VideoDuration,
    pub most_used_quality: Quality,
    pub most_used_orientation: Orientation,
}

impl GenerationStats {
    pub fn from_history(history: &[JobRecord], favorites: usize) -> Self {
        let total = history.len();
        let successful = count(history, JobStatus::Completed);
        let failed = count(history, JobStatus::Failed);

        let success_rate = if total == 0 {
            0
        } else {
            (successful as f64 / total as f64 * 100.0).round() as u32
        };

        let times: Vec<f64> = history
            .iter()
            .filter(|r| r.status == JobStatus::Completed)
            .filter_map(JobRecord::generation_secs)
            .collect();
        let average_generation_secs = if times.is_empty() {
            0
        } else {
            (times.iter().sum::<f64>() / times.len() as f64).round().max(0.0) as u64
        };

        Self {
            total,
            successful,
            failed,
            success_rate,
            favorites,
            average_generation_secs,
            most_used_duration: most_used(history.iter().map(|r| r.settings.duration)),
            most_used_quality: most_used(history.iter().map(|r| r.settings.quality)),
            most_used_orientation: most_used(history.iter().map(|r| r.settings.orientation)),
        }
    }
}

fn count(history: &[JobRecord], status: JobStatus) -> usize {
    history.iter().filter(|r| r.status == status).count()
}

/// Most frequent value; ties go to whichever was seen first.
fn most_used<T: PartialEq + Copy + Default>(values: impl Iterator<Item = T>) -> T {
    let mut tally: Vec<(T, usize)> = Vec::new();
    for value in values {
        match tally.iter_mut().find(|(v, _)| *v == value) {
            Some((_, n)) => *n += 1,
            None => tally.push((value, 1)),
        }
    }

    let mut best: Option<(T, usize)> = None;
    for (value, n) in tally {
        if best.is_none_or(|(_, top)| n > top) {
            best = Some((value, n));
        }
    }
    best.map(|(v, _)| v).unwrap_or_default()
}

impl fmt::Display for GenerationStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Total generated:     {}", self.total)?;
        writeln!(f, "Successful:          {}", self.successful)?;
        writeln!(f, "Failed:              {}", self.failed)?;
        writeln!(f, "Success rate:        {}%", self.success_rate)?;
        writeln!(f, "Favorites:           {}", self.favorites)?;
        writeln!(f, "Avg generation time: {}s", self.average_generation_secs)?;
        writeln!(f, "Most used duration:  {}s", self.most_used_duration.seconds())?;
        writeln!(f, "Most used quality:   {}", self.most_used_quality.id())?;
        write!(f, "Most used layout:    {}", self.most_used_orientation.id())
    }
}
