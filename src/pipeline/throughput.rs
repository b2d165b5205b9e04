//! Throughput and ETA accounting for the archive pipeline
//!
//! The accumulator is owned by the uploading stage. Updates and formatting
//! are plain functions of the recorded numbers and the elapsed time, so the
//! status line can be tested without a clock.

use crate::size::{duration_to_string, rate_to_string, size_to_string_factor, size_to_unit};
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Throughput {
    /// Source bytes of all sets in the run
    pub total_bytes: u64,
    /// Source bytes archived so far
    pub archived_bytes: u64,
    /// Compressed bytes produced so far
    pub archive_size_bytes: u64,
    /// Source bytes of uploaded sets
    pub gross_uploaded_bytes: u64,
    /// Compressed bytes uploaded
    pub net_uploaded_bytes: u64,
    pub archive_time: Duration,
    pub upload_time: Duration,
}

/// Remaining time bracket
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Eta {
    /// Observed compression ratio keeps holding
    pub optimistic: Duration,
    /// Remaining data does not compress
    pub pessimistic: Duration,
}

impl Throughput {
    pub fn new(total_bytes: u64) -> Self {
        Self {
            total_bytes,
            ..Self::default()
        }
    }

    pub fn record_archive(&mut self, source_bytes: u64, archive_bytes: u64, elapsed: Duration) {
        self.archived_bytes += source_bytes;
        self.archive_size_bytes += archive_bytes;
        self.archive_time += elapsed;
    }

    pub fn record_upload(&mut self, source_bytes: u64, archive_bytes: u64, elapsed: Duration) {
        self.gross_uploaded_bytes += source_bytes;
        self.net_uploaded_bytes += archive_bytes;
        self.upload_time += elapsed;
    }

    /// Source bytes archived per second
    pub fn archive_rate(&self) -> Option<f64> {
        per_second(self.archived_bytes, self.archive_time)
    }

    /// Compressed bytes uploaded per second
    pub fn upload_rate(&self) -> Option<f64> {
        per_second(self.net_uploaded_bytes, self.upload_time)
    }

    pub fn compression_ratio(&self) -> Option<f64> {
        (self.archive_size_bytes > 0)
            .then(|| self.archived_bytes as f64 / self.archive_size_bytes as f64)
    }

    pub fn eta(&self) -> Option<Eta> {
        let archive_rate = self.archive_rate()?;
        let upload_rate = self.upload_rate()?;
        if self.gross_uploaded_bytes == 0 {
            return None;
        }
        let archiving =
            self.total_bytes.saturating_sub(self.archived_bytes) as f64 / archive_rate;
        let remaining_upload = self.total_bytes.saturating_sub(self.gross_uploaded_bytes) as f64;
        let pessimistic_upload = remaining_upload / upload_rate;
        let optimistic_upload =
            pessimistic_upload * (self.net_uploaded_bytes as f64 / self.gross_uploaded_bytes as f64);
        Some(Eta {
            optimistic: Duration::from_secs_f64(archiving + optimistic_upload),
            pessimistic: Duration::from_secs_f64(archiving + pessimistic_upload),
        })
    }

    /// One-line progress report.
    pub fn status_line(&self, elapsed: Duration) -> String {
        let (factor, unit) = size_to_unit(self.total_bytes);
        let total = size_to_string_factor(self.total_bytes as f64, factor, Some(unit));
        let fraction = |part: u64| {
            format!(
                "{}/{}",
                size_to_string_factor(part as f64, factor, None),
                total
            )
        };
        let rate = |r: Option<f64>| r.map_or_else(|| "? MiB".to_string(), rate_to_string);

        let ratio = self
            .compression_ratio()
            .map_or_else(|| "?".to_string(), |r| format!("{r:.1}x"));
        let eta = match self.eta() {
            None => "?".to_string(),
            Some(eta) => {
                let min = duration_to_string(eta.optimistic);
                let max = duration_to_string(eta.pessimistic);
                if min == max {
                    min
                } else {
                    format!("{min} - {max}")
                }
            }
        };

        format!(
            "Elapsed: {}, Archived: {} ({:.1}%, {}/s), Uploaded: {} ({:.1}%, {}/s), Ratio: {}, ETA: {}",
            duration_to_string(elapsed),
            fraction(self.archived_bytes),
            percent(self.archived_bytes, self.total_bytes),
            rate(self.archive_rate()),
            fraction(self.gross_uploaded_bytes),
            percent(self.gross_uploaded_bytes, self.total_bytes),
            rate(self.upload_rate()),
            ratio,
            eta
        )
    }
}

fn per_second(bytes: u64, elapsed: Duration) -> Option<f64> {
    let secs = elapsed.as_secs_f64();
    (bytes > 0 && secs > 0.0).then(|| bytes as f64 / secs)
}

fn percent(part: u64, total: u64) -> f64 {
    if total == 0 {
        100.0
    } else {
        100.0 * part as f64 / total as f64
    }
}
