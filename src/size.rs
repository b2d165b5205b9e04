//! Human-readable byte quantities and durations.

use std::time::Duration;

const KIB: u64 = 1024;
const MIB: u64 = 1024 * KIB;
const GIB: u64 = 1024 * MIB;
const TIB: u64 = 1024 * GIB;
const PIB: u64 = 1024 * TIB;

/// Pick the largest binary unit not exceeding `size`.
pub fn size_to_unit(size: u64) -> (u64, &'static str) {
    match size {
        s if s >= PIB => (PIB, "PiB"),
        s if s >= TIB => (TIB, "TiB"),
        s if s >= GIB => (GIB, "GiB"),
        s if s >= MIB => (MIB, "MiB"),
        s if s >= KIB => (KIB, "KiB"),
        _ => (1, "B"),
    }
}

/// Format `size` against an explicit unit factor.
///
/// Used to print "done/total" pairs in the unit of the total.
pub fn size_to_string_factor(size: f64, factor: u64, unit: Option<&str>) -> String {
    let mut out = if factor > 1 {
        format!("{:.2}", size / factor as f64)
    } else {
        format!("{}", size.round() as u64)
    };
    if let Some(unit) = unit {
        out.push(' ');
        out.push_str(unit);
    }
    out
}

pub fn size_to_string(size: u64) -> String {
    let (factor, unit) = size_to_unit(size);
    size_to_string_factor(size as f64, factor, Some(unit))
}

/// Format a byte rate, which may be fractional.
pub fn rate_to_string(bytes_per_sec: f64) -> String {
    let whole = bytes_per_sec.max(0.0) as u64;
    let (factor, unit) = size_to_unit(whole);
    size_to_string_factor(bytes_per_sec, factor, Some(unit))
}

/// Compact elapsed-time rendering: `2d 3h 14m`, minutes always present.
pub fn duration_to_string(duration: Duration) -> String {
    let secs = duration.as_secs();
    let days = secs / 86_400;
    let hours = (secs % 86_400) / 3_600;
    let minutes = (secs % 3_600) / 60;
    let mut parts = Vec::with_capacity(3);
    if days > 0 {
        parts.push(format!("{days}d"));
    }
    if hours > 0 {
        parts.push(format!("{hours}h"));
    }
    parts.push(format!("{minutes}m"));
    parts.join(" ")
}
