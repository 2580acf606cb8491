// SPDX-License-Identifier: GPL-3.0-only

//! Pipeline counters
//!
//! Lock-free so the capture thread can count without contending with
//! whoever is reading the numbers.

use std::sync::atomic::{AtomicU64, Ordering};

/// Live counters for one gate
#[derive(Debug, Default)]
pub struct PipelineStats {
    frames: AtomicU64,
    passed_through: AtomicU64,
    blurred: AtomicU64,
    dropped: AtomicU64,
    detector_runs: AtomicU64,
    orientation_errors: AtomicU64,
    detection_errors: AtomicU64,
    buffer_errors: AtomicU64,
    blur_errors: AtomicU64,
    retains: AtomicU64,
    releases: AtomicU64,
    overruns: AtomicU64,
}

/// Point-in-time copy of [`PipelineStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Frames handed to `process`
    pub frames: u64,
    /// Frames forwarded unchanged
    pub passed_through: u64,
    /// Frames forwarded blurred
    pub blurred: u64,
    /// Frames not forwarded at all
    pub dropped: u64,
    pub detector_runs: u64,
    pub orientation_errors: u64,
    pub detection_errors: u64,
    pub buffer_errors: u64,
    pub blur_errors: u64,
    pub retains: u64,
    pub releases: u64,
    /// Frames that took longer than one frame interval
    pub overruns: u64,
}

macro_rules! counters {
    ($($name:ident => $field:ident),* $(,)?) => {
        impl PipelineStats {
            $(
                pub(crate) fn $name(&self) -> u64 {
                    self.$field.fetch_add(1, Ordering::Relaxed) + 1
                }
            )*

            /// Copy all counters
            pub fn snapshot(&self) -> StatsSnapshot {
                StatsSnapshot {
                    $($field: self.$field.load(Ordering::Relaxed),)*
                }
            }

            /// Zero all counters
            pub fn clear(&self) {
                $(self.$field.store(0, Ordering::Relaxed);)*
            }
        }
    };
}

counters! {
    record_frame => frames,
    record_passed_through => passed_through,
    record_blurred => blurred,
    record_dropped => dropped,
    record_detector_run => detector_runs,
    record_orientation_error => orientation_errors,
    record_detection_error => detection_errors,
    record_buffer_error => buffer_errors,
    record_blur_error => blur_errors,
    record_retain => retains,
    record_release => releases,
    record_overrun => overruns,
}

impl StatsSnapshot {
    /// Frames that reached the sink
    pub fn forwarded(&self) -> u64 {
        self.passed_through + self.blurred
    }
}

impl std::fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Frames:            {}", self.frames)?;
        writeln!(f, "  passed through:  {}", self.passed_through)?;
        writeln!(f, "  blurred:         {}", self.blurred)?;
        writeln!(f, "  dropped:         {}", self.dropped)?;
        writeln!(f, "Detector runs:     {}", self.detector_runs)?;
        writeln!(f, "Errors:")?;
        writeln!(f, "  orientation:     {}", self.orientation_errors)?;
        writeln!(f, "  detection:       {}", self.detection_errors)?;
        writeln!(f, "  buffer:          {}", self.buffer_errors)?;
        writeln!(f, "  blur:            {}", self.blur_errors)?;
        writeln!(f, "Retain/release:    {}/{}", self.retains, self.releases)?;
        write!(f, "Budget overruns:   {}", self.overruns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_and_clear() {
        let stats = PipelineStats::default();
        assert_eq!(stats.record_frame(), 1);
        assert_eq!(stats.record_frame(), 2);
        stats.record_blurred();
        stats.record_passed_through();

        let snap = stats.snapshot();
        assert_eq!(snap.frames, 2);
        assert_eq!(snap.forwarded(), 2);

        stats.clear();
        assert_eq!(stats.snapshot(), StatsSnapshot::default());
    }
}
