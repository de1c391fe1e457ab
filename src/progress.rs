//! Progress extraction from tool diagnostic output.
//!
//! The marker shapes below are the contract with the wrapped tools:
//!
//! - transcoder: `Duration: HH:MM:SS` once, then `time=HH:MM:SS` per status update
//! - downloader: `[download]  NN.N%`
//!
//! Matching is a substring search, so surrounding text is ignored. A line that
//! matches nothing yields nothing; if the tools change these shapes, progress
//! stops being reported rather than being misread.

use regex_lite::Regex;

const DURATION_PATTERN: &str = r"Duration: (\d{2}):(\d{2}):(\d{2})";
const ELAPSED_PATTERN: &str = r"time=(\d{2}):(\d{2}):(\d{2})";
const PERCENT_PATTERN: &str = r"\[download\]\s+(\d+\.?\d*)%";

/// Per-job progress matcher handed to the process runner.
#[derive(Debug, Clone, Default)]
pub enum ProgressMonitor {
    /// Report no progress; the job is indeterminate.
    #[default]
    Silent,
    Percentage(PercentageMatcher),
    TimeRatio(TimeRatioMatcher),
}

impl ProgressMonitor {
    pub fn percentage() -> Self {
        Self::Percentage(PercentageMatcher::new())
    }

    pub fn time_ratio() -> Self {
        Self::TimeRatio(TimeRatioMatcher::new())
    }

    /// Inspect one output line; returns a completion value in [0, 100] on a match.
    pub fn observe(&mut self, line: &str) -> Option<f64> {
        match self {
            Self::Silent => None,
            Self::Percentage(matcher) => matcher.observe(line),
            Self::TimeRatio(matcher) => matcher.observe(line),
        }
    }
}

/// Reads a literal percentage from downloader status lines.
#[derive(Debug, Clone)]
pub struct PercentageMatcher {
    percent_regex: Option<Regex>,
}

impl PercentageMatcher {
    pub fn new() -> Self {
        Self {
            percent_regex: Regex::new(PERCENT_PATTERN).ok(),
        }
    }

    pub fn observe(&self, line: &str) -> Option<f64> {
        let caps = self.percent_regex.as_ref()?.captures(line)?;
        let value = caps.get(1)?.as_str().parse::<f64>().ok()?;
        Some(clamp_percent(value))
    }
}

impl Default for PercentageMatcher {
    fn default() -> Self {
        Self::new()
    }
}

/// Computes elapsed/total from transcoder diagnostics. Remembers the first
/// total duration seen in the job; elapsed markers before that are ignored.
///
/// Only the first input's duration counts. When that input is a still image
/// its duration reads as zero, so an image plus audio job reports no progress.
#[derive(Debug, Clone)]
pub struct TimeRatioMatcher {
    duration_regex: Option<Regex>,
    elapsed_regex: Option<Regex>,
    total_secs: Option<u64>,
}

impl TimeRatioMatcher {
    pub fn new() -> Self {
        Self {
            duration_regex: Regex::new(DURATION_PATTERN).ok(),
            elapsed_regex: Regex::new(ELAPSED_PATTERN).ok(),
            total_secs: None,
        }
    }

    pub fn total_secs(&self) -> Option<u64> {
        self.total_secs
    }

    pub fn observe(&mut self, line: &str) -> Option<f64> {
        if self.total_secs.is_none() {
            self.total_secs = self
                .duration_regex
                .as_ref()
                .and_then(|re| capture_hms(re, line));
        }

        let total = self.total_secs.filter(|&secs| secs > 0)?;
        let elapsed = capture_hms(self.elapsed_regex.as_ref()?, line)?;
        Some(clamp_percent(elapsed as f64 / total as f64 * 100.0))
    }
}

impl Default for TimeRatioMatcher {
    fn default() -> Self {
        Self::new()
    }
}

fn capture_hms(re: &Regex, line: &str) -> Option<u64> {
    let caps = re.captures(line)?;
    let field = |i: usize| caps.get(i)?.as_str().parse::<u64>().ok();
    Some(field(1)? * 3600 + field(2)? * 60 + field(3)?)
}

fn clamp_percent(value: f64) -> f64 {
    value.clamp(0.0, 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentage_from_status_line() {
        let matcher = PercentageMatcher::new();
        assert_eq!(
            matcher.observe("[download]  25.0% of 10.00MiB at 1.21MiB/s ETA 00:06"),
            Some(25.0)
        );
        assert_eq!(matcher.observe("[download] 100% of 3.2MiB"), Some(100.0));
        assert_eq!(matcher.observe("[download] Destination: song.webm"), None);
        assert_eq!(matcher.observe("[youtube] abc: Downloading webpage"), None);
    }

    #[test]
    fn test_percentage_is_clamped() {
        let matcher = PercentageMatcher::new();
        assert_eq!(matcher.observe("[download]  130.5%"), Some(100.0));
    }

    #[test]
    fn test_time_ratio_needs_duration_first() {
        let mut matcher = TimeRatioMatcher::new();
        assert_eq!(matcher.observe("size=  10kB time=00:00:05.00 bitrate=1k"), None);

        assert_eq!(
            matcher.observe("  Duration: 00:01:40.00, start: 0.000000, bitrate: 320 kb/s"),
            None
        );
        assert_eq!(matcher.total_secs(), Some(100));

        assert_eq!(
            matcher.observe("frame=  10 size=  512kB time=00:00:25.50 bitrate= 164.5kbits/s speed=2x"),
            Some(25.0)
        );
    }

    #[test]
    fn test_time_ratio_keeps_first_duration() {
        let mut matcher = TimeRatioMatcher::new();
        matcher.observe("Duration: 00:00:10.00");
        matcher.observe("Duration: 01:00:00.00");
        assert_eq!(matcher.total_secs(), Some(10));
        assert_eq!(matcher.observe("time=00:00:05.00"), Some(50.0));
    }

    #[test]
    fn test_still_image_input_masks_audio_duration() {
        let mut matcher = TimeRatioMatcher::new();
        matcher.observe("Input #0, image2, from 'cover.jpg':");
        matcher.observe("  Duration: 00:00:00.04, start: 0.000000, bitrate: 9000 kb/s");
        matcher.observe("Input #1, mp3, from 'song.mp3':");
        matcher.observe("  Duration: 00:03:00.00, start: 0.000000, bitrate: 320 kb/s");
        assert_eq!(matcher.total_secs(), Some(0));
        assert_eq!(matcher.observe("time=00:01:30.00"), None);
    }

    #[test]
    fn test_time_ratio_end_and_overshoot() {
        let mut matcher = TimeRatioMatcher::new();
        matcher.observe("Duration: 00:02:00.00");
        assert_eq!(matcher.observe("time=00:02:00.00"), Some(100.0));
        assert_eq!(matcher.observe("time=00:02:07.31"), Some(100.0));
    }

    #[test]
    fn test_time_ratio_over_many_pairs() {
        for total in [1u64, 59, 61, 3599, 3601, 86_399] {
            for elapsed in [0u64, total / 3, total / 2, total, total + 1] {
                let mut matcher = TimeRatioMatcher::new();
                matcher.observe(&format!("Duration: {}", hms(total)));
                let got = matcher.observe(&format!("time={}", hms(elapsed))).unwrap();
                let expected = (elapsed as f64 / total as f64 * 100.0).clamp(0.0, 100.0);
                assert!((got - expected).abs() < 1e-9, "{elapsed}/{total}");
            }
        }
    }

    fn hms(secs: u64) -> String {
        format!("{:02}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
    }

    #[test]
    fn test_zero_duration_reports_nothing() {
        let mut matcher = TimeRatioMatcher::new();
        matcher.observe("Duration: 00:00:00.04");
        assert_eq!(matcher.observe("time=00:00:00.04"), None);
    }

    #[test]
    fn test_unavailable_duration_reports_nothing() {
        let mut matcher = TimeRatioMatcher::new();
        matcher.observe("  Duration: N/A, bitrate: N/A");
        assert_eq!(matcher.observe("time=00:00:03.00"), None);
    }

    #[test]
    fn test_monitor_dispatch() {
        let mut silent = ProgressMonitor::default();
        assert_eq!(silent.observe("[download]  50.0%"), None);

        let mut percent = ProgressMonitor::percentage();
        assert_eq!(percent.observe("[download]  50.0%"), Some(50.0));
        assert_eq!(percent.observe("time=00:00:01.00"), None);

        let mut ratio = ProgressMonitor::time_ratio();
        assert_eq!(ratio.observe("[download]  50.0%"), None);
    }
}
