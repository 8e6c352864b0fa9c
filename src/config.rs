use std::time::Duration;

/// Application-level constants
pub const APP_NAME: &str = "Veridose";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default tracing filter when RUST_LOG is not set.
pub fn default_log_filter() -> String {
    "info,veridose=debug".to_string()
}

/// Scoring thresholds used by the field-matching ladder.
pub mod scoring {
    /// Score assigned when the expected value appears as a substring of the
    /// extracted text (labels print extra words around fields).
    pub const SUBSTRING_SCORE: f32 = 0.90;

    /// Minimum token-set intersection-over-union that counts as a match.
    pub const TOKEN_OVERLAP_THRESHOLD: f32 = 0.60;

    /// Score assigned when only the leading numeric values agree (dosage and
    /// time fields, after unit stripping).
    pub const NUMERIC_SCORE: f32 = 0.80;

    /// Final gate of the ladder: minimum Levenshtein similarity to pass.
    pub const PASS_THRESHOLD: f32 = 0.75;
}

/// Retry caps for a capture session. The two counters are independent;
/// either one reaching its cap routes the session to manual confirmation.
pub mod retries {
    /// Validation attempts (label read, but fields did not match).
    pub const MAX_VALIDATION_ATTEMPTS: u8 = 3;

    /// No-label strikes (no usable text within the capture window).
    pub const MAX_NO_LABEL_STRIKES: u8 = 3;
}

/// Adherence drift windows, in minutes from the scheduled dose time.
pub mod adherence {
    /// Within this drift a dose counts as taken on time.
    pub const ON_TIME_WINDOW_MIN: i64 = 60;

    /// Between the on-time window and this bound the dose is accepted but
    /// flagged late. Beyond it, the dose is outside the window entirely;
    /// label verification still proceeds; timeliness never gates pass/fail.
    pub const LATE_WINDOW_MIN: i64 = 120;
}

/// Timing knobs for the capture driver. Grouped in a struct so tests can
/// shrink the windows without touching real-time constants.
#[derive(Debug, Clone)]
pub struct CaptureTiming {
    /// Continuous auto-capture: how long to keep trying for a frame with
    /// recognizable text before counting a no-label strike.
    pub no_label_window: Duration,
    /// Hard cap on a single recognition call. A stuck backend must not
    /// block the whole session.
    pub recognition_cap: Duration,
    /// Minimum spacing between auto-capture attempts (rate limit on OCR
    /// invocation cost, not a correctness requirement).
    pub capture_throttle: Duration,
    /// Pause before re-arming capture after a failed validation.
    pub retry_delay: Duration,
}

impl Default for CaptureTiming {
    fn default() -> Self {
        Self {
            no_label_window: Duration::from_secs(30),
            recognition_cap: Duration::from_secs(10),
            capture_throttle: Duration::from_secs(2),
            retry_delay: Duration::from_millis(500),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn app_name_is_veridose() {
        assert_eq!(APP_NAME, "Veridose");
    }

    #[test]
    fn app_version_matches_cargo() {
        assert_eq!(APP_VERSION, "0.4.0");
    }

    #[test]
    fn default_filter_enables_crate_debug() {
        assert!(default_log_filter().contains("veridose=debug"));
    }

    #[test]
    fn scoring_ladder_is_ordered() {
        assert!(scoring::PASS_THRESHOLD < scoring::NUMERIC_SCORE);
        assert!(scoring::NUMERIC_SCORE < scoring::SUBSTRING_SCORE);
        assert!(scoring::SUBSTRING_SCORE < 1.0);
        assert!(scoring::TOKEN_OVERLAP_THRESHOLD < scoring::PASS_THRESHOLD);
    }

    #[test]
    fn adherence_windows_nested() {
        assert!(adherence::ON_TIME_WINDOW_MIN < adherence::LATE_WINDOW_MIN);
    }

    #[test]
    fn recognition_cap_fits_inside_no_label_window() {
        let timing = CaptureTiming::default();
        assert!(timing.recognition_cap < timing.no_label_window);
        assert!(timing.capture_throttle < timing.recognition_cap);
    }
}
