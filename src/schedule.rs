//! Dose-schedule helpers — display-time handling and adherence drift.
//!
//! Labels print schedule times as locale display strings ("9:00 AM"), so
//! the expected time handed to validation must be formatted the same way,
//! in the patient's stored timezone. Lateness is a separate concern from
//! label correctness: [`classify_timeliness`] feeds the success record,
//! never the pass/fail verdict.

use std::sync::OnceLock;

use chrono::{DateTime, FixedOffset, NaiveTime, Utc};
use regex::Regex;

use crate::config::adherence;
use crate::models::Timeliness;

/// Format a scheduled dose instant the way it is printed on labels
/// ("9:00 AM"). The caller applies the patient's timezone offset first.
pub fn format_display_time(dt: DateTime<FixedOffset>) -> String {
    dt.format("%l:%M %p").to_string().trim_start().to_string()
}

/// Parse a printed time token. Tolerant of "9:00 AM", "09:00", "9.00pm",
/// "9:00 a.m." forms; returns None when no time-shaped token is present.
pub fn parse_display_time(s: &str) -> Option<NaiveTime> {
    static TIME_RE: OnceLock<Regex> = OnceLock::new();
    let re = TIME_RE.get_or_init(|| {
        Regex::new(r"(?i)\b(\d{1,2})[:.](\d{2})\s*(a\.?m\.?|p\.?m\.?)?").expect("valid time regex")
    });

    let caps = re.captures(s)?;
    let hour: u32 = caps[1].parse().ok()?;
    let minute: u32 = caps[2].parse().ok()?;
    let marker = caps
        .get(3)
        .map(|m| m.as_str().to_lowercase().replace('.', ""));

    let hour = match marker.as_deref() {
        Some("pm") if hour < 12 => hour + 12,
        Some("am") if hour == 12 => 0,
        Some(_) | None => hour,
    };

    NaiveTime::from_hms_opt(hour, minute, 0)
}

/// Classify how far a verified dose drifted from its schedule. Absolute
/// drift ≤ 60 min is on time, ≤ 120 min is late, beyond that the dose is
/// outside the window, still recorded, never blocked.
pub fn classify_timeliness(scheduled: DateTime<Utc>, observed: DateTime<Utc>) -> Timeliness {
    let drift_min = (observed - scheduled).num_minutes().abs();
    if drift_min <= adherence::ON_TIME_WINDOW_MIN {
        Timeliness::OnTime
    } else if drift_min <= adherence::LATE_WINDOW_MIN {
        Timeliness::Late
    } else {
        Timeliness::OutsideWindow
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn formats_morning_display_time() {
        let offset = FixedOffset::west_opt(5 * 3600).unwrap();
        let dt = offset.with_ymd_and_hms(2026, 8, 6, 9, 0, 0).unwrap();
        assert_eq!(format_display_time(dt), "9:00 AM");
    }

    #[test]
    fn formats_evening_display_time() {
        let offset = FixedOffset::east_opt(3600).unwrap();
        let dt = offset.with_ymd_and_hms(2026, 8, 6, 21, 30, 0).unwrap();
        assert_eq!(format_display_time(dt), "9:30 PM");
    }

    #[test]
    fn parses_twelve_hour_forms() {
        let nine = NaiveTime::from_hms_opt(9, 0, 0).unwrap();
        assert_eq!(parse_display_time("9:00 AM"), Some(nine));
        assert_eq!(parse_display_time("9:00 a.m."), Some(nine));
        assert_eq!(parse_display_time("9.00am"), Some(nine));
    }

    #[test]
    fn parses_twenty_four_hour_forms() {
        assert_eq!(
            parse_display_time("21:30"),
            NaiveTime::from_hms_opt(21, 30, 0)
        );
        assert_eq!(
            parse_display_time("09:00"),
            NaiveTime::from_hms_opt(9, 0, 0)
        );
    }

    #[test]
    fn pm_marker_shifts_hour() {
        assert_eq!(
            parse_display_time("9:00 PM"),
            NaiveTime::from_hms_opt(21, 0, 0)
        );
        // 12 AM is midnight, 12 PM stays noon
        assert_eq!(
            parse_display_time("12:15 AM"),
            NaiveTime::from_hms_opt(0, 15, 0)
        );
        assert_eq!(
            parse_display_time("12:15 PM"),
            NaiveTime::from_hms_opt(12, 15, 0)
        );
    }

    #[test]
    fn finds_time_inside_label_line() {
        assert_eq!(
            parse_display_time("TAKE AT 8:00 PM WITH FOOD"),
            NaiveTime::from_hms_opt(20, 0, 0)
        );
    }

    #[test]
    fn rejects_non_times() {
        assert_eq!(parse_display_time("no time here"), None);
        assert_eq!(parse_display_time("lot 394812"), None);
        assert_eq!(parse_display_time("99:99"), None);
    }

    #[test]
    fn timeliness_bands() {
        let scheduled = Utc.with_ymd_and_hms(2026, 8, 6, 9, 0, 0).unwrap();

        let observed = scheduled + Duration::minutes(45);
        assert_eq!(classify_timeliness(scheduled, observed), Timeliness::OnTime);

        let observed = scheduled + Duration::minutes(60);
        assert_eq!(classify_timeliness(scheduled, observed), Timeliness::OnTime);

        let observed = scheduled + Duration::minutes(61);
        assert_eq!(classify_timeliness(scheduled, observed), Timeliness::Late);

        let observed = scheduled + Duration::minutes(120);
        assert_eq!(classify_timeliness(scheduled, observed), Timeliness::Late);

        let observed = scheduled + Duration::minutes(121);
        assert_eq!(
            classify_timeliness(scheduled, observed),
            Timeliness::OutsideWindow
        );
    }

    #[test]
    fn early_doses_classify_by_absolute_drift() {
        let scheduled = Utc.with_ymd_and_hms(2026, 8, 6, 9, 0, 0).unwrap();
        let observed = scheduled - Duration::minutes(90);
        assert_eq!(classify_timeliness(scheduled, observed), Timeliness::Late);
    }
}
