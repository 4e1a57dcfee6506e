//! Human-readable time formatting and duration parsing.

use crate::error::ValidationError;

/// `MM:SS`. Minutes are not wrapped into hours.
pub fn format_clock(secs: u64) -> String {
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

/// Coarse wording: "1 second", "40 seconds", "1 minute", "25 minutes".
pub fn format_duration(secs: u64) -> String {
    match secs / 60 {
        0 if secs == 1 => "1 second".to_string(),
        0 => format!("{secs} seconds"),
        1 => "1 minute".to_string(),
        minutes => format!("{minutes} minutes"),
    }
}

/// Remaining time as shown by a front end.
///
/// | show_seconds | compact | 330 s    |
/// |--------------|---------|----------|
/// | true         | false   | `05:30`  |
/// | false        | false   | `05:00`  |
/// | true         | true    | `5m 30s` |
/// | false        | true    | `5m`     |
pub fn format_display(secs: u64, show_seconds: bool, compact: bool) -> String {
    let minutes = secs / 60;
    let seconds = secs % 60;
    match (compact, show_seconds) {
        (true, false) => format!("{minutes}m"),
        (true, true) if seconds > 0 => format!("{minutes}m {seconds}s"),
        (true, true) => format!("{minutes}m"),
        (false, true) => format_clock(secs),
        (false, false) => format!("{minutes:02}:00"),
    }
}

/// Shortest useful form: "45s", "5m 30s", "1h 5m".
pub fn format_contextual(secs: u64) -> String {
    if secs < 60 {
        return format!("{secs}s");
    }
    let minutes = secs / 60;
    let seconds = secs % 60;
    if minutes < 60 {
        return if seconds > 0 {
            format!("{minutes}m {seconds}s")
        } else {
            format!("{minutes}m")
        };
    }
    let hours = minutes / 60;
    let minutes = minutes % 60;
    if minutes > 0 {
        format!("{hours}h {minutes}m")
    } else {
        format!("{hours}h")
    }
}

/// Share of `total` already elapsed, in percent, clamped to `0..=100`.
pub fn progress_pct(remaining: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let elapsed = total.saturating_sub(remaining) as f64;
    (elapsed / total as f64 * 100.0).clamp(0.0, 100.0)
}

/// Parse `MM:SS`, `25m`, `90s`, `1h`, `1h 30m`, `1h30m15s` or a bare number
/// of minutes.
///
/// # Errors
///
/// Returns [`ValidationError::InvalidDuration`] for anything else.
pub fn parse_duration(input: &str) -> Result<u64, ValidationError> {
    let trimmed = input.trim().to_ascii_lowercase();
    let invalid = || ValidationError::InvalidDuration(input.to_string());
    if trimmed.is_empty() {
        return Err(invalid());
    }

    if let Some((minutes, seconds)) = trimmed.split_once(':') {
        let minutes: u64 = parse_digits(minutes).ok_or_else(invalid)?;
        let seconds: u64 = parse_digits(seconds).ok_or_else(invalid)?;
        if seconds >= 60 || minutes > 99 {
            return Err(invalid());
        }
        return Ok(minutes * 60 + seconds);
    }

    if let Some(minutes) = parse_digits(&trimmed) {
        return minutes.checked_mul(60).ok_or_else(invalid);
    }

    let mut total: u64 = 0;
    let mut digits = String::new();
    // Units must appear in h, m, s order, each at most once.
    let mut last_unit = 0u8;
    for c in trimmed.chars() {
        match c {
            '0'..='9' => digits.push(c),
            'h' | 'm' | 's' => {
                let (rank, scale) = match c {
                    'h' => (1, 3600),
                    'm' => (2, 60),
                    _ => (3, 1),
                };
                if digits.is_empty() || rank <= last_unit {
                    return Err(invalid());
                }
                let value = parse_digits(&digits).ok_or_else(invalid)?;
                total = value
                    .checked_mul(scale)
                    .and_then(|v| total.checked_add(v))
                    .ok_or_else(invalid)?;
                digits.clear();
                last_unit = rank;
            }
            c if c.is_whitespace() && digits.is_empty() => {}
            _ => return Err(invalid()),
        }
    }
    if !digits.is_empty() {
        return Err(invalid());
    }
    Ok(total)
}

fn parse_digits(s: &str) -> Option<u64> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn clock_pads_both_fields() {
        assert_eq!(format_clock(0), "00:00");
        assert_eq!(format_clock(1500), "25:00");
        assert_eq!(format_clock(65), "01:05");
        assert_eq!(format_clock(6000), "100:00");
    }

    #[test]
    fn duration_wording() {
        assert_eq!(format_duration(1), "1 second");
        assert_eq!(format_duration(45), "45 seconds");
        assert_eq!(format_duration(0), "0 seconds");
        assert_eq!(format_duration(60), "1 minute");
        assert_eq!(format_duration(119), "1 minute");
        assert_eq!(format_duration(1500), "25 minutes");
    }

    #[test]
    fn display_variants() {
        assert_eq!(format_display(330, true, false), "05:30");
        assert_eq!(format_display(330, false, false), "05:00");
        assert_eq!(format_display(330, true, true), "5m 30s");
        assert_eq!(format_display(300, true, true), "5m");
        assert_eq!(format_display(330, false, true), "5m");
    }

    #[test]
    fn contextual_forms() {
        assert_eq!(format_contextual(45), "45s");
        assert_eq!(format_contextual(330), "5m 30s");
        assert_eq!(format_contextual(300), "5m");
        assert_eq!(format_contextual(3900), "1h 5m");
        assert_eq!(format_contextual(7200), "2h");
    }

    #[test]
    fn progress_is_clamped() {
        assert_eq!(progress_pct(1500, 1500), 0.0);
        assert_eq!(progress_pct(750, 1500), 50.0);
        assert_eq!(progress_pct(0, 1500), 100.0);
        assert_eq!(progress_pct(2000, 1500), 0.0);
        assert_eq!(progress_pct(10, 0), 0.0);
    }

    #[test]
    fn parses_supported_forms() {
        assert_eq!(parse_duration("25:00").unwrap(), 1500);
        assert_eq!(parse_duration("5:30").unwrap(), 330);
        assert_eq!(parse_duration("25m").unwrap(), 1500);
        assert_eq!(parse_duration("90s").unwrap(), 90);
        assert_eq!(parse_duration("1h").unwrap(), 3600);
        assert_eq!(parse_duration("1h 30m").unwrap(), 5400);
        assert_eq!(parse_duration("1h30m15s").unwrap(), 5415);
        assert_eq!(parse_duration(" 2M ").unwrap(), 120);
        assert_eq!(parse_duration("25").unwrap(), 1500);
    }

    #[test]
    fn rejects_garbage() {
        for input in ["", "abc", "5:75", "m", "30m 1h", "1h 1h", "10x", "5m3", "1:2:3", "-5m"] {
            assert!(
                matches!(parse_duration(input), Err(ValidationError::InvalidDuration(_))),
                "accepted {input:?}"
            );
        }
    }

    proptest! {
        #[test]
        fn clock_output_parses_back(secs in 0u64..6000) {
            prop_assert_eq!(parse_duration(&format_clock(secs)).unwrap(), secs);
        }

        #[test]
        fn contextual_output_parses_back_for_sub_hour(secs in 0u64..3600) {
            prop_assert_eq!(parse_duration(&format_contextual(secs)).unwrap(), secs);
        }

        #[test]
        fn progress_stays_in_range(remaining in 0u64..10_000, total in 0u64..10_000) {
            let pct = progress_pct(remaining, total);
            prop_assert!((0.0..=100.0).contains(&pct));
        }
    }
}
