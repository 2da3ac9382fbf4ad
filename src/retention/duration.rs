//! Compact duration expressions such as `14d`, `1y6mo` or `2h30m`.
//!
//! Expressions are a run of `<number><unit>` chunks with no separators. Units
//! are `y`, `mo`, `w`, `d`, `h`, `m` and `s`; numbers may be fractional. The
//! only ambiguity in the grammar is `m` (minutes) versus the `m` of `mo`
//! (months): `mo` always wins, and a bare `m` touching an `o` on either side
//! does not end a chunk. Its digits carry over to the next unit, or count as
//! minutes when that `m` is the last character (`5om` is five minutes).
//!
//! Units use fixed weights (a year is 365 days, a month is 30 days), so the
//! result is an approximate span rather than a calendar-aware one.

pub const SECS_PER_MINUTE: u64 = 60;
pub const SECS_PER_HOUR: u64 = 3_600;
pub const SECS_PER_DAY: u64 = 86_400;
pub const SECS_PER_WEEK: u64 = 604_800;
pub const SECS_PER_MONTH: u64 = 2_592_000;
pub const SECS_PER_YEAR: u64 = 31_536_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Unit {
    Year,
    Month,
    Week,
    Day,
    Hour,
    Minute,
    Second,
}

impl Unit {
    const ALL: [Unit; 7] = [
        Unit::Year,
        Unit::Month,
        Unit::Week,
        Unit::Day,
        Unit::Hour,
        Unit::Minute,
        Unit::Second,
    ];

    fn seconds(self) -> u64 {
        match self {
            Unit::Year => SECS_PER_YEAR,
            Unit::Month => SECS_PER_MONTH,
            Unit::Week => SECS_PER_WEEK,
            Unit::Day => SECS_PER_DAY,
            Unit::Hour => SECS_PER_HOUR,
            Unit::Minute => SECS_PER_MINUTE,
            Unit::Second => 1,
        }
    }

    fn slot(self) -> usize {
        self as usize
    }
}

/// Parse a duration expression into whole seconds.
///
/// Never fails: an absent, empty or `"0"` expression, or one with no
/// recognisable `<number><unit>` chunk, yields `0` (disabled). When a unit
/// appears more than once the last occurrence wins.
pub fn parse_duration(expression: Option<&str>) -> u64 {
    let Some(raw) = expression else {
        return 0;
    };
    if raw.is_empty() || raw == "0" {
        return 0;
    }

    let normalized = raw.to_lowercase();
    let mut magnitudes: [Option<f64>; 7] = [None; 7];
    for (unit, magnitude) in chunks(normalized.trim()) {
        magnitudes[unit.slot()] = Some(magnitude);
    }

    let total: f64 = Unit::ALL
        .iter()
        .zip(magnitudes)
        .filter_map(|(unit, magnitude)| magnitude.map(|m| m * unit.seconds() as f64))
        .sum();

    // Float-to-int `as` saturates and maps NaN to zero.
    total as u64
}

/// Split an expression into `(unit, magnitude)` chunks, in input order.
///
/// A chunk ends at each recognised unit token. Its magnitude is made of the
/// digits and dots seen since the previous token; any other character is
/// ignored. Chunks whose magnitude is empty or does not parse are dropped, so
/// they never override an earlier value for the same unit.
fn chunks(input: &str) -> Vec<(Unit, f64)> {
    let chars: Vec<char> = input.chars().collect();
    let mut out = Vec::new();
    let mut digits = String::new();
    let mut pos = 0;

    while pos < chars.len() {
        let Some((unit, width)) = unit_at(&chars, pos) else {
            let c = chars[pos];
            if c.is_ascii_digit() || c == '.' {
                digits.push(c);
            }
            pos += 1;
            continue;
        };
        pos += width;

        if let Ok(magnitude) = digits.parse::<f64>() {
            out.push((unit, magnitude));
        }
        digits.clear();
    }

    // An unsplit final chunk still ends in `m`.
    if chars.last() == Some(&'m')
        && let Ok(magnitude) = digits.parse::<f64>()
    {
        out.push((Unit::Minute, magnitude));
    }

    out
}

/// Recognise a unit token starting at `pos`, returning it with its width.
fn unit_at(chars: &[char], pos: usize) -> Option<(Unit, usize)> {
    match chars[pos] {
        'm' if chars.get(pos + 1) == Some(&'o') => Some((Unit::Month, 2)),
        'm' if pos > 0 && chars[pos - 1] == 'o' => None,
        'm' => Some((Unit::Minute, 1)),
        'y' => Some((Unit::Year, 1)),
        'w' => Some((Unit::Week, 1)),
        'd' => Some((Unit::Day, 1)),
        'h' => Some((Unit::Hour, 1)),
        's' => Some((Unit::Second, 1)),
        _ => None,
    }
}

/// Render a second count as a single floor-rounded unit, e.g. `"2 years"`.
///
/// Lossy; only used for progress messages. Anything
/// under a minute renders as `"0 minutes"`.
pub fn format_duration(seconds: u64) -> String {
    let (count, label) = if seconds >= SECS_PER_YEAR {
        (seconds / SECS_PER_YEAR, "year")
    } else if seconds >= SECS_PER_MONTH {
        (seconds / SECS_PER_MONTH, "month")
    } else if seconds >= SECS_PER_WEEK {
        (seconds / SECS_PER_WEEK, "week")
    } else if seconds >= SECS_PER_DAY {
        (seconds / SECS_PER_DAY, "day")
    } else if seconds >= SECS_PER_HOUR {
        (seconds / SECS_PER_HOUR, "hour")
    } else {
        (seconds / SECS_PER_MINUTE, "minute")
    };

    if count == 1 {
        format!("{count} {label}")
    } else {
        format!("{count} {label}s")
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case::days("14d", 1_209_600)]
    #[case::year("1y", 31_536_000)]
    #[case::month("1mo", 2_592_000)]
    #[case::year_and_months("1y6mo", 47_088_000)]
    #[case::minutes("5m", 300)]
    #[case::months("5mo", 12_960_000)]
    #[case::hours_and_minutes("2h30m", 9_000)]
    #[case::seconds("45s", 45)]
    #[case::weeks("2w", 1_209_600)]
    #[case::fractional_days("1.5d", 129_600)]
    #[case::everything("1y1mo1w1d1h1m1s", 31_536_000 + 2_592_000 + 604_800 + 86_400 + 3_600 + 60 + 1)]
    fn test_parse_duration(#[case] input: &str, #[case] expected: u64) {
        assert_eq!(parse_duration(Some(input)), expected, "input {input:?}");
    }

    #[rstest]
    #[case::zero("0")]
    #[case::empty("")]
    #[case::whitespace("   ")]
    #[case::no_units("42")]
    #[case::unit_without_number("d")]
    #[case::garbage("forever")]
    fn test_parse_duration_disabled(#[case] input: &str) {
        assert_eq!(parse_duration(Some(input)), 0, "input {input:?}");
    }

    #[test]
    fn test_parse_duration_absent() {
        assert_eq!(parse_duration(None), 0);
    }

    #[test]
    fn test_case_and_whitespace_are_normalized() {
        assert_eq!(parse_duration(Some("  14D ")), parse_duration(Some("14d")));
        assert_eq!(parse_duration(Some("1Y6MO")), 47_088_000);
    }

    #[test]
    fn test_last_occurrence_of_a_unit_wins() {
        assert_eq!(parse_duration(Some("1d2d")), parse_duration(Some("2d")));
        assert_eq!(parse_duration(Some("3h1d1h")), SECS_PER_DAY + SECS_PER_HOUR);
    }

    #[test]
    fn test_empty_magnitude_does_not_reset_unit() {
        // The second `d` has no number, so the first value stands.
        assert_eq!(parse_duration(Some("3dd")), 3 * SECS_PER_DAY);
    }

    #[test]
    fn test_malformed_magnitude_is_skipped() {
        assert_eq!(parse_duration(Some("1.2.3d4h")), 4 * SECS_PER_HOUR);
    }

    #[test]
    fn test_minute_is_not_confused_with_month() {
        assert_eq!(parse_duration(Some("5m")), 300);
        assert_eq!(parse_duration(Some("5mo")), 5 * SECS_PER_MONTH);
        assert_ne!(parse_duration(Some("5m")), parse_duration(Some("5mo")));
        // Month and minute side by side.
        assert_eq!(parse_duration(Some("1mo5m")), SECS_PER_MONTH + 300);
    }

    #[test]
    fn test_m_after_o_is_not_a_unit() {
        // "om" is neither minutes nor months; the number carries to the next unit.
        assert_eq!(parse_duration(Some("5omd")), 5 * SECS_PER_DAY);
    }

    #[rstest]
    #[case::alone("5om", 300)]
    #[case::after_months("7mo3om", 18_144_180)]
    #[case::overrides_earlier_minutes(" 9m1om", 60)]
    fn test_trailing_m_after_o_counts_as_minutes(#[case] input: &str, #[case] expected: u64) {
        assert_eq!(parse_duration(Some(input)), expected, "input {input:?}");
    }

    #[test]
    fn test_trailing_characters_are_ignored() {
        assert_eq!(parse_duration(Some("14days")), 14 * SECS_PER_DAY);
        assert_eq!(parse_duration(Some("2mon")), 2 * SECS_PER_MONTH);
        assert_eq!(parse_duration(Some("7d3")), 7 * SECS_PER_DAY);
    }

    #[rstest]
    #[case::one_year(31_536_000, "1 year")]
    #[case::two_years(63_072_000, "2 years")]
    #[case::just_under_a_year(31_535_999, "12 months")]
    #[case::one_month(2_592_000, "1 month")]
    #[case::three_weeks(1_814_400, "3 weeks")]
    #[case::one_day(86_400, "1 day")]
    #[case::twelve_hours(43_200, "12 hours")]
    #[case::one_hour(3_600, "1 hour")]
    #[case::two_minutes(120, "2 minutes")]
    #[case::one_minute(60, "1 minute")]
    #[case::under_a_minute(59, "0 minutes")]
    #[case::zero(0, "0 minutes")]
    fn test_format_duration(#[case] seconds: u64, #[case] expected: &str) {
        assert_eq!(format_duration(seconds), expected);
    }

    #[test]
    fn test_format_floors_to_largest_unit() {
        // 1y6mo renders as whole years only.
        assert_eq!(format_duration(parse_duration(Some("1y6mo"))), "1 year");
    }
}
