//! Reporting-period label parsers.
//!
//! Both parsers return `None` for anything they cannot read; `None` orders
//! before every date, so an unreadable label loses every recency comparison.

use chrono::NaiveDate;
use regex::Regex;
use std::sync::LazyLock;

static MONTH_YEAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Za-z]{3})-?(\d{4})").expect("valid month-year pattern"));

static DAY_MONTH_YEAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d{1,2})-([A-Za-z]{3})-(\d{4})").expect("valid day-month-year pattern")
});

fn month_number(abbrev: &str) -> Option<u32> {
    let m = match abbrev.to_ascii_lowercase().as_str() {
        "jan" => 1,
        "feb" => 2,
        "mar" => 3,
        "apr" => 4,
        "may" => 5,
        "jun" => 6,
        "jul" => 7,
        "aug" => 8,
        "sep" => 9,
        "oct" => 10,
        "nov" => 11,
        "dec" => 12,
        _ => return None,
    };
    Some(m)
}

/// "Jun2025" / "Jun-2025" → 2025-06-01.
pub fn parse_month_label(label: &str) -> Option<NaiveDate> {
    let caps = MONTH_YEAR.captures(label.trim())?;
    let month = month_number(&caps[1])?;
    let year: i32 = caps[2].parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, 1)
}

/// "Quarter ended 30-Jun-2025" → 2025-06-30. The date may sit anywhere in the label.
pub fn parse_results_label(label: &str) -> Option<NaiveDate> {
    let caps = DAY_MONTH_YEAR.captures(label)?;
    let day: u32 = caps[1].parse().ok()?;
    let month = month_number(&caps[2])?;
    let year: i32 = caps[3].parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;

    #[test]
    fn test_month_label_forms_agree() {
        let a = parse_month_label("Jun2025").unwrap();
        let b = parse_month_label("Jun-2025").unwrap();
        assert_eq!(a, b);
        assert_eq!((a.year(), a.month()), (2025, 6));
        assert_eq!(parse_month_label(" dec-2024 "), NaiveDate::from_ymd_opt(2024, 12, 1));
    }

    #[test]
    fn test_month_label_rejects_other_strings() {
        for label in ["", "actual", "June2025", "2025-06", "Q1FY26", "Xyz2025", "Jun 2025"] {
            assert_eq!(parse_month_label(label), None, "{label}");
        }
    }

    #[test]
    fn test_results_label_recovers_exact_date() {
        assert_eq!(
            parse_results_label("30-Jun-2025"),
            NaiveDate::from_ymd_opt(2025, 6, 30)
        );
        assert_eq!(
            parse_results_label("5-Jan-2024"),
            NaiveDate::from_ymd_opt(2024, 1, 5)
        );
        assert_eq!(
            parse_results_label("Quarter ended 31-Mar-2025"),
            NaiveDate::from_ymd_opt(2025, 3, 31)
        );
    }

    #[test]
    fn test_results_label_bad_dates_are_unknown() {
        assert_eq!(parse_results_label("31-Jun-2025"), None);
        assert_eq!(parse_results_label("Quarter ended June 2025"), None);
        assert_eq!(parse_results_label(""), None);
    }

    #[test]
    fn test_unknown_sorts_first() {
        let mut keys = vec![parse_month_label("Mar2025"), parse_month_label("bogus")];
        keys.sort();
        assert_eq!(keys[0], None);
    }
}
