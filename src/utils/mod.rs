use std::time::{Duration, Instant};
use tracing::info;

/// Shown wherever a figure is unknown.
pub const PLACEHOLDER: &str = "-";

/// A simple wall-clock timer for logging elapsed time.
pub struct Timer {
    label: String,
    start: Instant,
}

impl Timer {
    pub fn start(label: impl Into<String>) -> Self {
        let label = label.into();
        info!("⏱  Starting: {}", label);
        Self {
            label,
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        info!(
            "⏱  Finished: {} (took {:.2?})",
            self.label,
            self.elapsed()
        );
    }
}

/// Format with a fixed number of decimals and thousands separators.
/// 1234567.89 → "1,234,567.9" (1 decimal)
pub fn fmt_grouped(v: f64, decimals: usize) -> String {
    let fixed = format!("{:.*}", decimals, v.abs());
    let (int_part, frac_part) = match fixed.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (fixed.as_str(), None),
    };

    let mut grouped = String::new();
    for (i, ch) in int_part.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    if v.is_sign_negative() {
        grouped.push('-');
    }

    let mut result: String = grouped.chars().rev().collect();
    if let Some(frac) = frac_part {
        result.push('.');
        result.push_str(frac);
    }
    result
}

/// "₹ 1,234.5 cr", or the placeholder.
pub fn fmt_money_cr(v: Option<f64>) -> String {
    match v {
        Some(v) => format!("₹ {} cr", fmt_grouped(v, 1)),
        None => PLACEHOLDER.to_string(),
    }
}

/// "18.2 %", or the placeholder.
pub fn fmt_pct(v: Option<f64>) -> String {
    match v {
        Some(v) => format!("{:.1} %", v),
        None => PLACEHOLDER.to_string(),
    }
}

/// One decimal, no grouping; empty when unknown. Used for CSV cells.
pub fn fmt_one_decimal(v: Option<f64>) -> String {
    v.map(|v| format!("{:.1}", v)).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fmt_grouped() {
        assert_eq!(fmt_grouped(1_234_567.0, 0), "1,234,567");
        assert_eq!(fmt_grouped(0.0, 1), "0.0");
        assert_eq!(fmt_grouped(-42_000.31, 1), "-42,000.3");
        assert_eq!(fmt_grouped(999.96, 1), "1,000.0");
        assert_eq!(fmt_grouped(480.0, 1), "480.0");
    }

    #[test]
    fn test_money_and_pct() {
        assert_eq!(fmt_money_cr(Some(480.0)), "₹ 480.0 cr");
        assert_eq!(fmt_money_cr(Some(12_345.67)), "₹ 12,345.7 cr");
        assert_eq!(fmt_money_cr(None), "-");
        assert_eq!(fmt_pct(Some(18.24)), "18.2 %");
        assert_eq!(fmt_pct(Some(-3.0)), "-3.0 %");
        assert_eq!(fmt_pct(None), "-");
        assert_eq!(fmt_one_decimal(Some(12.0)), "12.0");
        assert_eq!(fmt_one_decimal(None), "");
    }
}
