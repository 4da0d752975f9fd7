//! Margin derivation from absolute figures.

/// Margin in percent: the explicit figure when supplied, otherwise
/// `numerator / sales * 100` when both are known and sales is positive.
pub fn derive_margin(explicit: Option<f64>, numerator: Option<f64>, sales: Option<f64>) -> Option<f64> {
    if explicit.is_some() {
        return explicit;
    }
    match (numerator, sales) {
        (Some(n), Some(s)) if s > 0.0 => Some(n / s * 100.0),
        _ => None,
    }
}
