//! Numeric parsing and currency-unit normalisation. Canonical unit: ₹ crore.

use serde_json::Value;

/// Numeric value of a JSON scalar: numbers, or strings that parse as numbers.
/// Anything else (including NaN/inf) is unknown.
pub fn to_number(v: &Value) -> Option<f64> {
    let n = match v {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

/// Multiplier that takes a value in `unit` to crores.
/// Absent or unrecognised labels are assumed to be crores already.
pub fn crore_factor(unit: Option<&str>) -> f64 {
    let u = unit.unwrap_or("").trim().to_lowercase();
    match u.as_str() {
        "cr" | "crore" | "crores" | "₹ cr" | "inr cr" => 1.0,
        "mn" | "million" | "millions" => 0.1,
        "bn" | "billion" | "billions" => 100.0,
        _ => 1.0,
    }
}

/// Normalise a raw value tagged with `unit` into crores.
/// "1,200" is not numeric here: grouping commas are not stripped.
pub fn to_crores(v: &Value, unit: Option<&str>) -> Option<f64> {
    to_number(v).map(|n| n * crore_factor(unit))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_to_number() {
        assert_eq!(to_number(&json!(500)), Some(500.0));
        assert_eq!(to_number(&json!(" 18.2 ")), Some(18.2));
        assert_eq!(to_number(&json!("n/a")), None);
        assert_eq!(to_number(&json!("NaN")), None);
        assert_eq!(to_number(&json!(null)), None);
        assert_eq!(to_number(&json!({"v": 1})), None);
        assert_eq!(to_number(&json!(true)), None);
    }

    #[test]
    fn test_crore_label_is_identity() {
        for x in [0.0, 1.5, -42.25, 1e9, 123_456.789] {
            assert_eq!(to_crores(&json!(x), Some("cr")), Some(x));
            assert_eq!(to_crores(&json!(x), Some(" Crores ")), Some(x));
            assert_eq!(to_crores(&json!(x), Some("₹ Cr")), Some(x));
        }
    }

    #[test]
    fn test_million_and_billion() {
        assert_eq!(to_crores(&json!(10), Some("mn")), Some(1.0));
        assert_eq!(to_crores(&json!(1), Some("bn")), Some(100.0));
        assert_eq!(to_crores(&json!("2"), Some("Billions")), Some(200.0));
    }

    #[test]
    fn test_unknown_unit_assumes_crores() {
        assert_eq!(to_crores(&json!(7), None), Some(7.0));
        assert_eq!(to_crores(&json!(7), Some("lakh")), Some(7.0));
    }

    #[test]
    fn test_non_numeric_is_unknown() {
        assert_eq!(to_crores(&json!("abc"), Some("mn")), None);
        assert_eq!(to_crores(&json!("1,200"), Some("cr")), None);
    }
}
