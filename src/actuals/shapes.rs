//! The three schemas reported financials have been stored in, and one
//! resolver per schema.
//!
//! A document can carry more than one shape (old `results` arrays left next to
//! newer nested blocks). [`ActualsShape::detect`] lists them in priority order
//! and [`resolve_actuals`] takes the first that yields an absolute figure.

use super::margins::derive_margin;
use super::periods::{parse_month_label, parse_results_label};
use super::units::{crore_factor, to_number};
use crate::documents::{deep_get_any, pick_latest};
use crate::models::{value_text, Basis, MetricSet, ResolvedActuals};
use serde_json::{Map, Value};
use tracing::debug;

const ACTUAL_KEY: &str = "actual";

// Nested-block metric keys
const NESTED_SALES: &[&str] = &["net_sales"];
const NESTED_EBITDA: &[&str] = &["ebitda"];
const NESTED_QUARTER_EBITDA: &[&str] = &["ebitda", "operating_profit"];
const NESTED_PAT: &[&str] = &["net_profit"];
const NESTED_EBITDA_MARGIN: &[&str] = &["ebitda_margin"];
const NESTED_PAT_MARGIN: &[&str] = &["pat_margin"];

// Legacy `results` array metric keys
const RESULTS_SALES: &[&str] = &["Sales"];
const RESULTS_EBITDA: &[&str] = &["EBITDA", "Ebitda", "EBITDA_Profit"];
const RESULTS_PAT: &[&str] = &["PAT", "Net_Profit", "Profit_After_Tax"];
const RESULTS_EBITDA_MARGIN: &[&str] = &["EBITDA_Margin", "Ebitda_Margin", "EBITDA_Margin_%"];
const RESULTS_PAT_MARGIN: &[&str] = &["PAT_Margin", "PAT_Margin_%"];

// Flat fallback keys, searched through the whole document
const FLAT_SALES: &[&str] = &["actual_sales", "sales", "net_sales", "revenue", "total_income"];
const FLAT_EBITDA: &[&str] = &["actual_ebitda", "ebitda", "operating_profit"];
const FLAT_PAT: &[&str] = &["actual_pat", "pat", "net_profit", "profit_after_tax"];
const FLAT_EBITDA_MARGIN: &[&str] = &["ebitda_margin_percent", "ebitda_margin"];
const FLAT_PAT_MARGIN: &[&str] = &["pat_margin_percent", "pat_margin"];

#[derive(Debug, Clone, PartialEq)]
pub enum ActualsShape<'a> {
    /// `{Basis: {"actual": {"Jun2025": {..., "unit": "cr"}}}}`
    NestedActual {
        basis: Basis,
        periods: &'a Map<String, Value>,
    },
    /// `{Basis: {"Jun2025": {...}, "Mar2025": {...}}}`, values already in crores
    NestedQuarters {
        basis: Basis,
        block: &'a Map<String, Value>,
    },
    /// `{results: {Basis: [{period: {label}, metrics: {...}}]}}`
    PeriodArray {
        basis: Basis,
        entries: &'a [Value],
        fallback_label: Option<String>,
    },
    /// Metric keys anywhere in the document, values already in crores
    Flat(&'a Value),
}

impl<'a> ActualsShape<'a> {
    /// Shapes present in `doc`, highest priority first.
    pub fn detect(doc: &'a Value) -> Vec<ActualsShape<'a>> {
        let Some(root) = doc.as_object() else {
            return vec![];
        };
        let mut shapes = Vec::new();

        for basis in Basis::PREFERENCE {
            let Some(block) = root.get(basis.as_str()).and_then(Value::as_object) else {
                continue;
            };
            if let Some(periods) = block.get(ACTUAL_KEY).and_then(Value::as_object) {
                if !periods.is_empty() {
                    shapes.push(ActualsShape::NestedActual { basis, periods });
                }
            }
            if block.iter().any(|(k, v)| k != ACTUAL_KEY && v.is_object()) {
                shapes.push(ActualsShape::NestedQuarters { basis, block });
            }
        }

        if let Some(results) = root.get("results").and_then(Value::as_object) {
            let array = Basis::PREFERENCE.into_iter().find_map(|basis| {
                results
                    .get(basis.as_str())
                    .and_then(Value::as_array)
                    .filter(|a| !a.is_empty())
                    .map(|a| (basis, a.as_slice()))
            });
            if let Some((basis, entries)) = array {
                shapes.push(ActualsShape::PeriodArray {
                    basis,
                    entries,
                    fallback_label: root.get("period").and_then(value_text),
                });
            }
        }

        shapes.push(ActualsShape::Flat(doc));
        shapes
    }

    pub fn name(&self) -> &'static str {
        match self {
            ActualsShape::NestedActual { .. } => "nested-actual",
            ActualsShape::NestedQuarters { .. } => "nested-quarters",
            ActualsShape::PeriodArray { .. } => "period-array",
            ActualsShape::Flat(_) => "flat",
        }
    }

    pub fn resolve(&self) -> Option<ResolvedActuals> {
        match self {
            ActualsShape::NestedActual { basis, periods } => resolve_nested_actual(*basis, periods),
            ActualsShape::NestedQuarters { basis, block } => resolve_nested_quarters(*basis, block),
            ActualsShape::PeriodArray { basis, entries, fallback_label } => {
                resolve_period_array(*basis, entries, fallback_label.as_deref())
            }
            ActualsShape::Flat(doc) => Some(resolve_flat(doc)),
        }
    }
}

/// Resolve one actuals document of unknown shape. `None` when no shape yields
/// sales, EBITDA or PAT.
pub fn resolve_actuals(doc: &Value) -> Option<ResolvedActuals> {
    for shape in ActualsShape::detect(doc) {
        match shape.resolve() {
            Some(resolved) if resolved.figures.has_absolute() => {
                debug!(
                    "actuals resolved via {} shape (basis={:?}, period={:?})",
                    shape.name(),
                    resolved.basis,
                    resolved.period_label
                );
                return Some(resolved);
            }
            _ => debug!("{} shape yielded no figures", shape.name()),
        }
    }
    None
}

// ── Resolvers ─────────────────────────────────────────────────────────────────

fn resolve_nested_actual(basis: Basis, periods: &Map<String, Value>) -> Option<ResolvedActuals> {
    let (label, metrics) = latest_month_entry(periods.iter().filter(|(k, _)| !k.is_empty()))?;
    let factor = crore_factor(metric_unit(metrics).as_deref());

    Some(ResolvedActuals {
        basis: Some(basis.to_string()),
        period_label: Some(label.clone()),
        figures: MetricSet {
            sales: metric(metrics, NESTED_SALES, factor),
            ebitda: metric(metrics, NESTED_EBITDA, factor),
            pat: metric(metrics, NESTED_PAT, factor),
            ebitda_margin_percent: metric(metrics, NESTED_EBITDA_MARGIN, 1.0),
            pat_margin_percent: metric(metrics, NESTED_PAT_MARGIN, 1.0),
        },
    })
}

fn resolve_nested_quarters(basis: Basis, block: &Map<String, Value>) -> Option<ResolvedActuals> {
    let quarters = block
        .iter()
        .filter(|(k, v)| k.as_str() != ACTUAL_KEY && v.is_object());
    let (label, metrics) = latest_month_entry(quarters)?;

    Some(ResolvedActuals {
        basis: Some(basis.to_string()),
        period_label: Some(label.clone()),
        figures: MetricSet {
            sales: metric(metrics, NESTED_SALES, 1.0),
            ebitda: metric(metrics, NESTED_QUARTER_EBITDA, 1.0),
            pat: metric(metrics, NESTED_PAT, 1.0),
            ebitda_margin_percent: metric(metrics, NESTED_EBITDA_MARGIN, 1.0),
            pat_margin_percent: metric(metrics, NESTED_PAT_MARGIN, 1.0),
        },
    })
}

fn resolve_period_array(
    basis: Basis,
    entries: &[Value],
    fallback_label: Option<&str>,
) -> Option<ResolvedActuals> {
    let entry = pick_latest(entries, |e| {
        entry_label(e).as_deref().and_then(parse_results_label)
    })?;

    let empty = Map::new();
    let metrics = entry
        .get("metrics")
        .and_then(Value::as_object)
        .unwrap_or(&empty);
    let factor = crore_factor(metric_unit(metrics).as_deref());

    let sales = metric(metrics, RESULTS_SALES, factor);
    let ebitda = metric(metrics, RESULTS_EBITDA, factor);
    let pat = metric(metrics, RESULTS_PAT, factor);

    Some(ResolvedActuals {
        basis: Some(basis.to_string()),
        period_label: entry_label(entry).or_else(|| fallback_label.map(str::to_string)),
        figures: MetricSet {
            sales,
            ebitda,
            pat,
            ebitda_margin_percent: derive_margin(
                metric(metrics, RESULTS_EBITDA_MARGIN, 1.0),
                ebitda,
                sales,
            ),
            pat_margin_percent: derive_margin(metric(metrics, RESULTS_PAT_MARGIN, 1.0), pat, sales),
        },
    })
}

fn resolve_flat(doc: &Value) -> ResolvedActuals {
    let find = |aliases: &[&str]| deep_get_any(doc, aliases).and_then(to_number);

    ResolvedActuals {
        basis: doc.get("basis").and_then(value_text),
        period_label: doc.get("period").and_then(value_text),
        figures: MetricSet {
            sales: find(FLAT_SALES),
            ebitda: find(FLAT_EBITDA),
            pat: find(FLAT_PAT),
            ebitda_margin_percent: find(FLAT_EBITDA_MARGIN),
            pat_margin_percent: find(FLAT_PAT_MARGIN),
        },
    }
}

// ── Helpers ───────────────────────────────────────────────────────────────────

/// Most recent "Jun2025"-style entry; its metrics, or an empty map when the
/// entry is not an object.
fn latest_month_entry<'a>(
    entries: impl Iterator<Item = (&'a String, &'a Value)>,
) -> Option<(&'a String, &'a Map<String, Value>)> {
    static EMPTY: std::sync::LazyLock<Map<String, Value>> = std::sync::LazyLock::new(Map::new);

    let (label, value) = pick_latest(entries, |(k, _)| parse_month_label(k))?;
    Some((label, value.as_object().unwrap_or(&*EMPTY)))
}

fn entry_label(entry: &Value) -> Option<String> {
    entry
        .get("period")
        .and_then(|p| p.get("label"))
        .and_then(value_text)
}

fn metric_unit(metrics: &Map<String, Value>) -> Option<String> {
    metrics.get("unit").and_then(value_text)
}

/// First alias holding a numeric value, scaled by `factor`.
fn metric(metrics: &Map<String, Value>, aliases: &[&str], factor: f64) -> Option<f64> {
    aliases
        .iter()
        .find_map(|k| metrics.get(*k).and_then(to_number))
        .map(|n| n * factor)
}
