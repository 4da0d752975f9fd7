//! Predicted-vs-actual table and the broker estimate table.

use crate::error::Result;
use crate::models::{MetricSet, PreviewDocument, ReconciledRow, ResolvedActuals};
use crate::utils::{fmt_money_cr, fmt_one_decimal, fmt_pct, PLACEHOLDER};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    /// Absolute figure in crores
    Money,
    /// Percentage points
    Margin,
}

struct RowSpec {
    label: &'static str,
    kind: MetricKind,
    pick: fn(&MetricSet) -> Option<f64>,
}

const ROWS: [RowSpec; 5] = [
    RowSpec { label: "Sales (₹ cr)", kind: MetricKind::Money, pick: |m| m.sales },
    RowSpec { label: "EBITDA (₹ cr)", kind: MetricKind::Money, pick: |m| m.ebitda },
    RowSpec { label: "PAT (₹ cr)", kind: MetricKind::Money, pick: |m| m.pat },
    RowSpec {
        label: "EBITDA Margin (%)",
        kind: MetricKind::Margin,
        pick: |m| m.ebitda_margin_percent,
    },
    RowSpec {
        label: "PAT Margin (%)",
        kind: MetricKind::Margin,
        pick: |m| m.pat_margin_percent,
    },
];

/// `(actual - predicted) / predicted * 100`; unknown when either side is
/// unknown or the prediction is zero.
pub fn surprise_pct(predicted: Option<f64>, actual: Option<f64>) -> Option<f64> {
    match (predicted, actual) {
        (Some(p), Some(a)) if p != 0.0 => Some((a - p) / p * 100.0),
        _ => None,
    }
}

/// Five rows in fixed order: Sales, EBITDA, PAT, EBITDA Margin, PAT Margin.
/// Margin rows never carry a surprise figure.
pub fn build_table(predicted: &MetricSet, actual: Option<&ResolvedActuals>) -> Vec<ReconciledRow> {
    let actual_figures = actual.map(|a| a.figures).unwrap_or_default();

    ROWS.iter()
        .map(|spec| {
            let pred = (spec.pick)(predicted);
            let act = (spec.pick)(&actual_figures);
            let (predicted, actual, surprise) = match spec.kind {
                MetricKind::Money => (
                    fmt_money_cr(pred),
                    fmt_money_cr(act),
                    surprise_pct(pred, act)
                        .map(|s| format!("{:.1} %", s))
                        .unwrap_or_else(|| PLACEHOLDER.to_string()),
                ),
                MetricKind::Margin => (fmt_pct(pred), fmt_pct(act), PLACEHOLDER.to_string()),
            };
            ReconciledRow {
                metric: spec.label.to_string(),
                predicted,
                actual,
                surprise,
            }
        })
        .collect()
}

/// "Basis: Consolidated · Period: Jun2025"; the preview's report period
/// stands in when the actuals carry no label.
pub fn period_caption(actual: Option<&ResolvedActuals>, preview: &PreviewDocument) -> String {
    let basis = actual.and_then(|a| a.basis.as_deref()).unwrap_or("—");
    let period = actual
        .and_then(|a| a.period_label.as_deref())
        .or(preview.report_period.as_deref())
        .unwrap_or("—");
    format!("Basis: {} · Period: {}", basis, period)
}

// ── Broker table ──────────────────────────────────────────────────────────────

pub const BROKER_HEADERS: [&str; 9] = [
    "Broker",
    "Published",
    "Expected Sales (₹ cr)",
    "Expected EBITDA (₹ cr)",
    "Expected PAT (₹ cr)",
    "EBITDA Margin %",
    "PAT Margin %",
    "Commentary",
    "PDF",
];

#[derive(Debug, Clone, PartialEq)]
pub struct BrokerRow {
    pub broker: String,
    pub published: String,
    pub expected_sales: Option<f64>,
    pub expected_ebitda: Option<f64>,
    pub expected_pat: Option<f64>,
    pub ebitda_margin_percent: Option<f64>,
    pub pat_margin_percent: Option<f64>,
    pub commentary: String,
    pub pdf: String,
}

impl BrokerRow {
    pub fn cells(&self) -> [String; 9] {
        [
            self.broker.clone(),
            self.published.clone(),
            fmt_one_decimal(self.expected_sales),
            fmt_one_decimal(self.expected_ebitda),
            fmt_one_decimal(self.expected_pat),
            fmt_one_decimal(self.ebitda_margin_percent),
            fmt_one_decimal(self.pat_margin_percent),
            self.commentary.clone(),
            self.pdf.clone(),
        ]
    }

    pub fn has_link(&self) -> bool {
        self.pdf.contains("http")
    }
}

fn round1(v: Option<f64>) -> Option<f64> {
    v.map(|v| (v * 10.0).round() / 10.0)
}

/// Broker estimates as display rows, in document order.
pub fn broker_rows(preview: &PreviewDocument) -> Vec<BrokerRow> {
    preview
        .broker_estimates
        .iter()
        .map(|b| BrokerRow {
            broker: b.broker_name.clone().unwrap_or_default(),
            published: b
                .published_date
                .as_deref()
                .map(|d| d.chars().take(10).collect())
                .unwrap_or_default(),
            expected_sales: round1(b.expected_sales),
            expected_ebitda: round1(b.expected_ebitda),
            expected_pat: round1(b.expected_pat),
            ebitda_margin_percent: round1(b.ebitda_margin_percent),
            pat_margin_percent: round1(b.pat_margin_percent),
            commentary: b.commentary.clone().unwrap_or_default(),
            pdf: b
                .source_url
                .clone()
                .or_else(|| b.source_file.clone())
                .or_else(|| b.report_id.clone())
                .unwrap_or_default(),
        })
        .collect()
}

// ── CSV export ────────────────────────────────────────────────────────────────

pub fn write_broker_csv<W: Write>(rows: &[BrokerRow], writer: W) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(BROKER_HEADERS)?;
    for row in rows {
        wtr.write_record(row.cells())?;
    }
    wtr.flush()?;
    Ok(())
}

/// `<company_id>_broker_estimates.csv`, or `predicted_…` without an id.
pub fn export_file_name(preview: &PreviewDocument) -> String {
    let stem = preview
        .company_id
        .as_deref()
        .map(sanitize_file_stem)
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "predicted".to_string());
    format!("{}_broker_estimates.csv", stem)
}

fn sanitize_file_stem(s: &str) -> String {
    s.chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' || c == '.' { c } else { '_' })
        .collect()
}

/// Write the broker table into `dir`. `None` when there is nothing to export.
pub fn export_broker_csv(preview: &PreviewDocument, dir: &Path) -> Result<Option<PathBuf>> {
    let rows = broker_rows(preview);
    if rows.is_empty() {
        return Ok(None);
    }
    std::fs::create_dir_all(dir)?;
    let path = dir.join(export_file_name(preview));
    let file = std::fs::File::create(&path)?;
    write_broker_csv(&rows, file)?;
    info!("Exported {} broker rows to {:?}", rows.len(), path);
    Ok(Some(path))
}
