use crate::actuals::units::to_number;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;

// ── Accounting basis ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Basis {
    Consolidated,
    Standalone,
}

impl Basis {
    /// Fixed preference order: Consolidated always wins when it has data.
    pub const PREFERENCE: [Basis; 2] = [Basis::Consolidated, Basis::Standalone];

    pub fn as_str(&self) -> &'static str {
        match self {
            Basis::Consolidated => "Consolidated",
            Basis::Standalone => "Standalone",
        }
    }
}

impl fmt::Display for Basis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Company identity ──────────────────────────────────────────────────────────

/// Alternate keys for one company. Any subset may be present.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompanyIdentity {
    pub company_id: Option<String>,
    pub nse: Option<String>,
    pub bse: Option<i64>,
    pub isin: Option<String>,
    pub name: Option<String>,
    pub display: Option<String>,
    pub key: Option<String>,
}

impl CompanyIdentity {
    /// Pull the identity fields out of a raw store document.
    pub fn from_document(doc: &Value) -> Self {
        let symbolmap = doc.get("symbolmap");
        let text = |v: Option<&Value>| v.and_then(value_text);

        Self {
            company_id: text(doc.get("company_id")),
            nse: text(symbolmap.and_then(|m| m.get("NSE"))),
            bse: symbolmap.and_then(|m| m.get("BSE")).and_then(value_int),
            isin: text(doc.get("company")),
            name: text(symbolmap.and_then(|m| m.get("Company_Name"))),
            display: text(doc.get("company_display")),
            key: text(doc.get("company_key")),
        }
    }
}

/// One entry of the company selection list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompanyOption {
    pub nse: Option<String>,
    pub bse: Option<i64>,
    pub name: Option<String>,
    pub isin: Option<String>,
    pub count: i64,
}

impl CompanyOption {
    pub fn label(&self) -> String {
        let bse = self.bse.map(|b| b.to_string());
        let head = self
            .name
            .clone()
            .or_else(|| self.nse.clone())
            .or_else(|| self.isin.clone())
            .or_else(|| bse.clone())
            .unwrap_or_default();
        format!(
            "{} — NSE {} | BSE {} | ISIN {}  ({})",
            head,
            self.nse.as_deref().unwrap_or("-"),
            bse.as_deref().unwrap_or("-"),
            self.isin.as_deref().unwrap_or("-"),
            self.count,
        )
    }

    /// Query string used against the preview and actuals stores.
    pub fn lookup_query(&self) -> Option<String> {
        self.nse
            .clone()
            .or_else(|| self.isin.clone())
            .or_else(|| self.name.clone())
            .or_else(|| self.bse.map(|b| b.to_string()))
    }

    /// Free-text selection: exact NSE/ISIN, exact BSE, or name substring.
    pub fn matches(&self, query: &str) -> bool {
        let q = query.trim();
        if q.is_empty() {
            return false;
        }
        let upper = q.to_uppercase();
        let lower = q.to_lowercase();

        self.nse.as_deref() == Some(upper.as_str())
            || self.isin.as_deref() == Some(upper.as_str())
            || (self.bse.is_some() && q.parse::<i64>().ok() == self.bse)
            || self
                .name
                .as_deref()
                .is_some_and(|n| n.to_lowercase().contains(&lower))
    }

    /// Initial value of the display-count control for this company.
    pub fn default_news_limit(&self, default_news: usize) -> usize {
        let count = usize::try_from(self.count.max(1)).unwrap_or(1);
        default_news.min(count)
    }
}

// ── Announcements ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SymbolMap {
    #[serde(rename = "NSE", default, deserialize_with = "lenient_string")]
    pub nse: Option<String>,
    #[serde(rename = "BSE", default, deserialize_with = "lenient_string")]
    pub bse: Option<String>,
    #[serde(rename = "Company_Name", default, deserialize_with = "lenient_string")]
    pub company_name: Option<String>,
}

/// An announcement / filing record.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct NewsDocument {
    #[serde(default, deserialize_with = "null_as_default")]
    pub symbolmap: SymbolMap,
    #[serde(default, deserialize_with = "lenient_string")]
    pub company: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub dt_tm: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub category: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub subcategory: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub sentiment: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub sensitivity: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub timelineflag: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub impactscore: Option<f64>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub impact: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub impactscore_deduction: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub shortsummary: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub summary: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub pdf_link_live: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub pdf_link: Option<String>,
    /// The stored document as loaded
    #[serde(skip)]
    pub raw: Option<Value>,
}

impl NewsDocument {
    /// Decode a stored announcement, keeping the original body alongside.
    pub fn from_stored(doc: Value) -> serde_json::Result<Self> {
        let mut news: NewsDocument = serde_json::from_value(doc.clone())?;
        news.raw = Some(doc);
        Ok(news)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SentimentTone {
    Positive,
    Negative,
    Neutral,
}

impl NewsDocument {
    pub fn title(&self) -> &str {
        self.symbolmap
            .company_name
            .as_deref()
            .or(self.symbolmap.nse.as_deref())
            .unwrap_or("Company")
    }

    pub fn tone(&self) -> SentimentTone {
        match self.sentiment.as_deref().map(str::to_lowercase) {
            Some(s) if s.contains("neg") => SentimentTone::Negative,
            Some(s) if s.contains("pos") => SentimentTone::Positive,
            _ => SentimentTone::Neutral,
        }
    }

    /// Impact score as shown next to the gauge, e.g. `7` for `7.8`.
    pub fn impact_whole(&self) -> i64 {
        self.impactscore.unwrap_or(0.0).trunc() as i64
    }

    /// 0..=100 progress gauge derived from the 0..10 impact score.
    pub fn impact_gauge(&self) -> u8 {
        (self.impactscore.unwrap_or(0.0) * 10.0).round().clamp(0.0, 100.0) as u8
    }
}

// ── Predictions ───────────────────────────────────────────────────────────────

/// Five optional figures; absolute ones in crores, margins in percent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct MetricSet {
    pub sales: Option<f64>,
    pub ebitda: Option<f64>,
    pub pat: Option<f64>,
    pub ebitda_margin_percent: Option<f64>,
    pub pat_margin_percent: Option<f64>,
}

impl MetricSet {
    pub fn has_absolute(&self) -> bool {
        self.sales.is_some() || self.ebitda.is_some() || self.pat.is_some()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct MeanEstimate {
    #[serde(default, deserialize_with = "lenient_f64")]
    pub mean: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Consensus {
    #[serde(default, deserialize_with = "null_as_default")]
    pub expected_sales: MeanEstimate,
    #[serde(default, deserialize_with = "null_as_default")]
    pub expected_ebitda: MeanEstimate,
    #[serde(default, deserialize_with = "null_as_default")]
    pub expected_pat: MeanEstimate,
    #[serde(default, deserialize_with = "null_as_default")]
    pub ebitda_margin_percent: MeanEstimate,
    #[serde(default, deserialize_with = "null_as_default")]
    pub pat_margin_percent: MeanEstimate,
}

impl Consensus {
    pub fn means(&self) -> MetricSet {
        MetricSet {
            sales: self.expected_sales.mean,
            ebitda: self.expected_ebitda.mean,
            pat: self.expected_pat.mean,
            ebitda_margin_percent: self.ebitda_margin_percent.mean,
            pat_margin_percent: self.pat_margin_percent.mean,
        }
    }
}

/// One broker's forecast.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct BrokerEstimate {
    #[serde(default, deserialize_with = "lenient_string")]
    pub broker_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub published_date: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub expected_sales: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub expected_ebitda: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub expected_pat: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub ebitda_margin_percent: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub pat_margin_percent: Option<f64>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub commentary: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub source_url: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub source_file: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub report_id: Option<String>,
}

/// One prediction snapshot for a company.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PreviewDocument {
    #[serde(default, deserialize_with = "lenient_string")]
    pub company_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub company_display: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub report_period: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub consensus: Consensus,
    #[serde(default, deserialize_with = "null_as_default")]
    pub broker_estimates: Vec<BrokerEstimate>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub updated_at: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub created_at: Option<String>,
}

// ── Actuals ───────────────────────────────────────────────────────────────────

/// Reported financials after shape resolution and unit normalisation.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResolvedActuals {
    pub basis: Option<String>,
    pub period_label: Option<String>,
    pub figures: MetricSet,
}

// ── Output ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconciledRow {
    #[serde(rename = "Metric")]
    pub metric: String,
    #[serde(rename = "Predicted")]
    pub predicted: String,
    #[serde(rename = "Actual")]
    pub actual: String,
    #[serde(rename = "Surprise %")]
    pub surprise: String,
}

// ── Lenient field decoding ────────────────────────────────────────────────────

/// Text form of a scalar; Mongo-style `{"$date": ...}` wrappers are unwrapped.
pub fn value_text(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() { None } else { Some(s.to_string()) }
        }
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Object(map) => map.get("$date").and_then(value_text),
        _ => None,
    }
}

/// Integer form of a scalar; numeric strings are accepted.
pub fn value_int(v: &Value) -> Option<i64> {
    match v {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && f.is_finite())
                .map(|f| f as i64)
        }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let v = Option::<Value>::deserialize(deserializer)?;
    Ok(v.as_ref().and_then(value_text))
}

fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let v = Option::<Value>::deserialize(deserializer)?;
    Ok(v.as_ref().and_then(to_number))
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn option() -> CompanyOption {
        CompanyOption {
            nse: Some("TCS".into()),
            bse: Some(532540),
            name: Some("Tata Consultancy Services Ltd".into()),
            isin: Some("INE467B01029".into()),
            count: 7,
        }
    }

    #[test]
    fn test_option_label() {
        assert_eq!(
            option().label(),
            "Tata Consultancy Services Ltd — NSE TCS | BSE 532540 | ISIN INE467B01029  (7)"
        );

        let bare = CompanyOption { nse: None, bse: Some(500325), name: None, isin: None, count: 1 };
        assert_eq!(bare.label(), "500325 — NSE - | BSE 500325 | ISIN -  (1)");
    }

    #[test]
    fn test_option_matching_and_lookup() {
        let opt = option();
        assert!(opt.matches("tcs"));
        assert!(opt.matches("532540"));
        assert!(opt.matches("consultancy"));
        assert!(opt.matches("ine467b01029"));
        assert!(!opt.matches("infy"));
        assert!(!opt.matches("   "));
        assert_eq!(opt.lookup_query().as_deref(), Some("TCS"));

        let bse_only = CompanyOption { nse: None, bse: Some(500325), name: None, isin: None, count: 1 };
        assert_eq!(bse_only.lookup_query().as_deref(), Some("500325"));
    }

    #[test]
    fn test_default_news_limit() {
        assert_eq!(option().default_news_limit(20), 7);
        let busy = CompanyOption { count: 120, ..option() };
        assert_eq!(busy.default_news_limit(20), 20);
        let empty = CompanyOption { count: 0, ..option() };
        assert_eq!(empty.default_news_limit(20), 1);
    }

    #[test]
    fn test_identity_from_document() {
        let doc = json!({
            "company_id": "RELIANCE",
            "company": "INE002A01018",
            "symbolmap": {"NSE": "RELIANCE", "BSE": "500325", "Company_Name": "Reliance Industries"},
            "company_display": "Reliance Industries Ltd",
        });
        let id = CompanyIdentity::from_document(&doc);
        assert_eq!(id.bse, Some(500325));
        assert_eq!(id.nse.as_deref(), Some("RELIANCE"));
        assert_eq!(id.isin.as_deref(), Some("INE002A01018"));
        assert_eq!(id.key, None);
    }

    #[test]
    fn test_news_document_is_lenient() {
        let doc: NewsDocument = serde_json::from_value(json!({
            "symbolmap": null,
            "dt_tm": {"$date": "2025-07-18T10:00:00Z"},
            "impactscore": "7.8",
            "sentiment": "Mildly Negative",
            "sensitivity": 3,
        }))
        .unwrap();

        assert_eq!(doc.title(), "Company");
        assert_eq!(doc.dt_tm.as_deref(), Some("2025-07-18T10:00:00Z"));
        assert_eq!(doc.impact_whole(), 7);
        assert_eq!(doc.impact_gauge(), 78);
        assert_eq!(doc.tone(), SentimentTone::Negative);
        assert_eq!(doc.sensitivity.as_deref(), Some("3"));
    }

    #[test]
    fn test_news_document_keeps_stored_body() {
        let stored = json!({"category": "Result", "extra": {"board": true}});
        let doc = NewsDocument::from_stored(stored.clone()).unwrap();
        assert_eq!(doc.category.as_deref(), Some("Result"));
        assert_eq!(doc.raw, Some(stored));
    }

    #[test]
    fn test_impact_gauge_is_clamped() {
        let doc = NewsDocument { impactscore: Some(42.0), ..Default::default() };
        assert_eq!(doc.impact_gauge(), 100);
        let doc = NewsDocument { impactscore: Some(-3.0), ..Default::default() };
        assert_eq!(doc.impact_gauge(), 0);
    }

    #[test]
    fn test_preview_consensus_means() {
        let doc: PreviewDocument = serde_json::from_value(json!({
            "company_id": "TCS",
            "consensus": {
                "expected_sales": {"mean": 480},
                "expected_pat": {"mean": "not-a-number"},
                "pat_margin_percent": null,
            },
            "broker_estimates": null,
        }))
        .unwrap();

        let means = doc.consensus.means();
        assert_eq!(means.sales, Some(480.0));
        assert_eq!(means.pat, None);
        assert_eq!(means.pat_margin_percent, None);
        assert!(doc.broker_estimates.is_empty());
    }
}
