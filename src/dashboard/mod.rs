//! One page evaluation: announcements, predicted-vs-actual table, broker table.
//!
//! Each section is evaluated independently. Not-found is an informational
//! section, a store fault degrades only the section it hit.

pub mod cache;
pub mod interactive;

use crate::actuals::{actuals_source, ActualsSource};
use crate::auth::Session;
use crate::config::AppConfig;
use crate::documents::select_current;
use crate::error::Result;
use crate::models::{CompanyOption, NewsDocument, PreviewDocument, ReconciledRow, ResolvedActuals};
use crate::reconcile::{broker_rows, build_table, export_broker_csv, period_caption, BrokerRow};
use crate::storage::{Repository, MAX_NEWS_LIMIT};
use chrono::Utc;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use self::cache::OptionsCache;

pub const NO_NEWS: &str = "No news for this company.";
pub const NO_PREDICTIONS: &str = "No predicted results found for this company.";
pub const NO_BROKERS: &str = "No broker estimates found in preview doc.";

#[derive(Debug, Clone, PartialEq)]
pub enum Section<T> {
    Ready(T),
    /// Nothing to show; carries the informational message
    Empty(String),
    /// The store failed; carries the reason
    Degraded(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResultsView {
    pub preview: PreviewDocument,
    pub actual: Option<ResolvedActuals>,
    /// Set when the actuals lookup failed rather than found nothing
    pub actuals_note: Option<String>,
    pub rows: Vec<ReconciledRow>,
    pub caption: String,
    pub brokers: Vec<BrokerRow>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub query: String,
    pub option: Option<CompanyOption>,
    pub news_limit: usize,
    pub news: Section<Vec<NewsDocument>>,
    pub results: Section<ResultsView>,
}

pub struct Dashboard<'r> {
    config: AppConfig,
    repo: &'r Repository,
    actuals: Box<dyn ActualsSource + 'r>,
    options: OptionsCache,
}

impl<'r> Dashboard<'r> {
    pub fn new(config: AppConfig, repo: &'r Repository) -> Self {
        let actuals = actuals_source(&config, repo);
        let options = OptionsCache::new(config.viewer.options_ttl_secs);
        Self { config, repo, actuals, options }
    }

    /// Replace the actuals source, e.g. with a different collection convention.
    #[cfg(test)]
    pub fn with_actuals_source(mut self, source: Box<dyn ActualsSource + 'r>) -> Self {
        self.actuals = source;
        self
    }

    /// Company selection list, served from the TTL cache.
    pub fn company_options(&mut self) -> Result<&[CompanyOption]> {
        let repo = self.repo;
        let announcements = &self.config.announcements;
        self.options
            .get_or_refresh(Utc::now(), || repo.company_options(announcements))
    }

    /// Drop the cached selection list so the next read hits the store.
    pub fn reload_options(&mut self) {
        self.options.invalidate();
    }

    /// First option matching a free-text selection.
    pub fn resolve_selection(&mut self, query: &str) -> Result<Option<CompanyOption>> {
        Ok(self
            .company_options()?
            .iter()
            .find(|o| o.matches(query))
            .cloned())
    }

    /// Requested count, else the company's default, within 1..=max.
    pub fn news_limit(&self, option: Option<&CompanyOption>, requested: Option<usize>) -> usize {
        let max = self.config.viewer.max_news.clamp(1, MAX_NEWS_LIMIT);
        let default = option
            .map(|o| o.default_news_limit(self.config.viewer.default_news))
            .unwrap_or(self.config.viewer.default_news);
        requested.unwrap_or(default).clamp(1, max)
    }

    /// Most recently updated prediction snapshot for a query.
    pub fn latest_preview(&self, query: &str) -> Result<Option<PreviewDocument>> {
        let candidates = self.repo.find_by_query(&self.config.previews, query)?;
        match select_current(candidates) {
            Some(doc) => Ok(Some(serde_json::from_value(doc)?)),
            None => Ok(None),
        }
    }

    pub fn evaluate(&mut self, session: &Session, query: &str, limit: Option<usize>) -> Result<Page> {
        session.require()?;
        let query = query.trim().to_string();
        info!("Evaluating page for {:?}", query);

        let (option, options_error) = match self.resolve_selection(&query) {
            Ok(option) => (option, None),
            Err(e) => {
                warn!("company options unavailable: {}", e);
                (None, Some(e.to_string()))
            }
        };
        let news_limit = self.news_limit(option.as_ref(), limit);

        let news = match (&option, options_error) {
            (_, Some(reason)) => Section::Degraded(format!("Announcements unavailable: {}", reason)),
            (None, None) => Section::Empty(NO_NEWS.to_string()),
            (Some(opt), None) => self.news_section(opt, news_limit),
        };

        let lookup = option
            .as_ref()
            .and_then(CompanyOption::lookup_query)
            .unwrap_or_else(|| query.clone());
        let results = self.results_section(&lookup);

        Ok(Page { query, option, news_limit, news, results })
    }

    /// Write the broker table for a selection as CSV into `dir`.
    pub fn export(&mut self, session: &Session, query: &str, dir: &Path) -> Result<Option<PathBuf>> {
        session.require()?;
        let lookup = self
            .resolve_selection(query)?
            .and_then(|o| o.lookup_query())
            .unwrap_or_else(|| query.trim().to_string());
        match self.latest_preview(&lookup)? {
            Some(preview) => export_broker_csv(&preview, dir),
            None => Ok(None),
        }
    }

    fn news_section(&self, option: &CompanyOption, limit: usize) -> Section<Vec<NewsDocument>> {
        let docs = match self.repo.news_for_company(&self.config.announcements, option, limit) {
            Ok(docs) => docs,
            Err(e) => {
                warn!("announcement lookup failed: {}", e);
                return Section::Degraded(format!("Announcements unavailable: {}", e));
            }
        };

        let news: Vec<NewsDocument> = docs
            .into_iter()
            .filter_map(|doc| match NewsDocument::from_stored(doc) {
                Ok(n) => Some(n),
                Err(e) => {
                    warn!("skipping unreadable announcement: {}", e);
                    None
                }
            })
            .collect();

        debug!("{} announcements for {}", news.len(), option.label());
        if news.is_empty() {
            Section::Empty(NO_NEWS.to_string())
        } else {
            Section::Ready(news)
        }
    }

    fn results_section(&self, lookup: &str) -> Section<ResultsView> {
        let preview = match self.latest_preview(lookup) {
            Ok(Some(p)) => p,
            Ok(None) => return Section::Empty(NO_PREDICTIONS.to_string()),
            Err(e) => {
                warn!("preview lookup failed: {}", e);
                return Section::Degraded(format!("Predictions unavailable: {}", e));
            }
        };

        let (actual, actuals_note) = match self.actuals.latest_actuals(lookup) {
            Ok(actual) => (actual, None),
            Err(e) => {
                warn!("actuals lookup via {} failed: {}", self.actuals.describe(), e);
                (None, Some(format!("Actuals unavailable: {}", e)))
            }
        };

        let rows = build_table(&preview.consensus.means(), actual.as_ref());
        let caption = period_caption(actual.as_ref(), &preview);
        let brokers = broker_rows(&preview);

        Section::Ready(ResultsView { preview, actual, actuals_note, rows, caption, brokers })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::StaticCredentials;
    use crate::config::ActualsConvention;
    use serde_json::json;

    fn signed_in() -> Session {
        let mut session = Session::default();
        assert!(session.sign_in(&StaticCredentials::new("u", "p"), "u", "p", false));
        session
    }

    fn seeded(config: &AppConfig) -> Repository {
        let repo = Repository::open_in_memory().unwrap();
        repo.run_migrations(&config.collections()).unwrap();

        let sym = json!({"NSE": "TCS", "BSE": 532540, "Company_Name": "Tata Consultancy Services Ltd"});
        repo.insert_documents(
            &config.announcements,
            &[
                json!({"symbolmap": sym, "company": "INE467B01029", "dt_tm": "2025-07-10 18:00:00",
                       "category": "Result", "sentiment": "Positive", "impactscore": 8}),
                json!({"symbolmap": sym, "company": "INE467B01029", "dt_tm": "2025-06-01 10:00:00",
                       "category": "Board Meeting"}),
                json!({"symbolmap": {"NSE": "WIPRO", "Company_Name": "Wipro Ltd"}, "dt_tm": "2025-07-01"}),
            ],
        )
        .unwrap();

        repo.insert_documents(
            &config.previews,
            &[
                json!({"company_id": "TCS", "updated_at": "2025-07-01T00:00:00Z",
                       "consensus": {"expected_sales": {"mean": 470}}}),
                json!({"company_id": "TCS", "symbolmap": {"NSE": "TCS"}, "updated_at": "2025-07-05T00:00:00Z",
                       "report_period": "Q1FY26",
                       "consensus": {"expected_sales": {"mean": 480}, "ebitda_margin_percent": {"mean": 18.0}},
                       "broker_estimates": [{"broker_name": "Kotak", "expected_sales": 481.26}]}),
                json!({"company_id": "WIPRO", "consensus": {"expected_sales": {"mean": 220}}}),
            ],
        )
        .unwrap();

        repo.insert_documents(
            &config.actuals_collection().unwrap(),
            &[json!({"company_id": "TCS",
                     "Consolidated": {"actual": {"Jun2025": {"net_sales": 500, "unit": "cr", "ebitda_margin": 18.2}}},
                     "Standalone": {}})],
        )
        .unwrap();
        repo
    }

    #[test]
    fn test_full_page() {
        let config = AppConfig::default();
        let repo = seeded(&config);
        let mut dashboard = Dashboard::new(config, &repo);

        let page = dashboard.evaluate(&signed_in(), "tcs", None).unwrap();
        assert_eq!(page.option.as_ref().unwrap().count, 2);
        assert_eq!(page.news_limit, 2);

        let Section::Ready(news) = &page.news else { panic!("news: {:?}", page.news) };
        assert_eq!(news.len(), 2);
        assert_eq!(news[0].category.as_deref(), Some("Result"));
        assert_eq!(news[0].raw.as_ref().unwrap()["impactscore"], 8);

        let Section::Ready(view) = &page.results else { panic!("results: {:?}", page.results) };
        assert_eq!(view.rows[0].predicted, "₹ 480.0 cr");
        assert_eq!(view.rows[0].actual, "₹ 500.0 cr");
        assert_eq!(view.rows[0].surprise, "4.2 %");
        assert_eq!(view.rows[3].actual, "18.2 %");
        assert_eq!(view.rows[3].surprise, "-");
        assert_eq!(view.caption, "Basis: Consolidated · Period: Jun2025");
        assert_eq!(view.brokers[0].expected_sales, Some(481.3));
        assert_eq!(view.actuals_note, None);
    }

    #[test]
    fn test_missing_actuals_keep_table() {
        let config = AppConfig::default();
        let repo = seeded(&config);
        let mut dashboard = Dashboard::new(config, &repo);

        let page = dashboard.evaluate(&signed_in(), "wipro", Some(10)).unwrap();
        let Section::Ready(view) = &page.results else { panic!("results: {:?}", page.results) };
        assert_eq!(view.rows.len(), 5);
        assert!(view.rows.iter().all(|r| r.actual == "-" && r.surprise == "-"));
        assert_eq!(view.rows[0].predicted, "₹ 220.0 cr");
        assert_eq!(view.caption, "Basis: — · Period: —");
        assert!(view.brokers.is_empty());
    }

    #[test]
    fn test_unknown_company() {
        let config = AppConfig::default();
        let repo = seeded(&config);
        let mut dashboard = Dashboard::new(config, &repo);

        let page = dashboard.evaluate(&signed_in(), "nonexistent", None).unwrap();
        assert_eq!(page.option, None);
        assert_eq!(page.news, Section::Empty(NO_NEWS.to_string()));
        assert_eq!(page.results, Section::Empty(NO_PREDICTIONS.to_string()));
    }

    #[test]
    fn test_disabled_actuals_convention() {
        let mut config = AppConfig::default();
        let repo = seeded(&config);
        config.actuals.source = ActualsConvention::Disabled;
        let mut dashboard = Dashboard::new(config, &repo);

        let page = dashboard.evaluate(&signed_in(), "TCS", None).unwrap();
        let Section::Ready(view) = &page.results else { panic!() };
        assert_eq!(view.rows[0].actual, "-");
        assert_eq!(view.caption, "Basis: — · Period: Q1FY26");
    }

    #[test]
    fn test_missing_announcement_table_degrades_news_only() {
        let mut config = AppConfig::default();
        let repo = seeded(&config);
        config.announcements.collection = "not_migrated".into();
        let mut dashboard = Dashboard::new(config, &repo);

        let page = dashboard.evaluate(&signed_in(), "TCS", None).unwrap();
        assert!(matches!(page.news, Section::Degraded(_)));
        assert!(matches!(page.results, Section::Ready(_)));
    }

    #[test]
    fn test_requires_sign_in() {
        let config = AppConfig::default();
        let repo = seeded(&config);
        let mut dashboard = Dashboard::new(config, &repo);
        assert!(dashboard.evaluate(&Session::default(), "TCS", None).is_err());
    }

    #[test]
    fn test_news_limit_bounds() {
        let config = AppConfig::default();
        let repo = Repository::open_in_memory().unwrap();
        let dashboard = Dashboard::new(config, &repo);
        let busy = CompanyOption { nse: None, bse: None, name: None, isin: None, count: 300 };

        assert_eq!(dashboard.news_limit(Some(&busy), None), 20);
        assert_eq!(dashboard.news_limit(Some(&busy), Some(0)), 1);
        assert_eq!(dashboard.news_limit(Some(&busy), Some(500)), 50);
        assert_eq!(dashboard.news_limit(None, None), 20);
    }

    struct FailingActuals;

    impl ActualsSource for FailingActuals {
        fn describe(&self) -> String {
            "failing".into()
        }

        fn latest_actuals(&self, _query: &str) -> Result<Option<ResolvedActuals>> {
            Err(crate::error::ViewerError::InvalidIdentifier("bad collection".into()))
        }
    }

    #[test]
    fn test_actuals_fault_keeps_predictions() {
        let config = AppConfig::default();
        let repo = seeded(&config);
        let mut dashboard = Dashboard::new(config, &repo).with_actuals_source(Box::new(FailingActuals));

        let page = dashboard.evaluate(&signed_in(), "TCS", None).unwrap();
        let Section::Ready(view) = &page.results else { panic!("results: {:?}", page.results) };
        assert_eq!(view.rows[0].predicted, "₹ 480.0 cr");
        assert_eq!(view.rows[0].actual, "-");
        assert!(view.actuals_note.as_deref().unwrap().starts_with("Actuals unavailable"));
    }

    #[test]
    fn test_options_cached_until_reload() {
        let config = AppConfig::default();
        let repo = seeded(&config);
        let announcements = config.announcements.clone();
        let mut dashboard = Dashboard::new(config, &repo);
        assert_eq!(dashboard.company_options().unwrap().len(), 2);

        repo.insert_documents(&announcements, &[json!({"symbolmap": {"NSE": "INFY"}})])
            .unwrap();
        assert_eq!(dashboard.company_options().unwrap().len(), 2);

        dashboard.reload_options();
        assert_eq!(dashboard.company_options().unwrap().len(), 3);
    }

    #[test]
    fn test_export() {
        let config = AppConfig::default();
        let repo = seeded(&config);
        let mut dashboard = Dashboard::new(config, &repo);
        let dir = tempfile::tempdir().unwrap();

        let path = dashboard.export(&signed_in(), "TCS", dir.path()).unwrap().unwrap();
        assert!(path.ends_with("TCS_broker_estimates.csv"));
        assert_eq!(dashboard.export(&signed_in(), "WIPRO", dir.path()).unwrap(), None);
    }
}
