pub mod margins;
pub mod periods;
pub mod shapes;
pub mod units;

use crate::config::{AppConfig, CollectionConfig};
use crate::documents::select_current;
use crate::error::Result;
use crate::models::ResolvedActuals;
use crate::storage::Repository;
use tracing::{debug, info};

pub use shapes::resolve_actuals;

// ── Source trait ──────────────────────────────────────────────────────────────

/// Anything that can produce normalised actuals for a company query.
/// The reconciliation table only ever sees [`ResolvedActuals`].
pub trait ActualsSource {
    fn describe(&self) -> String;
    fn latest_actuals(&self, query: &str) -> Result<Option<ResolvedActuals>>;
}

// ── Store-backed source ───────────────────────────────────────────────────────

pub struct CollectionActuals<'r> {
    repo: &'r Repository,
    collection: CollectionConfig,
}

impl<'r> CollectionActuals<'r> {
    pub fn new(repo: &'r Repository, collection: CollectionConfig) -> Self {
        Self { repo, collection }
    }
}

impl ActualsSource for CollectionActuals<'_> {
    fn describe(&self) -> String {
        format!("{}.{}", self.collection.database, self.collection.collection)
    }

    fn latest_actuals(&self, query: &str) -> Result<Option<ResolvedActuals>> {
        let candidates = self.repo.find_by_query(&self.collection, query)?;
        let n = candidates.len();
        let Some(doc) = select_current(candidates) else {
            debug!("{}: no actuals document for {:?}", self.describe(), query);
            return Ok(None);
        };
        debug!("{}: picked current document out of {}", self.describe(), n);
        Ok(resolve_actuals(&doc))
    }
}

// ── Disabled source ───────────────────────────────────────────────────────────

/// Deployments without an actuals collection.
pub struct NoActuals;

impl ActualsSource for NoActuals {
    fn describe(&self) -> String {
        "disabled".to_string()
    }

    fn latest_actuals(&self, _query: &str) -> Result<Option<ResolvedActuals>> {
        Ok(None)
    }
}

/// The actuals source for the configured convention.
pub fn actuals_source<'r>(config: &AppConfig, repo: &'r Repository) -> Box<dyn ActualsSource + 'r> {
    let source: Box<dyn ActualsSource + 'r> = match config.actuals_collection() {
        Some(collection) => Box::new(CollectionActuals::new(repo, collection)),
        None => Box::new(NoActuals),
    };
    info!("Actuals source: {}", source.describe());
    source
}
