use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub store: StoreConfig,
    pub announcements: CollectionConfig,
    pub previews: CollectionConfig,
    #[serde(default)]
    pub actuals: ActualsConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub viewer: ViewerConfig,
}

/// Data-store location
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_path")]
    pub path: PathBuf,

    #[serde(default = "default_true")]
    pub run_migrations: bool,
}

/// A "database.collection" pair; the database maps to a DuckDB schema.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct CollectionConfig {
    pub database: String,
    pub collection: String,
}

/// Where reported financials live. Three conventions have existed over time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActualsConvention {
    /// `LatestCmotData` next to the announcements
    LatestCmot,
    /// `CollectionFinResMetrices` next to the previews
    FinResMetrics,
    /// No actuals collection at all
    #[serde(rename = "none", alias = "disabled")]
    Disabled,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ActualsConfig {
    #[serde(default = "default_actuals_source")]
    pub source: ActualsConvention,

    #[serde(default)]
    pub database: Option<String>,

    #[serde(default)]
    pub collection: Option<String>,
}

/// Shared sign-in credential. Not a security boundary.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    #[serde(default = "default_username")]
    pub username: String,

    #[serde(default = "default_password")]
    pub password: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ViewerConfig {
    #[serde(default = "default_options_ttl_secs")]
    pub options_ttl_secs: u64,

    #[serde(default = "default_max_news")]
    pub max_news: usize,

    #[serde(default = "default_news")]
    pub default_news: usize,
}

// ── Defaults ─────────────────────────────────────────────────────────────────

pub const ANNOUNCEMENTS_DB: &str = "RAG_CHATBOT";
pub const ANNOUNCEMENTS_COLLECTION: &str = "selected_ann";
pub const PREVIEWS_DB: &str = "CAG_CHATBOT";
pub const PREVIEWS_COLLECTION: &str = "company_result_previews";
pub const LATEST_CMOT_COLLECTION: &str = "LatestCmotData";
pub const FIN_RES_METRICS_COLLECTION: &str = "CollectionFinResMetrices";

fn default_store_path() -> PathBuf {
    PathBuf::from("data/results.duckdb")
}
fn default_true() -> bool {
    true
}
fn default_actuals_source() -> ActualsConvention {
    ActualsConvention::LatestCmot
}
fn default_username() -> String {
    "admin".to_string()
}
fn default_password() -> String {
    "admin123".to_string()
}
fn default_options_ttl_secs() -> u64 {
    600
}
fn default_max_news() -> usize {
    50
}
fn default_news() -> usize {
    20
}

/// Flat environment keys used by earlier deployments, mapped onto config keys.
const LEGACY_ENV_KEYS: &[(&str, &str)] = &[
    ("STORE_PATH", "store.path"),
    ("DB_NAME", "announcements.database"),
    ("NEWS_COLLECTION", "announcements.collection"),
    ("PREV_DB", "previews.database"),
    ("PREV_COLLECTION", "previews.collection"),
    ("ACTUAL_SOURCE", "actuals.source"),
    ("ACTUAL_DB", "actuals.database"),
    ("ACTUAL_COLLECTION", "actuals.collection"),
    ("APP_USER", "auth.username"),
    ("APP_PASS", "auth.password"),
];

// ── Loader ───────────────────────────────────────────────────────────────────

impl AppConfig {
    /// Load configuration from file + environment overrides
    pub fn load() -> Result<Self> {
        dotenv::dotenv().ok();

        let mut builder = config::Config::builder()
            .set_default("announcements.database", ANNOUNCEMENTS_DB)?
            .set_default("announcements.collection", ANNOUNCEMENTS_COLLECTION)?
            .set_default("previews.database", PREVIEWS_DB)?
            .set_default("previews.collection", PREVIEWS_COLLECTION)?
            .add_source(
                config::File::with_name("config/default")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(
                config::File::with_name("config/local")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(
                config::Environment::with_prefix("RV")
                    .prefix_separator("_")
                    .separator("__"),
            );

        for (var, key) in LEGACY_ENV_KEYS {
            let value = std::env::var(var).ok().filter(|v| !v.trim().is_empty());
            builder = builder.set_override_option(*key, value)?;
        }

        let app_cfg: AppConfig = builder.build()?.try_deserialize()?;
        Ok(app_cfg)
    }

    /// The actuals collection for the configured convention, if any.
    pub fn actuals_collection(&self) -> Option<CollectionConfig> {
        let (database, collection) = match self.actuals.source {
            ActualsConvention::LatestCmot => {
                (self.announcements.database.clone(), LATEST_CMOT_COLLECTION)
            }
            ActualsConvention::FinResMetrics => {
                (self.previews.database.clone(), FIN_RES_METRICS_COLLECTION)
            }
            ActualsConvention::Disabled => return None,
        };

        Some(CollectionConfig {
            database: self.actuals.database.clone().unwrap_or(database),
            collection: self
                .actuals
                .collection
                .clone()
                .unwrap_or_else(|| collection.to_string()),
        })
    }

    /// Every collection the store should hold.
    pub fn collections(&self) -> Vec<CollectionConfig> {
        let mut out = vec![self.announcements.clone(), self.previews.clone()];
        if let Some(actuals) = self.actuals_collection() {
            out.push(actuals);
        }
        out
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
            run_migrations: true,
        }
    }
}

impl Default for ActualsConfig {
    fn default() -> Self {
        Self {
            source: default_actuals_source(),
            database: None,
            collection: None,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            username: default_username(),
            password: default_password(),
        }
    }
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            options_ttl_secs: default_options_ttl_secs(),
            max_news: default_max_news(),
            default_news: default_news(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            store: StoreConfig::default(),
            announcements: CollectionConfig {
                database: ANNOUNCEMENTS_DB.to_string(),
                collection: ANNOUNCEMENTS_COLLECTION.to_string(),
            },
            previews: CollectionConfig {
                database: PREVIEWS_DB.to_string(),
                collection: PREVIEWS_COLLECTION.to_string(),
            },
            actuals: ActualsConfig::default(),
            auth: AuthConfig::default(),
            viewer: ViewerConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_actuals_collection_per_convention() {
        let mut cfg = AppConfig::default();
        assert_eq!(
            cfg.actuals_collection(),
            Some(CollectionConfig {
                database: "RAG_CHATBOT".into(),
                collection: "LatestCmotData".into(),
            })
        );

        cfg.actuals.source = ActualsConvention::FinResMetrics;
        assert_eq!(
            cfg.actuals_collection(),
            Some(CollectionConfig {
                database: "CAG_CHATBOT".into(),
                collection: "CollectionFinResMetrices".into(),
            })
        );

        cfg.actuals.source = ActualsConvention::Disabled;
        assert_eq!(cfg.actuals_collection(), None);
        assert_eq!(cfg.collections().len(), 2);
    }

    #[test]
    fn test_explicit_actuals_names_win() {
        let mut cfg = AppConfig::default();
        cfg.actuals.database = Some("FIN".into());
        cfg.actuals.collection = Some("quarterly".into());
        let coll = cfg.actuals_collection().unwrap();
        assert_eq!(coll.database, "FIN");
        assert_eq!(coll.collection, "quarterly");
    }

    #[test]
    fn test_convention_names_deserialize() {
        let parsed: ActualsConvention = serde_json::from_str("\"fin_res_metrics\"").unwrap();
        assert_eq!(parsed, ActualsConvention::FinResMetrics);
        let parsed: ActualsConvention = serde_json::from_str("\"none\"").unwrap();
        assert_eq!(parsed, ActualsConvention::Disabled);
    }
}
