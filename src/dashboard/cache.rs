use crate::error::Result;
use crate::models::CompanyOption;
use chrono::{DateTime, Duration, Utc};
use tracing::debug;

struct CacheEntry {
    options: Vec<CompanyOption>,
    expires_at: DateTime<Utc>,
}

/// The company selection list, recomputed at most once per TTL window.
pub struct OptionsCache {
    ttl: Duration,
    entry: Option<CacheEntry>,
}

impl OptionsCache {
    pub fn new(ttl_secs: u64) -> Self {
        Self {
            ttl: i64::try_from(ttl_secs)
                .ok()
                .and_then(Duration::try_seconds)
                .unwrap_or(Duration::MAX),
            entry: None,
        }
    }

    /// Cached options, if still valid at `now`.
    pub fn get(&self, now: DateTime<Utc>) -> Option<&[CompanyOption]> {
        self.entry
            .as_ref()
            .filter(|e| now < e.expires_at)
            .map(|e| e.options.as_slice())
    }

    pub fn refresh(&mut self, options: Vec<CompanyOption>, now: DateTime<Utc>) {
        debug!("options cache refreshed with {} entries", options.len());
        self.entry = Some(CacheEntry {
            options,
            expires_at: now
                .checked_add_signed(self.ttl)
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
        });
    }

    pub fn invalidate(&mut self) {
        self.entry = None;
    }

    /// Valid cached options, or the result of `load` stored for the next TTL window.
    pub fn get_or_refresh<F>(&mut self, now: DateTime<Utc>, load: F) -> Result<&[CompanyOption]>
    where
        F: FnOnce() -> Result<Vec<CompanyOption>>,
    {
        if self.get(now).is_none() {
            let options = load()?;
            self.refresh(options, now);
        }
        Ok(self
            .entry
            .as_ref()
            .map(|e| e.options.as_slice())
            .unwrap_or(&[]))
    }
}
