//! Embedded document store.
//!
//! Each configured `database.collection` becomes the DuckDB table
//! `"database"."collection"`. Documents are kept whole as JSON text; the
//! identity fields used for lookups are extracted into columns on insert.

use crate::config::CollectionConfig;
use crate::error::{Result, ViewerError};
use crate::models::{value_text, CompanyIdentity, CompanyOption};
use chrono::Utc;
use duckdb::{params, Connection};
use serde_json::Value;
use std::path::Path;
use tracing::{debug, info};

/// Hard ceiling of the announcement display-count control.
pub const MAX_NEWS_LIMIT: usize = 50;

// ── Schema ────────────────────────────────────────────────────────────────────

const META_DDL: &str = r#"
CREATE TABLE IF NOT EXISTS schema_version (
    version     INTEGER PRIMARY KEY,
    applied_at  TIMESTAMP NOT NULL
);
"#;

fn collection_ddl(schema: &str, table: &str, qualified: &str) -> String {
    format!(
        r#"
CREATE SCHEMA IF NOT EXISTS "{schema}";

CREATE TABLE IF NOT EXISTS {qualified} (
    seq              BIGINT    PRIMARY KEY,
    company_id       VARCHAR,
    nse              VARCHAR,
    bse              BIGINT,
    isin             VARCHAR,
    company_name     VARCHAR,
    company_display  VARCHAR,
    company_key      VARCHAR,
    -- filing timestamp as stored (dt_tm); ISO strings sort correctly
    filed_at         VARCHAR,
    body             VARCHAR   NOT NULL,
    loaded_at        TIMESTAMP NOT NULL
);

CREATE INDEX IF NOT EXISTS "{table}_nse_idx"   ON {qualified} (nse);
CREATE INDEX IF NOT EXISTS "{table}_filed_idx" ON {qualified} (filed_at);
"#
    )
}

/// `"database"."collection"`, after checking both parts are plain identifiers.
pub fn qualified_name(coll: &CollectionConfig) -> Result<String> {
    for part in [&coll.database, &coll.collection] {
        let valid = !part.is_empty()
            && part.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
        if !valid {
            return Err(ViewerError::InvalidIdentifier(part.clone()));
        }
    }
    Ok(format!(r#""{}"."{}""#, coll.database, coll.collection))
}

// ── Repository ────────────────────────────────────────────────────────────────

pub struct Repository {
    conn: Connection,
}

impl Repository {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        debug!("Opening DuckDB at {:?}", path);
        Ok(Self { conn: Connection::open(path)? })
    }

    pub fn open_in_memory() -> Result<Self> {
        Ok(Self { conn: Connection::open_in_memory()? })
    }

    pub fn run_migrations(&self, collections: &[CollectionConfig]) -> Result<()> {
        info!("Running migrations…");
        self.conn.execute_batch(META_DDL)?;
        for coll in collections {
            let qualified = qualified_name(coll)?;
            self.conn
                .execute_batch(&collection_ddl(&coll.database, &coll.collection, &qualified))?;
            debug!("collection {} ready", qualified);
        }
        self.conn.execute(
            "INSERT OR IGNORE INTO schema_version (version, applied_at) VALUES (1, ?)",
            params![Utc::now().naive_utc()],
        )?;
        info!("Migrations done.");
        Ok(())
    }

    // ── Writes ────────────────────────────────────────────────────────────────

    /// Append documents in order. Retrieval order follows insertion order.
    pub fn insert_documents(&self, coll: &CollectionConfig, docs: &[Value]) -> Result<usize> {
        if docs.is_empty() {
            return Ok(0);
        }
        let table = qualified_name(coll)?;

        let tx = self.conn.unchecked_transaction()?;
        let last_seq: i64 = tx.query_row(
            &format!("SELECT COALESCE(MAX(seq), 0) FROM {table}"),
            [],
            |r| r.get(0),
        )?;

        let sql = format!(
            r#"INSERT INTO {table}
                (seq, company_id, nse, bse, isin, company_name, company_display, company_key,
                 filed_at, body, loaded_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#
        );
        let now = Utc::now().naive_utc();

        for (i, doc) in docs.iter().enumerate() {
            if !doc.is_object() {
                return Err(ViewerError::NotAnObject(truncate(&doc.to_string(), 80)));
            }
            let id = CompanyIdentity::from_document(doc);
            let filed_at = doc.get("dt_tm").and_then(value_text);
            tx.execute(
                &sql,
                params![
                    last_seq + 1 + i as i64,
                    id.company_id,
                    id.nse,
                    id.bse,
                    id.isin,
                    id.name,
                    id.display,
                    id.key,
                    filed_at,
                    doc.to_string(),
                    now,
                ],
            )?;
        }

        tx.commit()?;
        Ok(docs.len())
    }

    // ── Lookups ───────────────────────────────────────────────────────────────

    /// Identity-OR lookup: company id / NSE / ISIN exact (upper-cased query),
    /// display name / key / company name case-insensitive substring, BSE exact
    /// when the query is numeric. Rows come back in retrieval order.
    pub fn find_by_query(&self, coll: &CollectionConfig, query: &str) -> Result<Vec<Value>> {
        let q = query.trim();
        if q.is_empty() {
            return Ok(vec![]);
        }
        let table = qualified_name(coll)?;
        let upper = q.to_uppercase();
        let lower = q.to_lowercase();
        let bse: Option<i64> = if q.chars().all(|c| c.is_ascii_digit()) {
            q.parse().ok()
        } else {
            None
        };

        let sql = format!(
            r#"SELECT body FROM {table}
               WHERE company_id = $1
                  OR nse = $1
                  OR isin = $1
                  OR contains(lower(company_display), $2)
                  OR contains(lower(company_key), $2)
                  OR contains(lower(company_name), $2)
                  OR bse = $3
               ORDER BY seq"#
        );
        let docs = self.query_bodies(&sql, params![upper, lower, bse])?;
        debug!("{}: {} candidates for {:?}", table, docs.len(), q);
        Ok(docs)
    }

    /// Latest announcements for one company option, newest filing first.
    pub fn news_for_company(
        &self,
        coll: &CollectionConfig,
        option: &CompanyOption,
        limit: usize,
    ) -> Result<Vec<Value>> {
        if option.nse.is_none() && option.bse.is_none() && option.isin.is_none() && option.name.is_none() {
            return Ok(vec![]);
        }
        let table = qualified_name(coll)?;
        let limit = limit.clamp(1, MAX_NEWS_LIMIT);
        let name = option.name.as_deref().map(str::to_lowercase);

        let sql = format!(
            r#"SELECT body FROM {table}
               WHERE company_id = $1
                  OR nse = $1
                  OR bse = $2
                  OR isin = $3
                  OR contains(lower(company_name), $4)
               ORDER BY filed_at DESC NULLS LAST, seq
               LIMIT {limit}"#
        );
        self.query_bodies(&sql, params![option.nse, option.bse, option.isin, name])
    }

    /// One option per distinct (NSE, BSE, name, ISIN) tuple with its document count.
    pub fn company_options(&self, coll: &CollectionConfig) -> Result<Vec<CompanyOption>> {
        let table = qualified_name(coll)?;
        let mut stmt = self.conn.prepare(&format!(
            r#"SELECT nse, bse, company_name, isin, COUNT(*) AS n
               FROM {table}
               GROUP BY nse, bse, company_name, isin
               ORDER BY company_name ASC NULLS FIRST, nse NULLS FIRST, bse NULLS FIRST, isin NULLS FIRST"#
        ))?;

        let options = stmt
            .query_map([], |r| {
                Ok(CompanyOption {
                    nse: r.get(0)?,
                    bse: r.get(1)?,
                    name: r.get(2)?,
                    isin: r.get(3)?,
                    count: r.get(4)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(options)
    }

    pub fn document_count(&self, coll: &CollectionConfig) -> Result<i64> {
        let table = qualified_name(coll)?;
        let mut s = self.conn.prepare(&format!("SELECT COUNT(*) FROM {table}"))?;
        Ok(s.query_row([], |r| r.get(0))?)
    }

    fn query_bodies(&self, sql: &str, params: &[&dyn duckdb::ToSql]) -> Result<Vec<Value>> {
        let mut stmt = self.conn.prepare(sql)?;
        let bodies = stmt
            .query_map(params, |r| r.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        bodies
            .iter()
            .map(|b| serde_json::from_str(b).map_err(ViewerError::from))
            .collect()
    }
}

fn truncate(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => format!("{}…", &s[..idx]),
        None => s.to_string(),
    }
}
