//! Bulk import of JSON document dumps into a collection.
//!
//! `.json` files hold either one object or an array of objects; `.ndjson` /
//! `.jsonl` files hold one object per line (the `mongoexport` default).

use anyhow::{bail, Context, Result};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const EXTENSIONS: [&str; 3] = ["json", "ndjson", "jsonl"];

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
}

/// Read every document from one dump file.
pub fn load_documents(path: &Path) -> Result<Vec<Value>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Cannot read {:?}", path))?;

    let docs = match extension(path).as_deref() {
        Some("ndjson") | Some("jsonl") => parse_lines(&text, path),
        _ => parse_json(&text).with_context(|| format!("Invalid JSON in {:?}", path))?,
    };

    info!("{:?}: {} documents", path, docs.len());
    Ok(docs)
}

fn parse_json(text: &str) -> Result<Vec<Value>> {
    match serde_json::from_str::<Value>(text)? {
        Value::Array(items) => {
            let mut docs = Vec::with_capacity(items.len());
            for (i, item) in items.into_iter().enumerate() {
                if !item.is_object() {
                    bail!("element {} is not an object", i);
                }
                docs.push(item);
            }
            Ok(docs)
        }
        obj @ Value::Object(_) => Ok(vec![obj]),
        other => bail!("expected an object or array, found {}", kind(&other)),
    }
}

/// Line-delimited documents. Bad lines are skipped with a warning.
fn parse_lines(text: &str, path: &Path) -> Vec<Value> {
    let mut docs = Vec::new();
    for (i, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<Value>(line) {
            Ok(doc) if doc.is_object() => docs.push(doc),
            Ok(other) => warn!("Line {} in {:?}: expected an object, found {}", i + 1, path, kind(&other)),
            Err(e) => warn!("Line {} in {:?}: {}", i + 1, path, e),
        }
    }
    docs
}

fn kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// A single dump file, or every dump file in a directory (sorted by name).
pub fn discover_document_files(path: &Path) -> Result<Vec<PathBuf>> {
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }
    if !path.exists() {
        return Ok(vec![]);
    }

    let mut files = Vec::new();
    for entry in std::fs::read_dir(path).with_context(|| format!("Cannot list {:?}", path))? {
        let p = entry?.path();
        let known = extension(&p).is_some_and(|e| EXTENSIONS.contains(&e.as_str()));
        if p.is_file() && known {
            files.push(p);
        } else {
            debug!("skipping {:?}", p);
        }
    }
    files.sort();
    Ok(files)
}
