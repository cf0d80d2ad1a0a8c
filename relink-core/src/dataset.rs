// Loading and writing catalog datasets: CSV, JSON and the SQL seed script

use crate::error::{CatalogError, Result};
use crate::model::{CanonicalEntry, CatalogEntry, DiscoveredTool, RecoveryResult};
use relink_scanner::PageSample;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::Path;
use tracing::info;

const NAME_COLUMNS: &[&str] = &["name", "Tool Name", "tool_name"];
const URL_COLUMNS: &[&str] = &["url", "Website Link", "website_link", "website_url"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatasetFormat {
    Csv,
    Json,
}

impl DatasetFormat {
    pub fn from_path(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();
        match extension.as_str() {
            "csv" => Ok(DatasetFormat::Csv),
            "json" => Ok(DatasetFormat::Json),
            other => Err(CatalogError::UnsupportedFormat(format!(
                "'{}' ({})",
                path.display(),
                if other.is_empty() { "no extension" } else { other }
            ))),
        }
    }
}

/// One inspected page, flattened for CSV.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageSampleRow {
    pub url: String,
    pub status: i32,
    pub final_url: String,
    pub signature_hits: String,
    pub ok: bool,
    pub error: Option<String>,
}

impl From<&PageSample> for PageSampleRow {
    fn from(sample: &PageSample) -> Self {
        Self {
            url: sample.url.clone(),
            status: sample.status,
            final_url: sample.final_url.clone(),
            signature_hits: sample.signatures.join("|"),
            ok: sample.ok,
            error: sample.error.clone(),
        }
    }
}

/// Load catalog rows from a spreadsheet export, one of our own CSV outputs,
/// a JSON array or a D1 `[{"results": [...]}]` export.
pub fn load_catalog(path: &Path) -> Result<Vec<CatalogEntry>> {
    let entries: Vec<CatalogEntry> = match DatasetFormat::from_path(path)? {
        DatasetFormat::Csv => {
            require_columns(path, &[("name", NAME_COLUMNS), ("url", URL_COLUMNS)])?;
            read_csv(path)?
        }
        DatasetFormat::Json => read_json_records(path)?,
    };
    info!("Loaded {} catalog rows from {}", entries.len(), path.display());
    Ok(entries)
}

pub fn load_recoveries(path: &Path) -> Result<Vec<RecoveryResult>> {
    if fs::metadata(path)?.len() == 0 {
        return Ok(Vec::new());
    }
    require_columns(
        path,
        &[
            ("tool_name", &["tool_name"]),
            ("old_url", &["old_url"]),
            ("accepted", &["accepted"]),
        ],
    )?;
    read_csv(path)
}

/// Discovery output. An empty file means nothing was found.
pub fn load_discovered(path: &Path) -> Result<Vec<DiscoveredTool>> {
    if fs::metadata(path)?.len() == 0 {
        return Ok(Vec::new());
    }
    require_columns(
        path,
        &[
            ("name", &["name", "tool_name"]),
            ("url", &["url", "website", "website_link"]),
        ],
    )?;
    read_csv(path)
}

pub fn load_canonical(path: &Path) -> Result<Vec<CanonicalEntry>> {
    match DatasetFormat::from_path(path)? {
        DatasetFormat::Csv => read_csv(path),
        DatasetFormat::Json => read_json_records(path),
    }
}

fn read_csv<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut rows = Vec::new();
    for record in reader.deserialize() {
        rows.push(record?);
    }
    Ok(rows)
}

fn require_columns(path: &Path, required: &[(&str, &[&str])]) -> Result<()> {
    let mut reader = csv::Reader::from_path(path)?;
    let headers = reader.headers()?.clone();
    for (field, aliases) in required {
        if !headers.iter().any(|h| aliases.contains(&h.trim())) {
            return Err(CatalogError::MissingField {
                field: field.to_string(),
                source_name: path.display().to_string(),
            });
        }
    }
    Ok(())
}

fn read_json_records<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let text = fs::read_to_string(path)?;
    let value: Value = serde_json::from_str(&text)?;
    let records = json_records(value).ok_or_else(|| {
        CatalogError::UnsupportedFormat(format!(
            "'{}' is not a JSON array of records",
            path.display()
        ))
    })?;

    records
        .into_iter()
        .map(|record| serde_json::from_value(strip_nulls(record)).map_err(CatalogError::from))
        .collect()
}

/// Unwrap a plain array of records or D1's `[{"results": [...]}]` shape.
fn json_records(value: Value) -> Option<Vec<Value>> {
    let Value::Array(items) = value else {
        return None;
    };
    let is_d1 = items
        .first()
        .and_then(Value::as_object)
        .is_some_and(|first| first.get("results").is_some_and(Value::is_array));
    if !is_d1 {
        return Some(items);
    }

    let mut records = Vec::new();
    for item in items {
        if let Value::Object(mut batch) = item
            && let Some(Value::Array(rows)) = batch.remove("results")
        {
            records.extend(rows);
        }
    }
    Some(records)
}

/// Drop null members so that field defaults apply.
fn strip_nulls(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(map.into_iter().filter(|(_, v)| !v.is_null()).collect()),
        other => other,
    }
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

pub fn save_csv<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    ensure_parent(path)?;
    let mut writer = csv::Writer::from_path(path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    info!("Wrote {} rows to {}", rows.len(), path.display());
    Ok(())
}

pub fn save_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    ensure_parent(path)?;
    let writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(writer, value)?;
    info!("Wrote {}", path.display());
    Ok(())
}

pub fn sql_escape(value: &str) -> String {
    value.replace('\'', "''")
}

/// `DELETE FROM tools;` followed by one insert per catalog row.
pub fn generate_seed_sql(catalog: &[CanonicalEntry]) -> String {
    let mut sql = String::from("-- Generated by relink build\nDELETE FROM tools;\n");
    for entry in catalog {
        sql.push_str(&format!(
            "INSERT INTO tools (slug, name, category, tags, description, website_url, domain, quality_status) \
             VALUES ('{}', '{}', '{}', '{}', '{}', '{}', '{}', '{}');\n",
            sql_escape(&entry.slug),
            sql_escape(&entry.name),
            sql_escape(&entry.category),
            sql_escape(&entry.tags),
            sql_escape(&entry.description),
            sql_escape(&entry.url),
            sql_escape(&entry.domain),
            entry.verdict.as_str(),
        ));
    }
    sql
}

pub fn save_seed_sql(path: &Path, catalog: &[CanonicalEntry]) -> Result<()> {
    ensure_parent(path)?;
    fs::write(path, generate_seed_sql(catalog))?;
    info!("Wrote seed script for {} tools to {}", catalog.len(), path.display());
    Ok(())
}
