// Tests for dataset loading and writing

use relink_core::dataset::{
    DatasetFormat, PageSampleRow, generate_seed_sql, load_canonical, load_catalog,
    load_discovered, load_recoveries, save_csv, save_json, sql_escape,
};
use relink_core::error::CatalogError;
use relink_core::model::{CanonicalEntry, RecoveryReason, RecoveryResult, Verdict};
use relink_scanner::{PageSample, ProbeMethod};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn write(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).unwrap();
    path
}

fn canonical(name: &str, url: &str, domain: &str) -> CanonicalEntry {
    CanonicalEntry {
        slug: name.to_lowercase().replace(' ', "-"),
        name: name.to_string(),
        category: "writing".to_string(),
        tags: "text, ai".to_string(),
        description: "Writes things".to_string(),
        url: url.to_string(),
        domain: domain.to_string(),
        verdict: Verdict::Verified,
        recovered_confidence: None,
    }
}

// ============================================================================
// Format detection
// ============================================================================

#[test]
fn test_format_from_extension() {
    assert_eq!(DatasetFormat::from_path(Path::new("a/tools.CSV")).unwrap(), DatasetFormat::Csv);
    assert_eq!(DatasetFormat::from_path(Path::new("tools.json")).unwrap(), DatasetFormat::Json);
    assert!(matches!(
        DatasetFormat::from_path(Path::new("tools.xlsx")),
        Err(CatalogError::UnsupportedFormat(_))
    ));
}

// ============================================================================
// Catalog loading
// ============================================================================

#[test]
fn test_load_spreadsheet_export() {
    let dir = TempDir::new().unwrap();
    let path = write(
        &dir,
        "tools.csv",
        "Tool Name,Category,Tags,Description,Website Link\n\
         Acme Writer,writing,\"text, ai\",Writes things,https://acmewriter.io\n\
         Zeta,code,,,https://zeta.io/\n",
    );

    let entries = load_catalog(&path).unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].name, "Acme Writer");
    assert_eq!(entries[0].tags, "text, ai");
    assert_eq!(entries[0].url, "https://acmewriter.io");
    assert!(entries[0].verdict.is_none());
    assert!(entries[1].description.is_empty());
}

#[test]
fn test_load_missing_url_column() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "tools.csv", "Tool Name,Category\nAcme,writing\n");

    match load_catalog(&path) {
        Err(CatalogError::MissingField { field, .. }) => assert_eq!(field, "url"),
        other => panic!("expected a missing field error, got {:?}", other.map(|e| e.len())),
    }
}

#[test]
fn test_audited_catalog_round_trips_through_csv() {
    let dir = TempDir::new().unwrap();
    let source = write(
        &dir,
        "tools.csv",
        "Tool Name,Category,Tags,Description,Website Link\nAcme,writing,,,https://acme.io\n",
    );
    let mut entries = load_catalog(&source).unwrap();
    entries[0].status = Some(200);
    entries[0].final_url = Some("https://acme.io/".to_string());
    entries[0].method = Some(ProbeMethod::Get);
    entries[0].verdict = Some(Verdict::Verified);

    let out = dir.path().join("audit/tools_with_audit.csv");
    save_csv(&out, &entries).unwrap();
    let reloaded = load_catalog(&out).unwrap();
    assert_eq!(reloaded, entries);
}

#[test]
fn test_load_json_array_and_d1_export() {
    let dir = TempDir::new().unwrap();
    let plain = write(
        &dir,
        "plain.json",
        r#"[{"tool_name": "Acme", "category": "writing", "website_link": "https://acme.io/", "tags": null}]"#,
    );
    let d1 = write(
        &dir,
        "d1.json",
        r#"[{"results": [
            {"slug": "acme", "name": "Acme", "category": "writing", "website_url": "https://acme.io/", "quality_status": "verified"},
            {"slug": "zeta", "name": "Zeta", "category": "code", "website_url": "https://zeta.io/", "quality_status": "scraped_verified"}
        ], "success": true}]"#,
    );

    let entries = load_catalog(&plain).unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].url, "https://acme.io/");
    assert!(entries[0].tags.is_empty());

    let entries = load_catalog(&d1).unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[1].verdict, Some(Verdict::ScrapedVerified));
}

#[test]
fn test_json_object_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "tools.json", r#"{"name": "Acme"}"#);
    assert!(matches!(load_catalog(&path), Err(CatalogError::UnsupportedFormat(_))));
}

// ============================================================================
// Stage outputs
// ============================================================================

#[test]
fn test_recoveries_round_trip() {
    let dir = TempDir::new().unwrap();
    let rows = vec![
        RecoveryResult {
            tool_name: "Acme".to_string(),
            old_url: "https://old.io".to_string(),
            candidate_url: "https://acme.io/".to_string(),
            candidate_domain: "acme.io".to_string(),
            http_status: 200,
            confidence: 0.85,
            accepted: true,
            reason: RecoveryReason::Accepted,
        },
        RecoveryResult::empty("Ghost", "https://ghost.io", RecoveryReason::Error("timed out".to_string())),
    ];
    let path = dir.path().join("recovered_links.csv");
    save_csv(&path, &rows).unwrap();

    let text = fs::read_to_string(&path).unwrap();
    assert!(text.contains(",1,accepted"));
    assert!(text.contains("error:timed out"));

    assert_eq!(load_recoveries(&path).unwrap(), rows);
}

#[test]
fn test_recoveries_accept_float_flags() {
    let dir = TempDir::new().unwrap();
    let path = write(
        &dir,
        "recovered.csv",
        "tool_name,old_url,candidate_url,candidate_domain,http_status,confidence,accepted,reason\n\
         Acme,https://old.io,https://acme.io/,acme.io,200,0.9,1.0,accepted\n",
    );
    let rows = load_recoveries(&path).unwrap();
    assert!(rows[0].accepted);
}

#[test]
fn test_empty_discovery_file() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "new_tools_verified.csv", "");
    assert!(load_discovered(&path).unwrap().is_empty());
}

#[test]
fn test_discovery_file_with_source_column_names() {
    let dir = TempDir::new().unwrap();
    let path = write(
        &dir,
        "new_tools_verified.csv",
        "name,heading,category,desc,domain,website,score,source,status\n\
         Orbit,Developer Tools,code assistant,Ships code,orbit.dev,https://orbit.dev/,1.0,listing,200\n",
    );
    let tools = load_discovered(&path).unwrap();
    assert_eq!(tools.len(), 1);
    assert_eq!(tools[0].url, "https://orbit.dev/");
    assert_eq!(tools[0].description, "Ships code");
    assert_eq!(tools[0].status, Some(200));
}

#[test]
fn test_canonical_json_round_trip() {
    let dir = TempDir::new().unwrap();
    let catalog = vec![canonical("Acme", "https://acme.io/", "acme.io")];
    let path = dir.path().join("data/tools_cleaned.json");
    save_json(&path, &catalog).unwrap();
    assert_eq!(load_canonical(&path).unwrap(), catalog);
}

#[test]
fn test_page_sample_row_joins_signatures() {
    let sample = PageSample {
        url: "https://parked.io/".to_string(),
        status: 200,
        final_url: "https://parked.io/".to_string(),
        signatures: vec!["parking_sedo".to_string(), "parked_host:sedoparking.com".to_string()],
        ok: false,
        error: None,
    };
    let row = PageSampleRow::from(&sample);
    assert_eq!(row.signature_hits, "parking_sedo|parked_host:sedoparking.com");
}

// ============================================================================
// Seed SQL
// ============================================================================

#[test]
fn test_sql_escape_doubles_quotes() {
    assert_eq!(sql_escape("O'Reilly's"), "O''Reilly''s");
    assert_eq!(sql_escape("plain"), "plain");
}

#[test]
fn test_seed_sql_shape() {
    let catalog = vec![
        canonical("Acme", "https://acme.io/", "acme.io"),
        canonical("Bob's Tool", "https://bobs.io/", "bobs.io"),
    ];
    let sql = generate_seed_sql(&catalog);
    let lines: Vec<&str> = sql.lines().filter(|l| !l.starts_with("--")).collect();

    assert_eq!(lines[0], "DELETE FROM tools;");
    assert_eq!(lines.len(), 3);
    assert!(lines[1].starts_with("INSERT INTO tools (slug, name, category, tags, description, website_url, domain, quality_status) VALUES ('acme'"));
    assert!(lines[2].contains("'Bob''s Tool'"));
    assert!(lines[2].ends_with("'verified');"));
}
