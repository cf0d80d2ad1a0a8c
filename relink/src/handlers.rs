use clap::ArgMatches;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use relink_core::audit::{AuditOptions, execute_audit};
use relink_core::data::Database;
use relink_core::dataset::{
    PageSampleRow, load_catalog, load_discovered, load_recoveries, save_csv, save_json,
    save_seed_sql,
};
use relink_core::discover::{DiscoveryOptions, execute_discovery, existing_roots};
use relink_core::model::{CatalogEntry, DiscoveredTool, RecoveryResult};
use relink_core::placeholder::{PlaceholderOptions, execute_placeholder_audit};
use relink_core::reconcile::{ReconcileOptions, reconcile};
use relink_core::recover::{RecoveryOptions, execute_recovery};
use relink_core::report::{
    generate_audit_report, generate_dataset_report, generate_discovery_report,
    generate_json_report, generate_placeholder_report, generate_recovery_report, save_report,
};
use relink_scanner::{DuckDuckGoSearch, ProbeConfig, ProgressCallback, ProgressUpdate};
use std::collections::HashSet;
use std::fmt::Display;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;
use url::Url;

/// Expand `~` and return the path.
pub fn expand_path(raw: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(raw).as_ref())
}

/// Locations of every artifact the pipeline reads or writes, relative to one
/// working directory.
#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactPaths {
    root: PathBuf,
}

impl ArtifactPaths {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }

    pub fn from_args(args: &ArgMatches) -> Self {
        let raw = args.get_one::<String>("out-dir").map(String::as_str).unwrap_or(".");
        Self::new(&expand_path(raw))
    }

    fn audit(&self, file: &str) -> PathBuf {
        self.root.join("audit").join(file)
    }

    fn data(&self, file: &str) -> PathBuf {
        self.root.join("data").join(file)
    }

    pub fn url_audit(&self) -> PathBuf {
        self.audit("url_audit.csv")
    }

    pub fn tools_with_audit(&self) -> PathBuf {
        self.audit("tools_with_audit.csv")
    }

    pub fn invalid_rows(&self) -> PathBuf {
        self.audit("invalid_rows.csv")
    }

    pub fn audit_summary(&self) -> PathBuf {
        self.audit("audit_summary.json")
    }

    pub fn live_link_audit(&self) -> PathBuf {
        self.audit("live_link_audit.csv")
    }

    pub fn flagged_placeholders(&self) -> PathBuf {
        self.audit("live_flagged_placeholder.csv")
    }

    pub fn recovered_links(&self) -> PathBuf {
        self.audit("recovered_links.csv")
    }

    pub fn new_tools(&self) -> PathBuf {
        self.audit("new_tools_verified.csv")
    }

    pub fn cleaned_csv(&self) -> PathBuf {
        self.data("tools_cleaned.csv")
    }

    pub fn cleaned_json(&self) -> PathBuf {
        self.data("tools_cleaned.json")
    }

    pub fn seed_sql(&self) -> PathBuf {
        self.data("seed.sql")
    }

    pub fn dataset_summary(&self) -> PathBuf {
        self.data("dataset_summary.json")
    }
}

/// Apply the command-line overrides on top of a preset.
pub fn probe_config(base: ProbeConfig, concurrency: usize, timeout_secs: u64) -> ProbeConfig {
    let total_timeout = Duration::from_secs(timeout_secs.max(1));
    ProbeConfig {
        concurrency: concurrency.max(1),
        read_timeout: base.read_timeout.min(total_timeout),
        connect_timeout: base.connect_timeout.min(total_timeout),
        total_timeout,
        ..base
    }
}

pub fn recovery_options(
    workers: usize,
    candidate_limit: usize,
    min_confidence: f64,
    max_rows: usize,
) -> Result<RecoveryOptions, String> {
    let options = RecoveryOptions {
        workers,
        candidate_limit,
        min_confidence,
        max_rows,
        ..RecoveryOptions::default()
    };
    options.validate().map_err(|e| e.to_string())?;
    Ok(options)
}

/// Recovered links, or nothing when the recover stage has not run.
pub fn load_optional_recoveries(path: &Path) -> Result<Vec<RecoveryResult>, String> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    load_recoveries(path).map_err(|e| format!("Failed to load {}: {}", path.display(), e))
}

/// Discovered tools, or nothing when the discover stage has not run.
pub fn load_optional_discovered(path: &Path) -> Result<Vec<DiscoveredTool>, String> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    load_discovered(path).map_err(|e| format!("Failed to load {}: {}", path.display(), e))
}

/// Root domains already present in a catalog, counting both the entered and
/// the post-redirect link.
pub fn catalog_roots(entries: &[CatalogEntry]) -> HashSet<String> {
    existing_roots(
        entries
            .iter()
            .flat_map(|e| [e.url.as_str(), e.effective_url()]),
    )
}

/// Open the snapshot database, creating parent directories. With `fresh` an
/// existing database file is removed first.
pub fn open_snapshot_db(path: &Path, fresh: bool) -> Result<Database, String> {
    if fresh && Database::exists(path) {
        Database::drop(path).map_err(|e| format!("Failed to remove {}: {}", path.display(), e))?;
    }
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create {}: {}", parent.display(), e))?;
    }
    Database::new(path).map_err(|e| format!("Failed to open {}: {}", path.display(), e))
}

/// Snapshot id named on the command line. `latest` picks the newest one.
pub fn resolve_snapshot_id(database: &Database, requested: &str) -> Result<String, String> {
    if requested == "latest" {
        return database
            .latest_snapshot()
            .map_err(|e| e.to_string())?
            .map(|snapshot| snapshot.id)
            .ok_or_else(|| "No snapshots recorded yet".to_string());
    }
    if database.snapshot_exists(requested).map_err(|e| e.to_string())? {
        Ok(requested.to_string())
    } else {
        Err(format!("No snapshot with id {}", requested))
    }
}

pub fn source_urls(args: &ArgMatches) -> Option<Vec<String>> {
    args.get_many::<Url>("source")
        .map(|urls| urls.map(|u| u.as_str().to_string()).collect())
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

fn fail(message: impl Display) -> ! {
    eprintln!("{} {}", "✗".red().bold(), message);
    std::process::exit(1);
}

fn print_divider() {
    println!("{}", "═".repeat(60).bright_blue().bold());
}

fn print_header(title: &str) {
    print_divider();
    println!("{}", format!("  {}", title).bright_white().bold());
    print_divider();
    println!();
}

fn print_written(path: &Path) {
    println!(
        "{} {}",
        "✓".green().bold(),
        path.display().to_string().bright_white()
    );
}

fn progress_bar(label: &'static str) -> ProgressBar {
    let pb = ProgressBar::new(0);
    let template = format!("[{{bar:40.cyan/blue}}] {{pos}}/{{len}} {} {{msg}}", label);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(&template)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=>-"),
    );
    pb
}

fn bar_callback(pb: &ProgressBar) -> ProgressCallback {
    let pb = pb.clone();
    Arc::new(move |update: ProgressUpdate| {
        pb.set_length(update.total as u64);
        pb.set_position(update.completed as u64);
    })
}

fn load_audited(paths: &ArtifactPaths) -> Vec<CatalogEntry> {
    let path = paths.tools_with_audit();
    if !path.exists() {
        fail(format!(
            "{} not found, run `relink audit` first",
            path.display()
        ));
    }
    load_catalog(&path).unwrap_or_else(|e| fail(e))
}

fn write_json_summary<T: serde::Serialize>(stage: &str, summary: &T, path: &Path) {
    let json = generate_json_report(stage, summary).unwrap_or_else(|e| fail(e));
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap_or_else(|e| fail(e));
    }
    save_report(&json, path).unwrap_or_else(|e| fail(e));
    print_written(path);
}

pub async fn handle_audit(args: &ArgMatches) {
    init_logging();

    let Some(input) = args.get_one::<String>("input") else {
        fail("--input is required");
    };
    let input = expand_path(input);
    let paths = ArtifactPaths::from_args(args);
    let concurrency = *args.get_one::<usize>("concurrency").unwrap_or(&80);
    let timeout = *args.get_one::<u64>("timeout").unwrap_or(&20);

    let entries = load_catalog(&input).unwrap_or_else(|e| fail(e));
    print_header("LINK AUDIT");
    println!(
        "{} Catalog: {} ({} rows)",
        "→".blue(),
        input.display().to_string().bright_white(),
        entries.len().to_string().cyan()
    );
    println!("{} Concurrency: {}", "→".blue(), concurrency);
    println!();

    let options = AuditOptions {
        probe: probe_config(ProbeConfig::default(), concurrency, timeout),
        show_progress_bars: true,
    };
    let outcome = execute_audit(entries, options, None)
        .await
        .unwrap_or_else(|e| fail(format!("Audit failed: {}", e)));

    println!("\n{} Audit complete!\n", "✓".green().bold());
    print!("{}", generate_audit_report(&outcome.summary, &outcome.results));

    let invalid: Vec<&CatalogEntry> = outcome.invalid_entries().collect();
    save_csv(&paths.url_audit(), &outcome.results).unwrap_or_else(|e| fail(e));
    print_written(&paths.url_audit());
    save_csv(&paths.tools_with_audit(), &outcome.entries).unwrap_or_else(|e| fail(e));
    print_written(&paths.tools_with_audit());
    save_csv(&paths.invalid_rows(), &invalid).unwrap_or_else(|e| fail(e));
    print_written(&paths.invalid_rows());
    write_json_summary("audit", &outcome.summary, &paths.audit_summary());
}

pub async fn handle_placeholders(args: &ArgMatches) {
    init_logging();

    let paths = ArtifactPaths::from_args(args);
    let concurrency = *args.get_one::<usize>("concurrency").unwrap_or(&80);
    let timeout = *args.get_one::<u64>("timeout").unwrap_or(&22);
    let entries = load_audited(&paths);

    print_header("PLACEHOLDER AUDIT");
    let options = PlaceholderOptions {
        probe: probe_config(ProbeConfig::inspection(), concurrency, timeout),
        include_unverified: args.get_flag("all"),
    };

    let pb = progress_bar("pages inspected");
    let outcome = execute_placeholder_audit(entries, options, Some(bar_callback(&pb)))
        .await
        .unwrap_or_else(|e| fail(format!("Placeholder audit failed: {}", e)));
    pb.finish_and_clear();

    print!("{}", generate_placeholder_report(&outcome.samples, outcome.demoted));
    println!();

    let rows: Vec<PageSampleRow> = outcome.samples.iter().map(PageSampleRow::from).collect();
    let flagged: Vec<PageSampleRow> = outcome.flagged_samples().map(PageSampleRow::from).collect();
    save_csv(&paths.live_link_audit(), &rows).unwrap_or_else(|e| fail(e));
    print_written(&paths.live_link_audit());
    save_csv(&paths.flagged_placeholders(), &flagged).unwrap_or_else(|e| fail(e));
    print_written(&paths.flagged_placeholders());
    save_csv(&paths.tools_with_audit(), &outcome.entries).unwrap_or_else(|e| fail(e));
    print_written(&paths.tools_with_audit());
}

pub async fn handle_recover(args: &ArgMatches) {
    init_logging();

    let paths = ArtifactPaths::from_args(args);
    let options = recovery_options(
        *args.get_one::<usize>("workers").unwrap_or(&10),
        *args.get_one::<usize>("candidates").unwrap_or(&5),
        *args.get_one::<f64>("min-confidence").unwrap_or(&0.62),
        *args.get_one::<usize>("max-rows").unwrap_or(&0),
    )
    .unwrap_or_else(|e| fail(e));
    let entries = load_audited(&paths);

    print_header("LINK RECOVERY");
    println!("{} Workers: {}", "→".blue(), options.workers);
    println!("{} Min confidence: {:.2}", "→".blue(), options.min_confidence);
    println!();

    let search = DuckDuckGoSearch::new().unwrap_or_else(|e| fail(e));
    let pb = progress_bar("dead links searched");
    let outcome = execute_recovery(&entries, search, options, Some(bar_callback(&pb)))
        .await
        .unwrap_or_else(|e| fail(format!("Recovery failed: {}", e)));
    pb.finish_and_clear();

    print!("{}", generate_recovery_report(&outcome.summary, &outcome.results));
    save_csv(&paths.recovered_links(), &outcome.results).unwrap_or_else(|e| fail(e));
    print_written(&paths.recovered_links());
}

pub async fn handle_discover(args: &ArgMatches) {
    init_logging();

    let paths = ArtifactPaths::from_args(args);
    let catalog_path = args
        .get_one::<String>("input")
        .map(|p| expand_path(p))
        .unwrap_or_else(|| paths.tools_with_audit());
    let entries = load_catalog(&catalog_path).unwrap_or_else(|e| fail(e));
    let roots = catalog_roots(&entries);

    let mut options = DiscoveryOptions {
        max_checks: *args.get_one::<usize>("max-checks").unwrap_or(&900),
        max_add: *args.get_one::<usize>("max-add").unwrap_or(&220),
        ..DiscoveryOptions::default()
    };
    if let Some(sources) = source_urls(args) {
        options.sources = sources;
    }
    options.probe.concurrency = (*args.get_one::<usize>("concurrency").unwrap_or(&60)).max(1);

    print_header("TOOL DISCOVERY");
    println!("{} Sources: {}", "→".blue(), options.sources.len());
    println!("{} Known domains: {}", "→".blue(), roots.len());
    println!();

    let pb = progress_bar("homepages checked");
    let outcome = execute_discovery(&roots, options, Some(bar_callback(&pb)))
        .await
        .unwrap_or_else(|e| fail(format!("Discovery failed: {}", e)));
    pb.finish_and_clear();

    print!("{}", generate_discovery_report(&outcome.summary));
    save_csv(&paths.new_tools(), &outcome.tools).unwrap_or_else(|e| fail(e));
    print_written(&paths.new_tools());
}

pub fn handle_build(args: &ArgMatches) {
    init_logging();

    let paths = ArtifactPaths::from_args(args);
    let options = ReconcileOptions {
        drop_mismatch_score: *args.get_one::<f64>("drop-mismatch-score").unwrap_or(&0.0),
    };

    let legacy = load_audited(&paths);
    let recovered = load_optional_recoveries(&paths.recovered_links()).unwrap_or_else(|e| fail(e));
    let discovered = load_optional_discovered(&paths.new_tools()).unwrap_or_else(|e| fail(e));

    print_header("CANONICAL DATASET");
    println!("{} Audited rows: {}", "→".blue(), legacy.len());
    println!("{} Recovery results: {}", "→".blue(), recovered.len());
    println!("{} Discovered tools: {}", "→".blue(), discovered.len());
    println!();

    let reconciliation = reconcile(&legacy, &recovered, &discovered, &options);
    print!("{}", generate_dataset_report(&reconciliation.stats));

    save_csv(&paths.cleaned_csv(), &reconciliation.catalog).unwrap_or_else(|e| fail(e));
    print_written(&paths.cleaned_csv());
    save_json(&paths.cleaned_json(), &reconciliation.catalog).unwrap_or_else(|e| fail(e));
    print_written(&paths.cleaned_json());
    save_seed_sql(&paths.seed_sql(), &reconciliation.catalog).unwrap_or_else(|e| fail(e));
    print_written(&paths.seed_sql());
    write_json_summary("build", &reconciliation.stats, &paths.dataset_summary());

    if let Some(db) = args.get_one::<String>("db") {
        let db_path = expand_path(db);
        let mut database =
            open_snapshot_db(&db_path, args.get_flag("fresh")).unwrap_or_else(|e| fail(e));
        let id = database
            .record_snapshot(&reconciliation.catalog, &reconciliation.stats)
            .unwrap_or_else(|e| fail(format!("Failed to record snapshot: {}", e)));
        info!("Snapshot {} stored in {}", id, db_path.display());
        println!(
            "{} Snapshot {} recorded in {}",
            "✓".green().bold(),
            id.cyan(),
            db_path.display().to_string().bright_white()
        );
    }
}

pub fn handle_snapshots(args: &ArgMatches) {
    init_logging();

    let raw = args
        .get_one::<String>("PATH")
        .map(String::as_str)
        .unwrap_or("~/.config/relink/relink.db");
    let db_path = expand_path(raw);
    if !Database::exists(&db_path) {
        fail(format!("No snapshot database at {}", db_path.display()));
    }
    let database = Database::new(&db_path).unwrap_or_else(|e| fail(e));

    if let Some(requested) = args.get_one::<String>("show") {
        let id = resolve_snapshot_id(&database, requested).unwrap_or_else(|e| fail(e));
        let entries = database.load_snapshot(&id).unwrap_or_else(|e| fail(e));
        print_header(&format!("SNAPSHOT {}", id));
        for entry in &entries {
            println!(
                "{} {}  {}  {}",
                "•".yellow(),
                entry.name.bright_white(),
                entry.url.cyan(),
                entry.verdict.as_str().dimmed()
            );
        }
        println!();
        println!("{} {} tools", "ℹ".blue(), entries.len());
        return;
    }

    let snapshots = database.list_snapshots().unwrap_or_else(|e| fail(e));

    print_header("SNAPSHOTS");
    if snapshots.is_empty() {
        println!("{} No snapshots recorded yet", "ℹ".blue());
        return;
    }
    for snapshot in snapshots {
        let counts = database
            .verdict_counts(&snapshot.id)
            .unwrap_or_else(|e| fail(e))
            .into_iter()
            .map(|(status, count)| format!("{}={}", status, count))
            .collect::<Vec<_>>()
            .join(" ");
        println!(
            "{} {}  {}  {} tools  {}",
            "•".yellow(),
            snapshot.id.cyan(),
            snapshot.created_at,
            snapshot.tool_count.to_string().bright_white(),
            counts.dimmed()
        );
    }
}
