// Include handlers module directly from handlers.rs
#[path = "handlers.rs"]
pub mod handlers;

// Re-export the helpers the handlers are built from
pub use handlers::{
    ArtifactPaths, catalog_roots, expand_path, load_optional_discovered,
    load_optional_recoveries, open_snapshot_db, probe_config, recovery_options,
    resolve_snapshot_id,
};
