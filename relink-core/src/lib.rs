pub mod audit;
pub mod data;
pub mod dataset;
pub mod discover;
pub mod domain;
pub mod error;
pub mod model;
pub mod placeholder;
pub mod reconcile;
pub mod recover;
pub mod report;

pub use error::{CatalogError, Result};
pub use model::{CanonicalEntry, CatalogEntry, DiscoveredTool, RecoveryReason, RecoveryResult, Verdict};

const BANNER: &str = r#"
            _ _       _
   _ __ ___| (_)_ __ | | __
  | '__/ _ \ | | '_ \| |/ /
  | | |  __/ | | | | |   <
  |_|  \___|_|_|_| |_|_|\_\
"#;

pub fn print_banner() {
    println!("{}", BANNER);
    println!("  link audit, recovery and catalog reconciliation  v{}\n", env!("CARGO_PKG_VERSION"));
}
