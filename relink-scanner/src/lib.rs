pub mod error;
pub mod progress;
pub mod prober;
pub mod result;
pub mod search;
pub mod signature;

pub use error::ScanError;
pub use progress::{ProgressCallback, ProgressUpdate};
pub use prober::{ProbeConfig, Prober, RETRYABLE_STATUSES};
pub use result::{PageSample, ProbeMethod, ProbeResult};
pub use search::{DuckDuckGoSearch, SearchHit, SearchProvider};
pub use signature::detect_signatures;
