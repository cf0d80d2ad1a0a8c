use std::sync::Arc;
use std::time::Duration;

/// A periodic `(completed, total, elapsed)` report from a running batch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressUpdate {
    pub completed: usize,
    pub total: usize,
    pub elapsed: Duration,
}

impl ProgressUpdate {
    /// Whether a batch should emit an update after `completed` items.
    pub fn is_due(completed: usize, total: usize, every: usize) -> bool {
        completed == total || (every > 0 && completed % every == 0)
    }
}

pub type ProgressCallback = Arc<dyn Fn(ProgressUpdate) + Send + Sync>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_is_due_on_interval_and_last_item() {
        assert!(ProgressUpdate::is_due(500, 1200, 500));
        assert!(!ProgressUpdate::is_due(501, 1200, 500));
        assert!(ProgressUpdate::is_due(1200, 1200, 500));
        assert!(ProgressUpdate::is_due(3, 3, 0));
        assert!(!ProgressUpdate::is_due(1, 3, 0));
    }
}
