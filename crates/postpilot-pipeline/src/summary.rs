use serde::{Deserialize, Serialize};

/// Outcome of one stage invocation. Per-item failures are accumulated here
/// rather than aborting the batch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StageSummary {
    pub processed: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub errors: Vec<String>,
}

impl StageSummary {
    pub fn record_success(&mut self) {
        self.processed += 1;
        self.succeeded += 1;
    }

    pub fn record_failure(&mut self, error: impl Into<String>) {
        self.processed += 1;
        self.failed += 1;
        self.errors.push(error.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_stay_consistent() {
        let mut summary = StageSummary::default();
        summary.record_success();
        summary.record_failure("boom");
        summary.record_success();
        assert_eq!(summary.processed, 3);
        assert_eq!(summary.succeeded, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.errors, vec!["boom".to_string()]);
    }
}
