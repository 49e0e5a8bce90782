use std::sync::Arc;

use postpilot_pipeline::{AnalyzerStage, GeneratorStage, GroupingStage, SyncStage};

/// Shared application state: one instance of each pipeline stage plus the
/// secret guarding the trigger endpoints.
#[derive(Clone)]
pub struct AppState {
    pub cron_secret: Option<String>,
    pub sync: Arc<SyncStage>,
    pub analyzer: Arc<AnalyzerStage>,
    pub grouping: Arc<GroupingStage>,
    pub generator: Arc<GeneratorStage>,
}
