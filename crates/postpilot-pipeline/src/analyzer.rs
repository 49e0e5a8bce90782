//! Media analysis stage

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use chrono::Utc;
use postpilot_adapters::VisionAnalyzer;
use postpilot_core::models::SyncedMedia;
use postpilot_core::AppError;
use postpilot_db::SyncedMediaRepository;

use crate::analysis::parse_analysis;
use crate::summary::StageSummary;

pub struct AnalyzerStage {
    media: SyncedMediaRepository,
    vision: Arc<dyn VisionAnalyzer>,
    batch_size: i64,
    item_delay: Duration,
    stale_claim_timeout: chrono::Duration,
}

impl AnalyzerStage {
    pub fn new(
        media: SyncedMediaRepository,
        vision: Arc<dyn VisionAnalyzer>,
        batch_size: i64,
        item_delay_ms: u64,
        stale_claim_timeout_minutes: i64,
    ) -> Self {
        Self {
            media,
            vision,
            batch_size,
            item_delay: Duration::from_millis(item_delay_ms),
            stale_claim_timeout: chrono::Duration::minutes(stale_claim_timeout_minutes),
        }
    }

    /// One analysis pass: reclaim stale claims, claim a batch of pending
    /// images, analyze each sequentially with a rate-limit pause. One item's
    /// failure never blocks the batch.
    pub async fn run(&self) -> Result<StageSummary> {
        let reclaimed = self
            .media
            .reclaim_stale_analyzing(Utc::now() - self.stale_claim_timeout)
            .await?;
        if reclaimed > 0 {
            tracing::warn!(reclaimed, "Reclaimed media stuck in analyzing");
        }

        let batch = self.media.claim_pending_for_analysis(self.batch_size).await?;
        tracing::info!(batch = batch.len(), reclaimed, "Analyzer stage started");

        let mut summary = StageSummary::default();
        for (i, item) in batch.iter().enumerate() {
            if i > 0 && !self.item_delay.is_zero() {
                tokio::time::sleep(self.item_delay).await;
            }
            match self.analyze_item(item).await {
                Ok(()) => summary.record_success(),
                Err(e) => {
                    tracing::warn!(media_id = %item.id, error = %e, "Media analysis failed");
                    if let Err(db_err) = self
                        .media
                        .mark_analysis_failed(item.id, &e.to_string())
                        .await
                    {
                        tracing::error!(media_id = %item.id, error = %db_err, "Failed to record analysis failure");
                    }
                    summary.record_failure(format!("media {}: {e}", item.id));
                }
            }
        }

        tracing::info!(
            processed = summary.processed,
            succeeded = summary.succeeded,
            failed = summary.failed,
            "Analyzer stage finished"
        );
        Ok(summary)
    }

    async fn analyze_item(&self, item: &SyncedMedia) -> Result<()> {
        let url = item
            .local_url
            .as_deref()
            .or(item.remote_url.as_deref())
            .ok_or_else(|| anyhow!("media has no URL to analyze"))?;

        let raw = self
            .vision
            .analyze_image(url)
            .await
            .map_err(|e| AppError::Vision(e.to_string()))?;
        let data = parse_analysis(&raw).map_err(|e| AppError::Vision(e.to_string()))?;

        let updated = self
            .media
            .mark_analyzed(
                item.id,
                &data.description,
                &data.topics,
                Some(data.mood.as_str()),
                &data.objects,
                data.context.as_deref(),
            )
            .await?;
        if !updated {
            // The claim was reclaimed and resolved elsewhere; nothing to do.
            tracing::warn!(media_id = %item.id, "Analysis result discarded, claim was lost");
        }
        Ok(())
    }
}
