//! Grouping stage: per-tenant proposal building and persistence

use anyhow::Result;
use postpilot_core::models::{AutoPilotConfig, NewMediaGroup, SyncedMedia};
use postpilot_db::{AutoPilotConfigRepository, MediaGroupRepository, SyncedMediaRepository};
use uuid::Uuid;

use super::proposal::{GroupProposal, MediaSummary};
use crate::summary::StageSummary;

pub struct GroupingStage {
    media: SyncedMediaRepository,
    groups: MediaGroupRepository,
    configs: AutoPilotConfigRepository,
}

impl GroupingStage {
    pub fn new(
        media: SyncedMediaRepository,
        groups: MediaGroupRepository,
        configs: AutoPilotConfigRepository,
    ) -> Self {
        Self {
            media,
            groups,
            configs,
        }
    }

    /// One grouping pass over every tenant with analyzed, ungrouped media.
    /// A tenant-level failure is recorded and does not block other tenants.
    pub async fn run(&self) -> Result<StageSummary> {
        let mut summary = StageSummary::default();
        let tenants = self.media.tenants_with_groupable().await?;
        tracing::info!(tenants = tenants.len(), "Grouping stage started");

        for tenant_id in tenants {
            if let Err(e) = self.group_tenant(tenant_id, &mut summary).await {
                tracing::error!(tenant_id = %tenant_id, error = %e, "Grouping failed for tenant");
                summary.record_failure(format!("tenant {tenant_id}: {e}"));
            }
        }

        tracing::info!(
            processed = summary.processed,
            succeeded = summary.succeeded,
            failed = summary.failed,
            "Grouping stage finished"
        );
        Ok(summary)
    }

    async fn group_tenant(&self, tenant_id: Uuid, summary: &mut StageSummary) -> Result<()> {
        let config = self.configs.get_or_default(tenant_id).await?;
        let media = self.media.list_groupable(tenant_id).await?;
        let summaries: Vec<MediaSummary> = media.iter().map(to_summary).collect();

        let proposals = super::build_proposals(&summaries, &config);
        tracing::debug!(
            tenant_id = %tenant_id,
            media = media.len(),
            proposals = proposals.len(),
            "Built group proposals"
        );

        for proposal in proposals {
            match self.persist_proposal(tenant_id, &config, &proposal).await {
                Ok(true) => summary.record_success(),
                Ok(false) => {} // discarded, members released for a later pass
                Err(e) => {
                    tracing::error!(tenant_id = %tenant_id, error = %e, "Failed to persist group");
                    summary.record_failure(format!("tenant {tenant_id}: {e}"));
                }
            }
        }
        Ok(())
    }

    /// Persist one proposal and attach its members. Returns whether the
    /// group was kept; a group whose surviving member count falls below the
    /// minimum is released and deleted instead.
    async fn persist_proposal(
        &self,
        tenant_id: Uuid,
        config: &AutoPilotConfig,
        proposal: &GroupProposal,
    ) -> Result<bool> {
        let group = self
            .groups
            .insert_ready(NewMediaGroup {
                tenant_id,
                rule: proposal.rule,
                reason: proposal.reason.clone(),
                date_range_start: proposal.date_range_start,
                date_range_end: proposal.date_range_end,
                common_topics: proposal.common_topics.clone(),
                theme: proposal.theme.clone(),
                narrative_arc: proposal.narrative_arc,
                confidence: proposal.confidence,
                media_count: proposal.member_count() as i32,
                min_media: config.min_media_per_post as i32,
                max_media: config.max_media_per_post as i32,
            })
            .await?;

        let attached = self
            .media
            .assign_group(group.id, &proposal.media_ids)
            .await?;
        match attach_outcome(attached, proposal.media_ids.len(), config.min_media_per_post) {
            AttachOutcome::Keep => {}
            AttachOutcome::Resize => {
                // A member was claimed by another group between proposal
                // building and persistence; the group keeps the members it
                // won, and the stored count must match them.
                tracing::warn!(
                    group_id = %group.id,
                    expected = proposal.media_ids.len(),
                    attached,
                    "Group persisted with fewer members than proposed"
                );
                self.groups
                    .update_member_count(group.id, attached as i32)
                    .await?;
            }
            AttachOutcome::Discard => {
                // Too few members survived a concurrent run to meet the
                // minimum size; release them for a later pass and drop the
                // group rather than leave an understaffed one behind.
                let released = self.media.release_group(group.id).await?;
                let deleted = self.groups.delete_ready(group.id).await?;
                tracing::warn!(
                    group_id = %group.id,
                    expected = proposal.media_ids.len(),
                    attached,
                    released,
                    deleted,
                    "Discarded group that fell below its minimum size"
                );
                return Ok(false);
            }
        }
        tracing::info!(
            tenant_id = %tenant_id,
            group_id = %group.id,
            rule = %proposal.rule,
            members = attached,
            "Media group created"
        );
        Ok(true)
    }
}

/// What to do with a freshly persisted group once attachment settles.
#[derive(Debug, PartialEq, Eq)]
enum AttachOutcome {
    Keep,
    Resize,
    Discard,
}

fn attach_outcome(attached: u64, proposed: usize, min_media: usize) -> AttachOutcome {
    if attached < min_media as u64 {
        AttachOutcome::Discard
    } else if attached < proposed as u64 {
        AttachOutcome::Resize
    } else {
        AttachOutcome::Keep
    }
}

fn to_summary(media: &SyncedMedia) -> MediaSummary {
    MediaSummary {
        id: media.id,
        uploaded_at: media.uploaded_at,
        topics: media.topics.clone(),
        description: media.description.clone(),
        mood: media.mood.clone(),
        context: media.context.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_attachment_keeps_group() {
        assert_eq!(attach_outcome(4, 4, 2), AttachOutcome::Keep);
        assert_eq!(attach_outcome(2, 2, 2), AttachOutcome::Keep);
    }

    #[test]
    fn test_partial_attachment_resizes_member_count() {
        assert_eq!(attach_outcome(3, 5, 2), AttachOutcome::Resize);
        assert_eq!(attach_outcome(2, 3, 2), AttachOutcome::Resize);
    }

    #[test]
    fn test_attachment_below_minimum_discards_group() {
        assert_eq!(attach_outcome(1, 4, 2), AttachOutcome::Discard);
        assert_eq!(attach_outcome(0, 3, 2), AttachOutcome::Discard);
    }
}
