//! Post generation stage with slot scheduling

use std::fmt::Write as _;
use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use postpilot_adapters::ContentGenerator;
use postpilot_core::models::{AutoPilotConfig, MediaGroup, NewPost, PostStatus, SyncedMedia};
use postpilot_core::AppError;
use postpilot_db::{
    AutoPilotConfigRepository, MediaGroupRepository, PostRepository, SyncedMediaRepository,
};

use crate::scheduler::{next_available_slot, occupied_slots};
use crate::summary::StageSummary;

/// The auto-approval gate: a post is scheduled unattended only when the
/// tenant opted into both auto-approval and auto-scheduling and the model's
/// confidence clears the tenant's threshold.
pub fn decide_post_status(config: &AutoPilotConfig, confidence: f64) -> PostStatus {
    if config.auto_approve && config.auto_schedule && confidence >= config.confidence_threshold {
        PostStatus::Scheduled
    } else {
        PostStatus::PendingApproval
    }
}

/// Synthesis prompt from the group's derived fields, its members' analysis
/// results, and the tenant's brand voice.
pub fn build_prompt(
    group: &MediaGroup,
    members: &[SyncedMedia],
    config: &AutoPilotConfig,
) -> String {
    let mut prompt = String::new();
    let _ = writeln!(
        prompt,
        "Write a social media post for a set of {} photos telling one story.",
        members.len()
    );
    let _ = writeln!(prompt, "Narrative arc: {}.", group.narrative_arc);
    if let Some(theme) = &group.theme {
        let _ = writeln!(prompt, "Theme: {theme}.");
    }
    if !group.common_topics.is_empty() {
        let _ = writeln!(prompt, "Shared topics: {}.", group.common_topics.join(", "));
    }

    let _ = writeln!(prompt, "\nThe photos, in order:");
    for (i, member) in members.iter().enumerate() {
        let description = member.description.as_deref().unwrap_or("(no description)");
        let _ = write!(prompt, "{}. {description}", i + 1);
        if let Some(mood) = &member.mood {
            let _ = write!(prompt, " (mood: {mood})");
        }
        if let Some(context) = &member.context {
            let _ = write!(prompt, " (context: {context})");
        }
        let _ = writeln!(prompt);
    }

    let _ = writeln!(prompt, "\nBrand voice: {}.", config.brand.voice);
    if let Some(audience) = &config.brand.audience {
        let _ = writeln!(prompt, "Audience: {audience}.");
    }
    if !config.brand.hashtags.is_empty() {
        let _ = writeln!(
            prompt,
            "Include these hashtags where natural: {}.",
            config.brand.hashtags.join(" ")
        );
    }

    let _ = write!(
        prompt,
        "\nRespond with a JSON object with keys \"title\" (short), \"text\" \
         (the post body), and \"confidence\" (0.0-1.0, how well the post fits \
         the photos and voice). Respond with only the JSON object."
    );
    prompt
}

pub struct GeneratorStage {
    groups: MediaGroupRepository,
    media: SyncedMediaRepository,
    posts: PostRepository,
    configs: AutoPilotConfigRepository,
    generator: Arc<dyn ContentGenerator>,
    batch_size: i64,
    lookahead_days: i64,
    stale_claim_timeout: chrono::Duration,
}

impl GeneratorStage {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        groups: MediaGroupRepository,
        media: SyncedMediaRepository,
        posts: PostRepository,
        configs: AutoPilotConfigRepository,
        generator: Arc<dyn ContentGenerator>,
        batch_size: i64,
        lookahead_days: i64,
        stale_claim_timeout_minutes: i64,
    ) -> Self {
        Self {
            groups,
            media,
            posts,
            configs,
            generator,
            batch_size,
            lookahead_days,
            stale_claim_timeout: chrono::Duration::minutes(stale_claim_timeout_minutes),
        }
    }

    /// One generation pass: reclaim stale claims, claim a batch of ready
    /// groups, generate a post per group. Failures are isolated per group.
    pub async fn run(&self) -> Result<StageSummary> {
        let reclaimed = self
            .groups
            .reclaim_stale_generating(Utc::now() - self.stale_claim_timeout)
            .await?;
        if reclaimed > 0 {
            tracing::warn!(reclaimed, "Reclaimed groups stuck in generating");
        }

        let batch = self.groups.claim_ready_for_generation(self.batch_size).await?;
        tracing::info!(batch = batch.len(), reclaimed, "Generator stage started");

        let mut summary = StageSummary::default();
        for group in &batch {
            match self.generate_for_group(group).await {
                Ok(()) => summary.record_success(),
                Err(e) => {
                    tracing::error!(group_id = %group.id, error = %e, "Post generation failed");
                    if let Err(db_err) = self.groups.mark_failed(group.id, &e.to_string()).await {
                        tracing::error!(group_id = %group.id, error = %db_err, "Failed to record group failure");
                    }
                    summary.record_failure(format!("group {}: {e}", group.id));
                }
            }
        }

        tracing::info!(
            processed = summary.processed,
            succeeded = summary.succeeded,
            failed = summary.failed,
            "Generator stage finished"
        );
        Ok(summary)
    }

    async fn generate_for_group(&self, group: &MediaGroup) -> Result<()> {
        let config = self.configs.get_or_default(group.tenant_id).await?;
        let members = self.media.list_by_group(group.id).await?;
        if (members.len() as i32) < group.min_media {
            anyhow::bail!(
                "group has {} members, below the minimum of {}",
                members.len(),
                group.min_media
            );
        }

        let prompt = build_prompt(group, &members, &config);
        let generated = self
            .generator
            .generate_post(&prompt)
            .await
            .map_err(|e| AppError::Generation(e.to_string()))?;

        let status = decide_post_status(&config, generated.confidence);
        let scheduled_at = match status {
            PostStatus::Scheduled => Some(self.pick_slot(group, Utc::now(), &config).await?),
            PostStatus::PendingApproval => None,
        };

        let post = self
            .posts
            .create(NewPost {
                tenant_id: group.tenant_id,
                group_id: Some(group.id),
                title: generated.title.clone(),
                content: generated.text.clone(),
                status,
                confidence: generated.confidence,
                scheduled_at,
            })
            .await?;

        let won = self.groups.mark_posted(group.id, post.id).await?;
        if !won {
            tracing::warn!(
                group_id = %group.id,
                post_id = %post.id,
                "Generation claim was lost before completion, a duplicate post may exist"
            );
        }
        self.media.mark_post_generated(group.id).await?;

        tracing::info!(
            group_id = %group.id,
            post_id = %post.id,
            status = %post.status,
            confidence = generated.confidence,
            scheduled_at = ?scheduled_at,
            "Post created from media group"
        );
        Ok(())
    }

    async fn pick_slot(
        &self,
        group: &MediaGroup,
        now: DateTime<Utc>,
        config: &AutoPilotConfig,
    ) -> Result<DateTime<Utc>> {
        let scheduled = self.posts.scheduled_after(group.tenant_id, now).await?;
        let occupied = occupied_slots(scheduled.iter().filter_map(|p| p.scheduled_at.as_ref()));
        Ok(next_available_slot(
            now,
            &config.preferred_times(),
            &occupied,
            self.lookahead_days,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(auto_approve: bool, auto_schedule: bool, threshold: f64) -> AutoPilotConfig {
        AutoPilotConfig {
            auto_approve,
            auto_schedule,
            confidence_threshold: threshold,
            ..Default::default()
        }
    }

    #[test]
    fn test_gate_requires_all_three_conditions() {
        assert_eq!(
            decide_post_status(&config(true, true, 0.8), 0.9),
            PostStatus::Scheduled
        );
        assert_eq!(
            decide_post_status(&config(false, true, 0.8), 0.9),
            PostStatus::PendingApproval
        );
        assert_eq!(
            decide_post_status(&config(true, false, 0.8), 0.9),
            PostStatus::PendingApproval
        );
        assert_eq!(
            decide_post_status(&config(true, true, 0.8), 0.7),
            PostStatus::PendingApproval
        );
    }

    #[test]
    fn test_gate_threshold_is_inclusive() {
        assert_eq!(
            decide_post_status(&config(true, true, 0.8), 0.8),
            PostStatus::Scheduled
        );
    }
}
