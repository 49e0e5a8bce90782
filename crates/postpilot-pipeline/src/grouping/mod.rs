//! Grouping engine: rules, merge, and persistence

pub mod engine;
pub mod merge;
pub mod proposal;
pub mod rules;

pub use engine::GroupingStage;
pub use merge::merge_overlapping;
pub use proposal::{GroupProposal, MediaSummary};
pub use rules::jaccard;

use postpilot_core::models::AutoPilotConfig;

/// One tenant's full grouping pass as a pure function: enabled rules, then
/// the optional merge, then the size-bounds filter.
pub fn build_proposals(media: &[MediaSummary], config: &AutoPilotConfig) -> Vec<GroupProposal> {
    let mut proposals = Vec::new();
    if config.same_day_enabled {
        proposals.extend(rules::same_day(media, config));
    }
    if config.sequential_enabled {
        proposals.extend(rules::sequential(media, config));
    }
    if config.similar_topics_enabled {
        proposals.extend(rules::similar_topics(media, config));
    }
    if config.event_detection_enabled {
        proposals.extend(rules::event_detection(media, config));
    }

    if config.merge_enabled {
        proposals = merge_overlapping(proposals);
    }

    proposals.retain(|p| {
        p.member_count() >= config.min_media_per_post
            && p.member_count() <= config.max_media_per_post
    });
    proposals
}
