//! Single-pass merge of overlapping proposals
//!
//! Two proposals merge when their shared members cover at least half of the
//! smaller proposal. The pass is greedy and left-to-right: a proposal
//! absorbed earlier is not re-compared against merges produced later in the
//! same pass, so the output is not a fixed point under re-merging. That is
//! an accepted approximation at this batch size.

use std::collections::HashSet;

use postpilot_core::models::GroupingRule;
use uuid::Uuid;

use super::proposal::{classify_arc, GroupProposal};

const MERGE_OVERLAP_RATIO: f64 = 0.5;

pub fn merge_overlapping(proposals: Vec<GroupProposal>) -> Vec<GroupProposal> {
    let mut consumed = vec![false; proposals.len()];
    let mut merged = Vec::new();

    for i in 0..proposals.len() {
        if consumed[i] {
            continue;
        }
        let mut current = proposals[i].clone();
        for j in (i + 1)..proposals.len() {
            if consumed[j] {
                continue;
            }
            if overlap_ratio(&current.media_ids, &proposals[j].media_ids) >= MERGE_OVERLAP_RATIO {
                current = merge_pair(current, &proposals[j]);
                consumed[j] = true;
            }
        }
        merged.push(current);
    }
    merged
}

/// Shared members as a fraction of the smaller proposal.
fn overlap_ratio(a: &[Uuid], b: &[Uuid]) -> f64 {
    let smaller = a.len().min(b.len());
    if smaller == 0 {
        return 0.0;
    }
    let set_a: HashSet<&Uuid> = a.iter().collect();
    let shared = b.iter().filter(|id| set_a.contains(id)).count();
    shared as f64 / smaller as f64
}

fn merge_pair(a: GroupProposal, b: &GroupProposal) -> GroupProposal {
    let mut media_ids = a.media_ids.clone();
    for id in &b.media_ids {
        if !media_ids.contains(id) {
            media_ids.push(*id);
        }
    }

    let mut common_topics = a.common_topics.clone();
    for topic in &b.common_topics {
        if !common_topics.contains(topic) {
            common_topics.push(topic.clone());
        }
    }
    common_topics.truncate(5);

    let narrative_arc = classify_arc(media_ids.len());
    GroupProposal {
        media_ids,
        rule: GroupingRule::Mixed,
        reason: format!("{}; {}", a.reason, b.reason),
        confidence: (a.confidence + b.confidence) / 2.0,
        date_range_start: a.date_range_start.min(b.date_range_start),
        date_range_end: a.date_range_end.max(b.date_range_end),
        common_topics,
        theme: a.theme.or_else(|| b.theme.clone()),
        narrative_arc,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use postpilot_core::models::NarrativeArc;

    fn proposal(ids: &[Uuid], rule: GroupingRule, confidence: f64) -> GroupProposal {
        GroupProposal {
            media_ids: ids.to_vec(),
            rule,
            reason: rule.to_string(),
            confidence,
            date_range_start: Utc.with_ymd_and_hms(2023, 5, 1, 8, 0, 0).unwrap(),
            date_range_end: Utc.with_ymd_and_hms(2023, 5, 1, 18, 0, 0).unwrap(),
            common_topics: Vec::new(),
            theme: None,
            narrative_arc: NarrativeArc::Collection,
        }
    }

    #[test]
    fn test_overlapping_proposals_merge() {
        let ids: Vec<Uuid> = (0..4).map(|_| Uuid::new_v4()).collect();
        let a = proposal(&ids[0..3], GroupingRule::SameDay, 0.6);
        let b = proposal(&ids[1..4], GroupingRule::SimilarTopics, 0.8);

        let merged = merge_overlapping(vec![a, b]);
        assert_eq!(merged.len(), 1);
        let group = &merged[0];
        assert_eq!(group.member_count(), 4);
        assert_eq!(group.rule, GroupingRule::Mixed);
        assert!((group.confidence - 0.7).abs() < 1e-9);
        assert_eq!(group.narrative_arc, NarrativeArc::Chronological);
        assert_eq!(group.reason, "same_day; similar_topics");
        for id in &ids {
            assert!(group.media_ids.contains(id));
        }
    }

    #[test]
    fn test_disjoint_proposals_pass_through() {
        let a = proposal(
            &[Uuid::new_v4(), Uuid::new_v4()],
            GroupingRule::SameDay,
            0.6,
        );
        let b = proposal(
            &[Uuid::new_v4(), Uuid::new_v4()],
            GroupingRule::Sequential,
            0.6,
        );
        let merged = merge_overlapping(vec![a.clone(), b.clone()]);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].rule, GroupingRule::SameDay);
        assert_eq!(merged[1].rule, GroupingRule::Sequential);
    }

    #[test]
    fn test_below_half_overlap_is_not_merged() {
        // 1 shared member out of a smaller size of 3 -> ratio 1/3 < 0.5
        let shared = Uuid::new_v4();
        let a = proposal(
            &[shared, Uuid::new_v4(), Uuid::new_v4()],
            GroupingRule::SameDay,
            0.6,
        );
        let b = proposal(
            &[shared, Uuid::new_v4(), Uuid::new_v4()],
            GroupingRule::Sequential,
            0.6,
        );
        assert_eq!(merge_overlapping(vec![a, b]).len(), 2);
    }

    #[test]
    fn test_merge_is_noop_on_empty_input() {
        assert!(merge_overlapping(Vec::new()).is_empty());
    }
}
