//! Group proposals and their derived fields

use chrono::{DateTime, Utc};
use postpilot_core::models::{GroupingRule, NarrativeArc};
use uuid::Uuid;

/// The slice of a synced media record the grouping rules need.
#[derive(Debug, Clone)]
pub struct MediaSummary {
    pub id: Uuid,
    pub uploaded_at: DateTime<Utc>,
    pub topics: Vec<String>,
    pub description: Option<String>,
    pub mood: Option<String>,
    pub context: Option<String>,
}

/// A candidate group produced by one rule (or by merging), not yet persisted.
#[derive(Debug, Clone)]
pub struct GroupProposal {
    /// Member ids ordered by ascending upload time.
    pub media_ids: Vec<Uuid>,
    pub rule: GroupingRule,
    pub reason: String,
    pub confidence: f64,
    pub date_range_start: DateTime<Utc>,
    pub date_range_end: DateTime<Utc>,
    pub common_topics: Vec<String>,
    pub theme: Option<String>,
    pub narrative_arc: NarrativeArc,
}

/// Default arc classification by member count. The same-day rule supplies
/// its own mapping (1-2 members read as a collection, not a before/after).
pub fn classify_arc(member_count: usize) -> NarrativeArc {
    match member_count {
        2 => NarrativeArc::BeforeAfter,
        n if n >= 3 => NarrativeArc::Chronological,
        _ => NarrativeArc::Collection,
    }
}

impl GroupProposal {
    /// Derive all proposal fields from a member set in one place: shared
    /// topics (kept when appearing in at least two members, top 5 by
    /// frequency), confidence scaled by the shared-topic count and capped,
    /// and the upload-time range.
    pub fn from_members(
        members: &[&MediaSummary],
        rule: GroupingRule,
        reason: String,
        theme: Option<String>,
        arc: Option<NarrativeArc>,
    ) -> Self {
        let mut ordered: Vec<&MediaSummary> = members.to_vec();
        ordered.sort_by_key(|m| m.uploaded_at);

        let (common_topics, shared_count) = shared_topics(&ordered);
        let confidence = (0.5 + 0.1 * shared_count as f64).min(0.95);

        let date_range_start = ordered
            .first()
            .map(|m| m.uploaded_at)
            .unwrap_or_else(Utc::now);
        let date_range_end = ordered
            .last()
            .map(|m| m.uploaded_at)
            .unwrap_or(date_range_start);

        GroupProposal {
            media_ids: ordered.iter().map(|m| m.id).collect(),
            rule,
            reason,
            confidence,
            date_range_start,
            date_range_end,
            common_topics,
            theme,
            narrative_arc: arc.unwrap_or_else(|| classify_arc(ordered.len())),
        }
    }

    pub fn member_count(&self) -> usize {
        self.media_ids.len()
    }
}

/// Topics appearing in at least two members, most frequent first (ties by
/// first appearance), truncated to 5. Also returns the untruncated shared
/// count, which drives confidence.
fn shared_topics(members: &[&MediaSummary]) -> (Vec<String>, usize) {
    let mut order: Vec<String> = Vec::new();
    let mut counts: Vec<usize> = Vec::new();
    for member in members {
        for topic in &member.topics {
            match order.iter().position(|t| t == topic) {
                Some(i) => counts[i] += 1,
                None => {
                    order.push(topic.clone());
                    counts.push(1);
                }
            }
        }
    }

    let mut shared: Vec<(String, usize, usize)> = order
        .into_iter()
        .zip(counts)
        .enumerate()
        .filter(|(_, (_, count))| *count >= 2)
        .map(|(i, (topic, count))| (topic, count, i))
        .collect();
    shared.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)));

    let total = shared.len();
    let top: Vec<String> = shared.into_iter().take(5).map(|(t, _, _)| t).collect();
    (top, total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn media(hour: u32, topics: &[&str]) -> MediaSummary {
        MediaSummary {
            id: Uuid::new_v4(),
            uploaded_at: Utc.with_ymd_and_hms(2023, 5, 1, hour, 0, 0).unwrap(),
            topics: topics.iter().map(|t| t.to_string()).collect(),
            description: None,
            mood: None,
            context: None,
        }
    }

    #[test]
    fn test_classify_arc() {
        assert_eq!(classify_arc(1), NarrativeArc::Collection);
        assert_eq!(classify_arc(2), NarrativeArc::BeforeAfter);
        assert_eq!(classify_arc(3), NarrativeArc::Chronological);
        assert_eq!(classify_arc(7), NarrativeArc::Chronological);
    }

    #[test]
    fn test_members_ordered_by_upload_time() {
        let a = media(12, &[]);
        let b = media(8, &[]);
        let proposal = GroupProposal::from_members(
            &[&a, &b],
            GroupingRule::Sequential,
            "r".into(),
            None,
            None,
        );
        assert_eq!(proposal.media_ids, vec![b.id, a.id]);
        assert_eq!(proposal.date_range_start, b.uploaded_at);
        assert_eq!(proposal.date_range_end, a.uploaded_at);
    }

    #[test]
    fn test_confidence_scales_with_shared_topics() {
        let a = media(8, &["food", "travel"]);
        let b = media(9, &["food", "travel"]);
        let proposal = GroupProposal::from_members(
            &[&a, &b],
            GroupingRule::SimilarTopics,
            "r".into(),
            None,
            None,
        );
        assert_eq!(proposal.common_topics, vec!["food", "travel"]);
        assert!((proposal.confidence - 0.7).abs() < 1e-9);
    }

    #[test]
    fn test_confidence_is_capped() {
        let topics: Vec<&str> = vec!["a", "b", "c", "d", "e", "f", "g"];
        let a = media(8, &topics);
        let b = media(9, &topics);
        let proposal = GroupProposal::from_members(
            &[&a, &b],
            GroupingRule::SimilarTopics,
            "r".into(),
            None,
            None,
        );
        assert_eq!(proposal.confidence, 0.95);
        assert_eq!(proposal.common_topics.len(), 5);
    }

    #[test]
    fn test_unshared_topics_are_excluded() {
        let a = media(8, &["food", "solo"]);
        let b = media(9, &["food"]);
        let proposal = GroupProposal::from_members(
            &[&a, &b],
            GroupingRule::SameDay,
            "r".into(),
            None,
            None,
        );
        assert_eq!(proposal.common_topics, vec!["food"]);
        assert!((proposal.confidence - 0.6).abs() < 1e-9);
    }
}
