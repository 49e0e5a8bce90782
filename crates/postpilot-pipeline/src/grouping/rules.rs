//! The four grouping heuristics
//!
//! Each rule independently maps a tenant's analyzed, ungrouped media to
//! group proposals. Rules never mutate their input; claim tracking for the
//! similar-topics rule is local to one rule invocation.

use std::collections::HashSet;

use chrono::Duration;
use postpilot_core::models::{AutoPilotConfig, GroupingRule, NarrativeArc};

use super::proposal::{GroupProposal, MediaSummary};

/// Event labels recognized even when the tenant configured no keywords.
pub const BUILTIN_EVENT_KEYWORDS: [&str; 5] =
    ["meeting", "conference", "event", "presentation", "workshop"];

/// Jaccard similarity of two topic sets: |A ∩ B| / |A ∪ B|.
pub fn jaccard(a: &[String], b: &[String]) -> f64 {
    let set_a: HashSet<&str> = a.iter().map(String::as_str).collect();
    let set_b: HashSet<&str> = b.iter().map(String::as_str).collect();
    let union = set_a.union(&set_b).count();
    if union == 0 {
        return 0.0;
    }
    let intersection = set_a.intersection(&set_b).count();
    intersection as f64 / union as f64
}

/// Partition by calendar date of upload, chunking each date's bucket to the
/// configured max. 1-2 member chunks read as a collection, 3+ chronological.
pub fn same_day(media: &[MediaSummary], config: &AutoPilotConfig) -> Vec<GroupProposal> {
    let mut sorted: Vec<&MediaSummary> = media.iter().collect();
    sorted.sort_by_key(|m| m.uploaded_at);

    let chunk_size = config.same_day_max_media.max(1);
    let mut proposals = Vec::new();
    let mut i = 0;
    while i < sorted.len() {
        let date = sorted[i].uploaded_at.date_naive();
        let mut bucket = Vec::new();
        while i < sorted.len() && sorted[i].uploaded_at.date_naive() == date {
            bucket.push(sorted[i]);
            i += 1;
        }
        for chunk in bucket.chunks(chunk_size) {
            let arc = if chunk.len() >= 3 {
                NarrativeArc::Chronological
            } else {
                NarrativeArc::Collection
            };
            proposals.push(GroupProposal::from_members(
                chunk,
                GroupingRule::SameDay,
                format!("{} media uploaded on {}", chunk.len(), date),
                None,
                Some(arc),
            ));
        }
    }
    proposals
}

/// Greedy runs of uploads whose consecutive gaps stay within the configured
/// window. Runs of one are discarded.
pub fn sequential(media: &[MediaSummary], config: &AutoPilotConfig) -> Vec<GroupProposal> {
    let mut sorted: Vec<&MediaSummary> = media.iter().collect();
    sorted.sort_by_key(|m| m.uploaded_at);

    let max_gap = Duration::minutes(config.sequential_gap_minutes.max(1));
    let mut proposals = Vec::new();
    let mut run: Vec<&MediaSummary> = Vec::new();

    for item in sorted {
        match run.last() {
            Some(prev) if item.uploaded_at - prev.uploaded_at > max_gap => {
                emit_run(&mut proposals, &run, config);
                run.clear();
            }
            _ => {}
        }
        run.push(item);
    }
    emit_run(&mut proposals, &run, config);
    proposals
}

fn emit_run(proposals: &mut Vec<GroupProposal>, run: &[&MediaSummary], config: &AutoPilotConfig) {
    if run.len() >= 2 {
        proposals.push(GroupProposal::from_members(
            run,
            GroupingRule::Sequential,
            format!(
                "{} media uploaded within {}-minute gaps",
                run.len(),
                config.sequential_gap_minutes
            ),
            None,
            None,
        ));
    }
}

/// For each unclaimed item with topics, claim every other unclaimed item
/// whose topic-set Jaccard similarity meets the threshold. Quadratic over
/// the per-tenant batch, acceptable at this cadence.
pub fn similar_topics(media: &[MediaSummary], config: &AutoPilotConfig) -> Vec<GroupProposal> {
    let mut claimed = vec![false; media.len()];
    let mut proposals = Vec::new();

    for i in 0..media.len() {
        if claimed[i] || media[i].topics.is_empty() {
            continue;
        }
        let mut members = vec![i];
        for j in 0..media.len() {
            if j == i || claimed[j] || media[j].topics.is_empty() {
                continue;
            }
            if jaccard(&media[i].topics, &media[j].topics) >= config.topic_similarity_threshold {
                members.push(j);
            }
        }
        if members.len() >= 2 {
            for &m in &members {
                claimed[m] = true;
            }
            let refs: Vec<&MediaSummary> = members.iter().map(|&m| &media[m]).collect();
            proposals.push(GroupProposal::from_members(
                &refs,
                GroupingRule::SimilarTopics,
                format!("{} media sharing similar topics", refs.len()),
                None,
                None,
            ));
        }
    }
    proposals
}

/// Bucket media whose context (or description) mentions an event keyword by
/// their normalized context label.
pub fn event_detection(media: &[MediaSummary], config: &AutoPilotConfig) -> Vec<GroupProposal> {
    let keywords: Vec<String> = config
        .event_keywords
        .iter()
        .map(|k| k.trim().to_lowercase())
        .filter(|k| !k.is_empty())
        .chain(BUILTIN_EVENT_KEYWORDS.iter().map(|k| k.to_string()))
        .collect();

    // Bucket label -> member indices, preserving first-seen bucket order.
    let mut buckets: Vec<(String, Vec<usize>)> = Vec::new();
    for (i, item) in media.iter().enumerate() {
        let context = item.context.as_deref().unwrap_or("").to_lowercase();
        let description = item.description.as_deref().unwrap_or("").to_lowercase();
        let matched = keywords
            .iter()
            .find(|k| context.contains(k.as_str()) || description.contains(k.as_str()));
        let Some(keyword) = matched else { continue };

        let label = if context.trim().is_empty() {
            keyword.clone()
        } else {
            context.trim().to_string()
        };
        match buckets.iter_mut().find(|(l, _)| *l == label) {
            Some((_, members)) => members.push(i),
            None => buckets.push((label, vec![i])),
        }
    }

    buckets
        .into_iter()
        .filter(|(_, members)| members.len() >= 2)
        .map(|(label, members)| {
            let refs: Vec<&MediaSummary> = members.iter().map(|&m| &media[m]).collect();
            GroupProposal::from_members(
                &refs,
                GroupingRule::EventDetection,
                format!("{} media from '{}'", refs.len(), label),
                Some(label),
                None,
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use uuid::Uuid;

    fn media_at(day: u32, hour: u32, min: u32) -> MediaSummary {
        MediaSummary {
            id: Uuid::new_v4(),
            uploaded_at: Utc.with_ymd_and_hms(2023, 5, day, hour, min, 0).unwrap(),
            topics: Vec::new(),
            description: None,
            mood: None,
            context: None,
        }
    }

    fn with_topics(mut m: MediaSummary, topics: &[&str]) -> MediaSummary {
        m.topics = topics.iter().map(|t| t.to_string()).collect();
        m
    }

    fn with_context(mut m: MediaSummary, context: &str) -> MediaSummary {
        m.context = Some(context.to_string());
        m
    }

    #[test]
    fn test_jaccard_symmetry_and_identity() {
        let a: Vec<String> = vec!["food".into(), "travel".into()];
        let b: Vec<String> = vec!["travel".into(), "sunset".into()];
        assert_eq!(jaccard(&a, &b), jaccard(&b, &a));
        assert_eq!(jaccard(&a, &a), 1.0);
        assert_eq!(jaccard(&a, &[]), 0.0);
    }

    #[test]
    fn test_jaccard_value() {
        let a: Vec<String> = vec!["a".into(), "b".into(), "c".into()];
        let b: Vec<String> = vec!["b".into(), "c".into(), "d".into()];
        // intersection 2, union 4
        assert!((jaccard(&a, &b) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_same_day_partitions_and_chunks() {
        let config = AutoPilotConfig {
            same_day_max_media: 5,
            ..Default::default()
        };
        let mut media: Vec<MediaSummary> = (0..5).map(|h| media_at(1, 8 + h, 0)).collect();
        media.push(media_at(2, 9, 0));

        let proposals = same_day(&media, &config);
        assert_eq!(proposals.len(), 2);
        assert_eq!(proposals[0].member_count(), 5);
        assert_eq!(proposals[0].narrative_arc, NarrativeArc::Chronological);
        assert_eq!(proposals[1].member_count(), 1);
        assert_eq!(proposals[1].narrative_arc, NarrativeArc::Collection);
    }

    #[test]
    fn test_same_day_splits_oversized_bucket() {
        let config = AutoPilotConfig {
            same_day_max_media: 3,
            ..Default::default()
        };
        let media: Vec<MediaSummary> = (0..7).map(|h| media_at(1, 8 + h, 0)).collect();
        let proposals = same_day(&media, &config);
        let sizes: Vec<usize> = proposals.iter().map(|p| p.member_count()).collect();
        assert_eq!(sizes, vec![3, 3, 1]);
    }

    #[test]
    fn test_sequential_closes_run_on_gap() {
        let config = AutoPilotConfig {
            sequential_gap_minutes: 180,
            ..Default::default()
        };
        let media = vec![
            media_at(1, 8, 0),
            media_at(1, 9, 30),
            media_at(1, 10, 0),
            // 5-hour gap closes the run
            media_at(1, 15, 30),
            media_at(1, 16, 0),
        ];
        let proposals = sequential(&media, &config);
        assert_eq!(proposals.len(), 2);
        assert_eq!(proposals[0].member_count(), 3);
        assert_eq!(proposals[1].member_count(), 2);
    }

    #[test]
    fn test_sequential_discards_singleton_runs() {
        let config = AutoPilotConfig::default();
        let media = vec![media_at(1, 8, 0), media_at(1, 20, 0)];
        assert!(sequential(&media, &config).is_empty());
    }

    #[test]
    fn test_similar_topics_claims_once() {
        let config = AutoPilotConfig {
            topic_similarity_threshold: 0.3,
            ..Default::default()
        };
        let media = vec![
            with_topics(media_at(1, 8, 0), &["food", "travel"]),
            with_topics(media_at(1, 9, 0), &["food", "travel", "sunset"]),
            with_topics(media_at(1, 10, 0), &["food"]),
            with_topics(media_at(1, 11, 0), &["finance"]),
        ];
        let proposals = similar_topics(&media, &config);
        assert_eq!(proposals.len(), 1);
        assert_eq!(proposals[0].member_count(), 3);
        assert_eq!(proposals[0].rule, GroupingRule::SimilarTopics);
    }

    #[test]
    fn test_similar_topics_ignores_empty_topic_sets() {
        let config = AutoPilotConfig::default();
        let media = vec![media_at(1, 8, 0), media_at(1, 9, 0)];
        assert!(similar_topics(&media, &config).is_empty());
    }

    #[test]
    fn test_event_detection_buckets_by_context() {
        let config = AutoPilotConfig::default();
        let media = vec![
            with_context(media_at(1, 8, 0), "annual conference"),
            with_context(media_at(1, 9, 0), "annual conference"),
            with_context(media_at(1, 10, 0), "beach day"),
        ];
        let proposals = event_detection(&media, &config);
        assert_eq!(proposals.len(), 1);
        assert_eq!(proposals[0].theme.as_deref(), Some("annual conference"));
        assert_eq!(proposals[0].rule, GroupingRule::EventDetection);
    }

    #[test]
    fn test_event_detection_honors_tenant_keywords() {
        let config = AutoPilotConfig {
            event_keywords: vec!["hackathon".to_string()],
            ..Default::default()
        };
        let media = vec![
            with_context(media_at(1, 8, 0), "spring hackathon"),
            with_context(media_at(1, 9, 0), "spring hackathon"),
        ];
        let proposals = event_detection(&media, &config);
        assert_eq!(proposals.len(), 1);
        assert_eq!(proposals[0].theme.as_deref(), Some("spring hackathon"));
    }

    #[test]
    fn test_event_detection_matches_description() {
        let config = AutoPilotConfig::default();
        let mut a = media_at(1, 8, 0);
        a.description = Some("Team presentation on stage".to_string());
        let mut b = media_at(1, 9, 0);
        b.description = Some("Audience during the presentation".to_string());
        let proposals = event_detection(&[a, b], &config);
        assert_eq!(proposals.len(), 1);
        assert_eq!(proposals[0].theme.as_deref(), Some("presentation"));
    }
}
