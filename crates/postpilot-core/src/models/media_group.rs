use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use uuid::Uuid;

/// Which grouping heuristic produced a group. `Mixed` marks groups created by
/// merging proposals from different rules.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum GroupingRule {
    SameDay,
    Sequential,
    SimilarTopics,
    EventDetection,
    Mixed,
}

impl Display for GroupingRule {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            GroupingRule::SameDay => write!(f, "same_day"),
            GroupingRule::Sequential => write!(f, "sequential"),
            GroupingRule::SimilarTopics => write!(f, "similar_topics"),
            GroupingRule::EventDetection => write!(f, "event_detection"),
            GroupingRule::Mixed => write!(f, "mixed"),
        }
    }
}

impl FromStr for GroupingRule {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "same_day" => Ok(GroupingRule::SameDay),
            "sequential" => Ok(GroupingRule::Sequential),
            "similar_topics" => Ok(GroupingRule::SimilarTopics),
            "event_detection" => Ok(GroupingRule::EventDetection),
            "mixed" => Ok(GroupingRule::Mixed),
            _ => Err(anyhow::anyhow!("Invalid grouping rule: {}", s)),
        }
    }
}

/// Coarse classification of how a group's media relate.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NarrativeArc {
    Chronological,
    BeforeAfter,
    Comparison,
    Collection,
}

impl Display for NarrativeArc {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            NarrativeArc::Chronological => write!(f, "chronological"),
            NarrativeArc::BeforeAfter => write!(f, "before_after"),
            NarrativeArc::Comparison => write!(f, "comparison"),
            NarrativeArc::Collection => write!(f, "collection"),
        }
    }
}

impl FromStr for NarrativeArc {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "chronological" => Ok(NarrativeArc::Chronological),
            "before_after" => Ok(NarrativeArc::BeforeAfter),
            "comparison" => Ok(NarrativeArc::Comparison),
            "collection" => Ok(NarrativeArc::Collection),
            _ => Err(anyhow::anyhow!("Invalid narrative arc: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GroupStatus {
    ReadyForPost,
    Generating,
    Posted,
    Failed,
}

impl Display for GroupStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            GroupStatus::ReadyForPost => write!(f, "ready_for_post"),
            GroupStatus::Generating => write!(f, "generating"),
            GroupStatus::Posted => write!(f, "posted"),
            GroupStatus::Failed => write!(f, "failed"),
        }
    }
}

impl FromStr for GroupStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ready_for_post" => Ok(GroupStatus::ReadyForPost),
            "generating" => Ok(GroupStatus::Generating),
            "posted" => Ok(GroupStatus::Posted),
            "failed" => Ok(GroupStatus::Failed),
            _ => Err(anyhow::anyhow!("Invalid group status: {}", s)),
        }
    }
}

impl GroupStatus {
    /// A group never regresses from `posted`; `generating` may revert to
    /// `ready_for_post` only through the stale-claim reclaim.
    pub fn can_transition(self, next: GroupStatus) -> bool {
        matches!(
            (self, next),
            (GroupStatus::ReadyForPost, GroupStatus::Generating)
                | (GroupStatus::Generating, GroupStatus::Posted)
                | (GroupStatus::Generating, GroupStatus::Failed)
                | (GroupStatus::Generating, GroupStatus::ReadyForPost)
        )
    }
}

/// A proposed or finalized "story": a set of synced media that should become
/// one post. Immutable once `posted`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaGroup {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub rule: GroupingRule,
    pub reason: String,
    pub date_range_start: DateTime<Utc>,
    pub date_range_end: DateTime<Utc>,
    pub common_topics: Vec<String>,
    pub theme: Option<String>,
    pub narrative_arc: NarrativeArc,
    pub confidence: f64,
    pub media_count: i32,
    pub min_media: i32,
    pub max_media: i32,
    pub status: GroupStatus,
    pub post_ids: Vec<Uuid>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl sqlx::FromRow<'_, sqlx::postgres::PgRow> for MediaGroup {
    fn from_row(row: &sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        use sqlx::Row;
        Ok(MediaGroup {
            id: row.get("id"),
            tenant_id: row.get("tenant_id"),
            rule: row.get::<String, _>("rule").parse().map_err(|e| {
                sqlx::Error::Decode(format!("Failed to parse rule: {}", e).into())
            })?,
            reason: row.get("reason"),
            date_range_start: row.get("date_range_start"),
            date_range_end: row.get("date_range_end"),
            common_topics: row
                .get::<Option<Vec<String>>, _>("common_topics")
                .unwrap_or_default(),
            theme: row.get("theme"),
            narrative_arc: row.get::<String, _>("narrative_arc").parse().map_err(|e| {
                sqlx::Error::Decode(format!("Failed to parse narrative_arc: {}", e).into())
            })?,
            confidence: row.get("confidence"),
            media_count: row.get("media_count"),
            min_media: row.get("min_media"),
            max_media: row.get("max_media"),
            status: row.get::<String, _>("status").parse().map_err(|e| {
                sqlx::Error::Decode(format!("Failed to parse status: {}", e).into())
            })?,
            post_ids: row
                .get::<Option<Vec<Uuid>>, _>("post_ids")
                .unwrap_or_default(),
            error_message: row.get("error_message"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        })
    }
}

impl MediaGroup {
    /// Group bounds invariant: member count within the configured range.
    pub fn within_bounds(&self) -> bool {
        self.media_count >= self.min_media && self.media_count <= self.max_media
    }
}

/// Insert payload for a persisted proposal (status starts at `ready_for_post`).
#[derive(Debug, Clone)]
pub struct NewMediaGroup {
    pub tenant_id: Uuid,
    pub rule: GroupingRule,
    pub reason: String,
    pub date_range_start: DateTime<Utc>,
    pub date_range_end: DateTime<Utc>,
    pub common_topics: Vec<String>,
    pub theme: Option<String>,
    pub narrative_arc: NarrativeArc,
    pub confidence: f64,
    pub media_count: i32,
    pub min_media: i32,
    pub max_media: i32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_roundtrip() {
        for rule in [
            GroupingRule::SameDay,
            GroupingRule::Sequential,
            GroupingRule::SimilarTopics,
            GroupingRule::EventDetection,
            GroupingRule::Mixed,
        ] {
            assert_eq!(rule.to_string().parse::<GroupingRule>().unwrap(), rule);
        }
    }

    #[test]
    fn test_group_status_never_regresses_from_posted() {
        assert!(!GroupStatus::Posted.can_transition(GroupStatus::ReadyForPost));
        assert!(!GroupStatus::Posted.can_transition(GroupStatus::Generating));
        assert!(!GroupStatus::Posted.can_transition(GroupStatus::Failed));
    }

    #[test]
    fn test_group_status_forward_transitions() {
        assert!(GroupStatus::ReadyForPost.can_transition(GroupStatus::Generating));
        assert!(GroupStatus::Generating.can_transition(GroupStatus::Posted));
        assert!(GroupStatus::Generating.can_transition(GroupStatus::Failed));
        // Stale-claim reclaim
        assert!(GroupStatus::Generating.can_transition(GroupStatus::ReadyForPost));
    }

    #[test]
    fn test_within_bounds() {
        let mut group = MediaGroup {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            rule: GroupingRule::SameDay,
            reason: String::new(),
            date_range_start: chrono::Utc::now(),
            date_range_end: chrono::Utc::now(),
            common_topics: Vec::new(),
            theme: None,
            narrative_arc: NarrativeArc::Collection,
            confidence: 0.5,
            media_count: 5,
            min_media: 2,
            max_media: 10,
            status: GroupStatus::ReadyForPost,
            post_ids: Vec::new(),
            error_message: None,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        };
        assert!(group.within_bounds());
        group.media_count = 1;
        assert!(!group.within_bounds());
        group.media_count = 11;
        assert!(!group.within_bounds());
        group.media_count = 10;
        assert!(group.within_bounds());
    }

    #[test]
    fn test_narrative_arc_roundtrip() {
        for arc in [
            NarrativeArc::Chronological,
            NarrativeArc::BeforeAfter,
            NarrativeArc::Comparison,
            NarrativeArc::Collection,
        ] {
            assert_eq!(arc.to_string().parse::<NarrativeArc>().unwrap(), arc);
        }
    }
}
