use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PostStatus {
    Scheduled,
    PendingApproval,
}

impl Display for PostStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            PostStatus::Scheduled => write!(f, "scheduled"),
            PostStatus::PendingApproval => write!(f, "pending_approval"),
        }
    }
}

impl FromStr for PostStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "scheduled" => Ok(PostStatus::Scheduled),
            "pending_approval" => Ok(PostStatus::PendingApproval),
            _ => Err(anyhow::anyhow!("Invalid post status: {}", s)),
        }
    }
}

/// The pipeline's terminal artifact: a generated post draft, either
/// auto-scheduled or queued for human approval.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub group_id: Option<Uuid>,
    pub title: Option<String>,
    pub content: String,
    pub status: PostStatus,
    pub confidence: f64,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl sqlx::FromRow<'_, sqlx::postgres::PgRow> for Post {
    fn from_row(row: &sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        use sqlx::Row;
        Ok(Post {
            id: row.get("id"),
            tenant_id: row.get("tenant_id"),
            group_id: row.get("group_id"),
            title: row.get("title"),
            content: row.get("content"),
            status: row.get::<String, _>("status").parse().map_err(|e| {
                sqlx::Error::Decode(format!("Failed to parse status: {}", e).into())
            })?,
            confidence: row.get("confidence"),
            scheduled_at: row.get("scheduled_at"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        })
    }
}

#[derive(Debug, Clone)]
pub struct NewPost {
    pub tenant_id: Uuid,
    pub group_id: Option<Uuid>,
    pub title: Option<String>,
    pub content: String,
    pub status: PostStatus,
    pub confidence: f64,
    pub scheduled_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_post_status_roundtrip() {
        assert_eq!(PostStatus::Scheduled.to_string(), "scheduled");
        assert_eq!(
            "pending_approval".parse::<PostStatus>().unwrap(),
            PostStatus::PendingApproval
        );
        assert!("draft".parse::<PostStatus>().is_err());
    }
}
