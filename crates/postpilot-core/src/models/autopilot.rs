use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Brand-voice settings fed into the post-generation prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrandProfile {
    pub voice: String,
    pub audience: Option<String>,
    pub hashtags: Vec<String>,
}

impl Default for BrandProfile {
    fn default() -> Self {
        Self {
            voice: "friendly and professional".to_string(),
            audience: None,
            hashtags: Vec::new(),
        }
    }
}

/// Per-tenant tunables for the grouping engine and post generator. Tenants
/// without a stored row get `Default` values; stored settings may be partial
/// and fall back field-by-field.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoPilotConfig {
    pub tenant_id: Uuid,
    // Grouping rule toggles
    pub same_day_enabled: bool,
    pub sequential_enabled: bool,
    pub similar_topics_enabled: bool,
    pub event_detection_enabled: bool,
    pub merge_enabled: bool,
    // Rule thresholds
    pub same_day_max_media: usize,
    pub sequential_gap_minutes: i64,
    pub topic_similarity_threshold: f64,
    pub event_keywords: Vec<String>,
    // Group size bounds
    pub min_media_per_post: usize,
    pub max_media_per_post: usize,
    // Generation / scheduling
    pub auto_approve: bool,
    pub auto_schedule: bool,
    pub confidence_threshold: f64,
    pub preferred_post_times: Vec<String>,
    pub target_posts_per_week: i32,
    pub brand: BrandProfile,
}

impl Default for AutoPilotConfig {
    fn default() -> Self {
        Self {
            tenant_id: Uuid::nil(),
            same_day_enabled: true,
            sequential_enabled: true,
            similar_topics_enabled: true,
            event_detection_enabled: true,
            merge_enabled: true,
            same_day_max_media: 5,
            sequential_gap_minutes: 180,
            topic_similarity_threshold: 0.3,
            event_keywords: Vec::new(),
            min_media_per_post: 2,
            max_media_per_post: 10,
            auto_approve: false,
            auto_schedule: true,
            confidence_threshold: 0.8,
            preferred_post_times: vec!["09:00".to_string(), "17:00".to_string()],
            target_posts_per_week: 3,
            brand: BrandProfile::default(),
        }
    }
}

impl AutoPilotConfig {
    pub fn for_tenant(tenant_id: Uuid) -> Self {
        Self {
            tenant_id,
            ..Default::default()
        }
    }

    /// Preferred posting times parsed to `NaiveTime`, skipping malformed
    /// entries. Falls back to 09:00 when nothing parses.
    pub fn preferred_times(&self) -> Vec<NaiveTime> {
        let mut times: Vec<NaiveTime> = self
            .preferred_post_times
            .iter()
            .filter_map(|s| NaiveTime::parse_from_str(s.trim(), "%H:%M").ok())
            .collect();
        if times.is_empty() {
            times.push(NaiveTime::from_hms_opt(9, 0, 0).expect("valid constant time"));
        }
        times
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AutoPilotConfig::default();
        assert!(config.same_day_enabled);
        assert!(config.merge_enabled);
        assert_eq!(config.min_media_per_post, 2);
        assert_eq!(config.max_media_per_post, 10);
        assert!(!config.auto_approve);
        assert_eq!(config.confidence_threshold, 0.8);
    }

    #[test]
    fn test_preferred_times_parses_valid_entries() {
        let config = AutoPilotConfig::default();
        let times = config.preferred_times();
        assert_eq!(times.len(), 2);
        assert_eq!(times[0], NaiveTime::from_hms_opt(9, 0, 0).unwrap());
        assert_eq!(times[1], NaiveTime::from_hms_opt(17, 0, 0).unwrap());
    }

    #[test]
    fn test_preferred_times_skips_malformed() {
        let config = AutoPilotConfig {
            preferred_post_times: vec!["nope".to_string(), "13:30".to_string()],
            ..Default::default()
        };
        let times = config.preferred_times();
        assert_eq!(times, vec![NaiveTime::from_hms_opt(13, 30, 0).unwrap()]);
    }

    #[test]
    fn test_preferred_times_falls_back_to_morning() {
        let config = AutoPilotConfig {
            preferred_post_times: vec![],
            ..Default::default()
        };
        assert_eq!(
            config.preferred_times(),
            vec![NaiveTime::from_hms_opt(9, 0, 0).unwrap()]
        );
    }
}
