pub mod autopilot;
pub mod integration;
pub mod media_group;
pub mod post;
pub mod synced_media;

pub use autopilot::{AutoPilotConfig, BrandProfile};
pub use integration::{IngestionIntegration, StorageProvider};
pub use media_group::{GroupStatus, GroupingRule, MediaGroup, NarrativeArc, NewMediaGroup};
pub use post::{NewPost, Post, PostStatus};
pub use synced_media::{MediaStatus, MediaType, NewSyncedMedia, SyncedMedia};
