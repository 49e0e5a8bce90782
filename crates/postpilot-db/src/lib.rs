//! Postgres repositories for the autopilot pipeline.

pub mod autopilot;
pub mod integrations;
pub mod media_groups;
pub mod posts;
pub mod synced_media;

pub use autopilot::AutoPilotConfigRepository;
pub use integrations::IntegrationRepository;
pub use media_groups::MediaGroupRepository;
pub use posts::PostRepository;
pub use synced_media::SyncedMediaRepository;
