//! External-service adapters
//!
//! Traits at the seams (remote storage, blob re-hosting, vision analysis,
//! content generation) plus the concrete providers the pipeline ships with:
//! Google Drive, Cloudinary, and the Anthropic Messages API.

pub mod anthropic;
pub mod blob;
pub mod generation;
pub mod google_drive;
pub mod remote;
pub mod vision;

pub use blob::{BlobStore, CloudinaryStore, HostedBlob};
pub use generation::{ClaudeGenerator, ContentGenerator, GeneratedPost};
pub use google_drive::GoogleDriveStorage;
pub use remote::{Credentials, RemoteFile, RemoteStorage};
pub use vision::{ClaudeVision, VisionAnalyzer};
