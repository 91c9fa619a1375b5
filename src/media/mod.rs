//! Media generation cache and package media registry.
mod cache;
mod registry;

pub use cache::{audio_file_name, image_file_name, CacheStats, MediaGenerationCache};
pub use registry::{DetailedMediaStats, MediaFileManager, MediaReference, MediaStats};
