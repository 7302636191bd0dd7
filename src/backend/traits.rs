//! Common trait for image generation backends

use async_trait::async_trait;

use crate::error::Result;
use crate::payload::ImagePayload;

/// Trait for hairstyle generation backends.
///
/// One call produces one transformed image from the captured photo and a
/// catalog style instruction, or fails with a classifiable error.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Get the backend name
    fn name(&self) -> &str;

    /// Generate one styled variant of `image`
    async fn generate(&self, image: &ImagePayload, instruction: &str) -> Result<ImagePayload>;
}
