use async_trait::async_trait;

use crate::domain::DomainError;

/// Port for reaching audio resources by URL.
#[async_trait]
pub trait AudioSource: Send + Sync {
    /// Check that `url` answers with a success status and an audio content type.
    async fn probe(&self, url: &str) -> Result<(), DomainError>;

    /// Download the resource body.
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, DomainError>;
}
