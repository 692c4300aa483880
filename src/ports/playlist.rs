use crate::error::ApiError;

/// The full desired state of the published playlist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistSpec {
    pub name: String,
    pub description: String,
    pub track_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedPlaylist {
    pub id: String,
    pub url: String,
}

/// Port trait wrapping the provider's playlist capability.
///
/// Implementations live in `spotify::playlist` (production) or test mocks.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait PlaylistStore: Send + Sync {
    /// Create the named playlist if it does not exist, then make its track
    /// list exactly `spec.track_ids` (replace, never append).
    async fn publish(&self, spec: &PlaylistSpec) -> Result<PublishedPlaylist, ApiError>;
}
