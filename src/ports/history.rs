use chrono::{DateTime, Utc};

use crate::error::ApiError;

/// One playback of one track, as reported by the streaming provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayEvent {
    pub track_id: String,
    pub track_name: String,
    pub artist_name: String,
    pub played_at: DateTime<Utc>,
}

/// Port trait wrapping the provider's listening-history capability.
///
/// Implementations live in `spotify::history` (production) or test mocks.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait PlayHistory: Send + Sync {
    /// Play events within the lookback window, most recent first. Items
    /// with missing track metadata are dropped, not reported as errors.
    async fn recent_plays(&self, window: chrono::Duration) -> Result<Vec<PlayEvent>, ApiError>;
}
