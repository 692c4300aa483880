#![allow(dead_code)]

use serde::Deserialize;

/// Spotify OAuth token response
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: u64,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

/// Spotify user profile
#[derive(Debug, Clone, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub display_name: Option<String>,
}

/// One page of the recently-played endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct RecentlyPlayedPage {
    pub items: Vec<PlayHistoryItem>,
    pub next: Option<String>,
}

/// A play-history object. The track is absent for some podcast and local
/// items, and local tracks carry no id.
#[derive(Debug, Clone, Deserialize)]
pub struct PlayHistoryItem {
    #[serde(default)]
    pub track: Option<TrackObject>,
    pub played_at: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrackObject {
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub artists: Vec<ArtistObject>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ArtistObject {
    pub id: Option<String>,
    pub name: String,
}

/// One page of the current user's playlists.
#[derive(Debug, Clone, Deserialize)]
pub struct PlaylistsPage {
    pub items: Vec<SimplifiedPlaylist>,
    pub next: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SimplifiedPlaylist {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SnapshotResponse {
    pub snapshot_id: String,
}
