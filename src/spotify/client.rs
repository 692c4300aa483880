use std::num::NonZeroU32;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use governor::{
    Quota, RateLimiter, clock::DefaultClock, state::InMemoryState, state::direct::NotKeyed,
};
use reqwest::StatusCode;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use serde::de::DeserializeOwned;
use serde_json::json;

use crate::config::SpotifyCredentials;
use crate::error::ApiError;
use crate::spotify::auth;
use crate::spotify::types::{
    PlaylistsPage, RecentlyPlayedPage, SimplifiedPlaylist, SnapshotResponse, UserProfile,
};

const API_BASE: &str = "https://api.spotify.com/v1";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const RECENTLY_PLAYED_PAGE_SIZE: u32 = 50;
const PLAYLIST_PAGE_SIZE: u32 = 50;

/// Spotify caps track mutations at 100 URIs per request.
pub const TRACKS_PER_REQUEST: usize = 100;

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

// Create a rate limiter: 5 requests per second against the Web API
static RATE_LIMITER: OnceLock<Arc<DirectRateLimiter>> = OnceLock::new();

fn rate_limiter() -> &'static Arc<DirectRateLimiter> {
    RATE_LIMITER.get_or_init(|| {
        let quota = Quota::per_second(NonZeroU32::new(5).unwrap());
        Arc::new(RateLimiter::direct(quota))
    })
}

/// Port trait wrapping the Spotify Web API capabilities used by the
/// history and playlist adapters.
///
/// Implemented by `SpotifyClient` (production) or test mocks.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait SpotifyApi: Send + Sync {
    /// Get the current user's profile
    async fn current_user(&self) -> Result<UserProfile, ApiError>;

    /// One page of the user's play history. `next_url` is the cursor URL
    /// from the previous page; `None` requests the first page.
    async fn recently_played_page(
        &self,
        next_url: Option<String>,
    ) -> Result<RecentlyPlayedPage, ApiError>;

    /// All playlists owned by or followed by the current user.
    async fn current_user_playlists(&self) -> Result<Vec<SimplifiedPlaylist>, ApiError>;

    async fn create_playlist(
        &self,
        user_id: &str,
        name: &str,
        description: &str,
        public: bool,
    ) -> Result<SimplifiedPlaylist, ApiError>;

    /// Replace the playlist's track list with exactly `uris`.
    async fn replace_playlist_tracks(
        &self,
        playlist_id: &str,
        uris: &[String],
    ) -> Result<(), ApiError>;

    /// Append `uris` to the playlist. Only used for the chunks beyond the
    /// per-request cap, after the first chunk replaced the list.
    async fn add_playlist_tracks(
        &self,
        playlist_id: &str,
        uris: &[String],
    ) -> Result<(), ApiError>;
}

/// Spotify API client.
///
/// The access token is obtained from the refresh grant on first use and
/// cached for the lifetime of this value, i.e. one invocation.
pub struct SpotifyClient {
    http: reqwest::Client,
    credentials: SpotifyCredentials,
    token: tokio::sync::OnceCell<String>,
}

impl SpotifyClient {
    pub fn new(credentials: SpotifyCredentials) -> Self {
        Self {
            http: reqwest::Client::new(),
            credentials,
            token: tokio::sync::OnceCell::new(),
        }
    }

    async fn access_token(&self) -> Result<&str, ApiError> {
        self.token
            .get_or_try_init(|| async {
                let token = auth::refresh_access_token(&self.http, &self.credentials).await?;
                tracing::debug!(expires_in = token.expires_in, "refreshed spotify access token");
                Ok(token.access_token)
            })
            .await
            .map(String::as_str)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, ApiError> {
        self.send_json(self.http.get(url), url).await
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        url: &str,
    ) -> Result<T, ApiError> {
        rate_limiter().until_ready().await;
        let token = self.access_token().await?;

        let response = request
            .bearer_auth(token)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(ApiError::from)?;

        let response = check_status(response).await?;
        response.json::<T>().await.map_err(|err| {
            ApiError::UnexpectedResponse(format!("failed to decode response from {url}: {err}"))
        })
    }
}

#[async_trait::async_trait]
impl SpotifyApi for SpotifyClient {
    async fn current_user(&self) -> Result<UserProfile, ApiError> {
        self.get_json(&format!("{API_BASE}/me")).await
    }

    async fn recently_played_page(
        &self,
        next_url: Option<String>,
    ) -> Result<RecentlyPlayedPage, ApiError> {
        let url = next_url.unwrap_or_else(|| {
            format!("{API_BASE}/me/player/recently-played?limit={RECENTLY_PLAYED_PAGE_SIZE}")
        });
        self.get_json(&url).await
    }

    async fn current_user_playlists(&self) -> Result<Vec<SimplifiedPlaylist>, ApiError> {
        let mut all_playlists = Vec::new();
        let mut next_url = Some(format!("{API_BASE}/me/playlists?limit={PLAYLIST_PAGE_SIZE}"));

        while let Some(url) = next_url {
            let page: PlaylistsPage = self.get_json(&url).await?;
            all_playlists.extend(page.items);
            next_url = page.next;
        }

        Ok(all_playlists)
    }

    async fn create_playlist(
        &self,
        user_id: &str,
        name: &str,
        description: &str,
        public: bool,
    ) -> Result<SimplifiedPlaylist, ApiError> {
        let url = format!("{API_BASE}/users/{user_id}/playlists");
        let body = json!({
            "name": name,
            "description": description,
            "public": public,
        });
        self.send_json(self.http.post(&url).json(&body), &url).await
    }

    async fn replace_playlist_tracks(
        &self,
        playlist_id: &str,
        uris: &[String],
    ) -> Result<(), ApiError> {
        let url = format!("{API_BASE}/playlists/{playlist_id}/tracks");
        let body = json!({ "uris": uris });
        let snapshot: SnapshotResponse =
            self.send_json(self.http.put(&url).json(&body), &url).await?;
        tracing::debug!(snapshot_id = %snapshot.snapshot_id, "replaced playlist tracks");
        Ok(())
    }

    async fn add_playlist_tracks(
        &self,
        playlist_id: &str,
        uris: &[String],
    ) -> Result<(), ApiError> {
        let url = format!("{API_BASE}/playlists/{playlist_id}/tracks");
        let body = json!({ "uris": uris });
        let snapshot: SnapshotResponse =
            self.send_json(self.http.post(&url).json(&body), &url).await?;
        tracing::debug!(snapshot_id = %snapshot.snapshot_id, "appended playlist tracks");
        Ok(())
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let retry_after = parse_retry_after(response.headers());
    let body = response.text().await.unwrap_or_default();
    Err(classify_response(status, retry_after, &body))
}

fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<u64>().ok())
        .map(Duration::from_secs)
}

fn classify_response(status: StatusCode, retry_after: Option<Duration>, body: &str) -> ApiError {
    match status {
        StatusCode::UNAUTHORIZED => {
            ApiError::Auth(format!("provider rejected credentials: {body}"))
        }
        StatusCode::FORBIDDEN => ApiError::QuotaExceeded(format!("request forbidden: {body}")),
        StatusCode::TOO_MANY_REQUESTS => ApiError::Transient {
            message: format!("rate limited: {body}"),
            retry_after,
        },
        status if status.is_server_error() => ApiError::Transient {
            message: format!("provider returned {status}: {body}"),
            retry_after,
        },
        status => ApiError::UnexpectedResponse(format!("provider returned {status}: {body}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_auth_and_quota() {
        assert!(matches!(
            classify_response(StatusCode::UNAUTHORIZED, None, "expired"),
            ApiError::Auth(_)
        ));
        assert!(matches!(
            classify_response(StatusCode::FORBIDDEN, None, "quota"),
            ApiError::QuotaExceeded(_)
        ));
    }

    #[test]
    fn test_classify_rate_limit_keeps_hint() {
        let err = classify_response(
            StatusCode::TOO_MANY_REQUESTS,
            Some(Duration::from_secs(7)),
            "slow down",
        );
        match err {
            ApiError::Transient { retry_after, .. } => {
                assert_eq!(retry_after, Some(Duration::from_secs(7)));
            }
            other => panic!("expected transient, got {other:?}"),
        }
    }

    #[test]
    fn test_classify_server_errors_are_transient() {
        assert!(classify_response(StatusCode::BAD_GATEWAY, None, "").is_transient());
        assert!(
            classify_response(StatusCode::INTERNAL_SERVER_ERROR, None, "").is_transient()
        );
    }

    #[test]
    fn test_classify_other_statuses_are_unexpected() {
        assert!(matches!(
            classify_response(StatusCode::NOT_FOUND, None, "gone"),
            ApiError::UnexpectedResponse(_)
        ));
    }

    #[test]
    fn test_parse_retry_after() {
        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, "12".parse().unwrap());
        assert_eq!(parse_retry_after(&headers), Some(Duration::from_secs(12)));

        let empty = HeaderMap::new();
        assert_eq!(parse_retry_after(&empty), None);
    }
}
