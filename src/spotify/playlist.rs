use std::sync::Arc;

use tracing::instrument;

use crate::error::ApiError;
use crate::ports::playlist::{PlaylistSpec, PlaylistStore, PublishedPlaylist};
use crate::retry::{RetryPolicy, with_retries};
use crate::spotify::client::{SpotifyApi, TRACKS_PER_REQUEST};

const PLAYLIST_URL_BASE: &str = "https://open.spotify.com/playlist";

/// Production `PlaylistStore` backed by the Spotify playlist endpoints.
pub struct SpotifyPlaylists<C> {
    client: Arc<C>,
    retry: RetryPolicy,
    public: bool,
}

impl<C> SpotifyPlaylists<C> {
    pub fn new(client: Arc<C>, retry: RetryPolicy, public: bool) -> Self {
        Self {
            client,
            retry,
            public,
        }
    }
}

#[async_trait::async_trait]
impl<C: SpotifyApi> PlaylistStore for SpotifyPlaylists<C> {
    #[instrument(skip(self, spec), fields(playlist = %spec.name, tracks = spec.track_ids.len()))]
    async fn publish(&self, spec: &PlaylistSpec) -> Result<PublishedPlaylist, ApiError> {
        let playlists = with_retries(&self.retry, "list playlists", || {
            self.client.current_user_playlists()
        })
        .await?;

        let playlist_id = match playlists.into_iter().find(|p| p.name == spec.name) {
            Some(existing) => {
                tracing::info!(playlist_id = %existing.id, "replacing tracks of existing playlist");
                existing.id
            }
            None => {
                let user =
                    with_retries(&self.retry, "current user", || self.client.current_user())
                        .await?;
                let created = with_retries(&self.retry, "create playlist", || {
                    self.client
                        .create_playlist(&user.id, &spec.name, &spec.description, self.public)
                })
                .await?;
                tracing::info!(playlist_id = %created.id, "created playlist");
                created.id
            }
        };

        let uris = track_uris(&spec.track_ids);
        let mut chunks = uris.chunks(TRACKS_PER_REQUEST);

        // The first request is a PUT so the remote list becomes exactly the
        // requested tracks, never an append onto last week's.
        let first_chunk = chunks.next().unwrap_or(&[]);
        with_retries(&self.retry, "replace playlist tracks", || {
            self.client.replace_playlist_tracks(&playlist_id, first_chunk)
        })
        .await?;

        for chunk in chunks {
            with_retries(&self.retry, "add playlist tracks", || {
                self.client.add_playlist_tracks(&playlist_id, chunk)
            })
            .await?;
        }

        Ok(PublishedPlaylist {
            url: playlist_url(&playlist_id),
            id: playlist_id,
        })
    }
}

fn track_uris(track_ids: &[String]) -> Vec<String> {
    track_ids
        .iter()
        .map(|id| format!("spotify:track:{id}"))
        .collect()
}

fn playlist_url(playlist_id: &str) -> String {
    format!("{PLAYLIST_URL_BASE}/{playlist_id}")
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use super::*;
    use crate::spotify::client::MockSpotifyApi;
    use crate::spotify::types::{SimplifiedPlaylist, UserProfile};

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_retries: 3,
            min_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
        }
    }

    fn spec(track_ids: &[&str]) -> PlaylistSpec {
        PlaylistSpec {
            name: "Weekly Gems".into(),
            description: "Top tracks from your recent listening.".into(),
            track_ids: track_ids.iter().map(|id| id.to_string()).collect(),
        }
    }

    fn playlist(id: &str, name: &str) -> SimplifiedPlaylist {
        SimplifiedPlaylist {
            id: id.into(),
            name: name.into(),
        }
    }

    #[test]
    fn test_track_uris() {
        let ids = vec!["abc".to_string(), "def".to_string()];
        assert_eq!(
            track_uris(&ids),
            vec!["spotify:track:abc", "spotify:track:def"]
        );
    }

    #[test]
    fn test_playlist_url() {
        assert_eq!(
            playlist_url("37i9dQZF1DXcBWIGoYBM5M"),
            "https://open.spotify.com/playlist/37i9dQZF1DXcBWIGoYBM5M"
        );
    }

    #[tokio::test]
    async fn test_creates_playlist_when_absent() {
        let mut api = MockSpotifyApi::new();
        api.expect_current_user_playlists()
            .times(1)
            .returning(|| Ok(vec![playlist("other", "Road Trip")]));
        api.expect_current_user().times(1).returning(|| {
            Ok(UserProfile {
                id: "user1".into(),
                display_name: None,
            })
        });
        api.expect_create_playlist()
            .withf(|user_id, name, _description, public| {
                user_id == "user1" && name == "Weekly Gems" && !*public
            })
            .times(1)
            .returning(|_, name, _, _| Ok(playlist("pl9", name)));
        api.expect_replace_playlist_tracks()
            .withf(|playlist_id, uris| {
                playlist_id == "pl9" && *uris == ["spotify:track:t1", "spotify:track:t2"]
            })
            .times(1)
            .returning(|_, _| Ok(()));

        let store = SpotifyPlaylists::new(Arc::new(api), fast_policy(), false);
        let published = store.publish(&spec(&["t1", "t2"])).await.unwrap();

        assert_eq!(published.id, "pl9");
        assert_eq!(published.url, "https://open.spotify.com/playlist/pl9");
    }

    #[tokio::test]
    async fn test_reuses_playlist_matching_by_name() {
        let mut api = MockSpotifyApi::new();
        api.expect_current_user_playlists()
            .times(1)
            .returning(|| Ok(vec![playlist("other", "Road Trip"), playlist("pl1", "Weekly Gems")]));
        api.expect_current_user().times(0);
        api.expect_create_playlist().times(0);
        api.expect_replace_playlist_tracks()
            .withf(|playlist_id, _uris| playlist_id == "pl1")
            .times(1)
            .returning(|_, _| Ok(()));

        let store = SpotifyPlaylists::new(Arc::new(api), fast_policy(), false);
        let published = store.publish(&spec(&["t1"])).await.unwrap();

        assert_eq!(published.id, "pl1");
    }

    #[tokio::test]
    async fn test_publishing_twice_leaves_exactly_the_requested_tracks() {
        // Simulated remote track list: PUT overwrites, POST appends.
        let remote: Arc<Mutex<Vec<String>>> = Arc::default();

        let mut api = MockSpotifyApi::new();
        api.expect_current_user_playlists()
            .times(2)
            .returning(|| Ok(vec![playlist("pl1", "Weekly Gems")]));
        let state = Arc::clone(&remote);
        api.expect_replace_playlist_tracks()
            .times(2)
            .returning(move |_, uris| {
                *state.lock().unwrap() = uris.to_vec();
                Ok(())
            });

        let store = SpotifyPlaylists::new(Arc::new(api), fast_policy(), false);
        store.publish(&spec(&["t1", "t2"])).await.unwrap();
        store.publish(&spec(&["t1", "t2"])).await.unwrap();

        assert_eq!(
            *remote.lock().unwrap(),
            ["spotify:track:t1", "spotify:track:t2"]
        );
    }

    #[tokio::test]
    async fn test_specs_beyond_the_request_cap_are_chunked() {
        let track_ids: Vec<String> = (0..120).map(|n| format!("t{n}")).collect();
        let remote: Arc<Mutex<Vec<String>>> = Arc::default();

        let mut api = MockSpotifyApi::new();
        api.expect_current_user_playlists()
            .times(1)
            .returning(|| Ok(vec![playlist("pl1", "Weekly Gems")]));
        let state = Arc::clone(&remote);
        api.expect_replace_playlist_tracks()
            .withf(|_, uris| uris.len() == TRACKS_PER_REQUEST)
            .times(1)
            .returning(move |_, uris| {
                *state.lock().unwrap() = uris.to_vec();
                Ok(())
            });
        let state = Arc::clone(&remote);
        api.expect_add_playlist_tracks()
            .withf(|_, uris| uris.len() == 20)
            .times(1)
            .returning(move |_, uris| {
                state.lock().unwrap().extend_from_slice(uris);
                Ok(())
            });

        let store = SpotifyPlaylists::new(Arc::new(api), fast_policy(), false);
        store
            .publish(&PlaylistSpec {
                name: "Weekly Gems".into(),
                description: String::new(),
                track_ids,
            })
            .await
            .unwrap();

        let remote = remote.lock().unwrap();
        assert_eq!(remote.len(), 120);
        assert_eq!(remote[0], "spotify:track:t0");
        assert_eq!(remote[119], "spotify:track:t119");
    }
}
