use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::instrument;

use crate::error::ApiError;
use crate::ports::history::{PlayEvent, PlayHistory};
use crate::retry::{RetryPolicy, with_retries};
use crate::spotify::client::SpotifyApi;
use crate::spotify::types::PlayHistoryItem;

/// The recently-played endpoint pages backwards in time; ten pages of fifty
/// covers far more than a week of ordinary listening.
const MAX_HISTORY_PAGES: usize = 10;

/// Production `PlayHistory` backed by the Spotify recently-played endpoint.
pub struct SpotifyHistory<C> {
    client: Arc<C>,
    retry: RetryPolicy,
}

impl<C> SpotifyHistory<C> {
    pub fn new(client: Arc<C>, retry: RetryPolicy) -> Self {
        Self { client, retry }
    }
}

#[async_trait::async_trait]
impl<C: SpotifyApi> PlayHistory for SpotifyHistory<C> {
    #[instrument(skip(self))]
    async fn recent_plays(&self, window: chrono::Duration) -> Result<Vec<PlayEvent>, ApiError> {
        let cutoff = Utc::now() - window;
        let mut events = Vec::new();
        let mut next_url: Option<String> = None;

        for _ in 0..MAX_HISTORY_PAGES {
            let page = with_retries(&self.retry, "recently played", || {
                let url = next_url.clone();
                async move { self.client.recently_played_page(url).await }
            })
            .await?;

            let reached_cutoff = collect_events(page.items, cutoff, &mut events)?;
            if reached_cutoff {
                break;
            }

            match page.next {
                Some(url) => next_url = Some(url),
                None => break,
            }
        }

        tracing::info!(count = events.len(), "fetched play events");
        Ok(events)
    }
}

/// Append the in-window events from one page to `out`. Returns true once an
/// item older than the cutoff is seen; items arrive most recent first, so
/// everything after it is out of the window too.
fn collect_events(
    items: Vec<PlayHistoryItem>,
    cutoff: DateTime<Utc>,
    out: &mut Vec<PlayEvent>,
) -> Result<bool, ApiError> {
    for item in items {
        let played_at = DateTime::parse_from_rfc3339(&item.played_at)
            .map_err(|err| {
                ApiError::UnexpectedResponse(format!(
                    "invalid played_at timestamp {:?}: {err}",
                    item.played_at
                ))
            })?
            .with_timezone(&Utc);

        if played_at < cutoff {
            return Ok(true);
        }

        let Some(track) = item.track else {
            tracing::debug!("skipping play event without track metadata");
            continue;
        };
        let Some(track_id) = track.id else {
            tracing::debug!(track = %track.name, "skipping track without an id");
            continue;
        };
        let Some(artist) = track.artists.into_iter().next() else {
            tracing::debug!(track = %track.name, "skipping track without artists");
            continue;
        };

        out.push(PlayEvent {
            track_id,
            track_name: track.name,
            artist_name: artist.name,
            played_at,
        });
    }

    Ok(false)
}

#[cfg(test)]
mod tests {
    use std::time::Duration as StdDuration;

    use chrono::TimeZone;

    use super::*;
    use crate::spotify::client::MockSpotifyApi;
    use crate::spotify::types::{ArtistObject, RecentlyPlayedPage, TrackObject};

    fn item(track: Option<TrackObject>, played_at: &str) -> PlayHistoryItem {
        PlayHistoryItem {
            track,
            played_at: played_at.into(),
        }
    }

    fn track(id: Option<&str>, name: &str, artists: Vec<&str>) -> TrackObject {
        TrackObject {
            id: id.map(String::from),
            name: name.into(),
            artists: artists
                .into_iter()
                .map(|name| ArtistObject {
                    id: None,
                    name: name.into(),
                })
                .collect(),
        }
    }

    fn cutoff() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_collects_events_inside_window() {
        let items = vec![
            item(
                Some(track(Some("t1"), "Song One", vec!["Artist A"])),
                "2026-08-03T10:00:00Z",
            ),
            item(
                Some(track(Some("t2"), "Song Two", vec!["Artist B"])),
                "2026-08-02T09:30:00Z",
            ),
        ];

        let mut out = Vec::new();
        let reached = collect_events(items, cutoff(), &mut out).unwrap();

        assert!(!reached);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].track_id, "t1");
        assert_eq!(out[0].artist_name, "Artist A");
    }

    #[test]
    fn test_stops_at_window_boundary() {
        let items = vec![
            item(
                Some(track(Some("t1"), "Recent", vec!["A"])),
                "2026-08-02T00:00:00Z",
            ),
            item(
                Some(track(Some("t2"), "Too Old", vec!["B"])),
                "2026-07-20T00:00:00Z",
            ),
            item(
                Some(track(Some("t3"), "Even Older", vec!["C"])),
                "2026-07-01T00:00:00Z",
            ),
        ];

        let mut out = Vec::new();
        let reached = collect_events(items, cutoff(), &mut out).unwrap();

        assert!(reached);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].track_id, "t1");
    }

    #[test]
    fn test_skips_items_with_missing_metadata() {
        let items = vec![
            item(None, "2026-08-03T10:00:00Z"),
            item(
                Some(track(None, "Local File", vec!["A"])),
                "2026-08-03T09:00:00Z",
            ),
            item(
                Some(track(Some("t1"), "No Artists", vec![])),
                "2026-08-03T08:00:00Z",
            ),
            item(
                Some(track(Some("t2"), "Keeper", vec!["B"])),
                "2026-08-03T07:00:00Z",
            ),
        ];

        let mut out = Vec::new();
        collect_events(items, cutoff(), &mut out).unwrap();

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].track_id, "t2");
    }

    #[test]
    fn test_malformed_timestamp_is_fatal() {
        let items = vec![item(
            Some(track(Some("t1"), "Song", vec!["A"])),
            "yesterday-ish",
        )];

        let mut out = Vec::new();
        let err = collect_events(items, cutoff(), &mut out).unwrap_err();
        assert!(matches!(err, ApiError::UnexpectedResponse(_)));
    }

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_retries: 3,
            min_delay: StdDuration::from_millis(1),
            max_delay: StdDuration::from_millis(5),
        }
    }

    fn recent_item(track_id: &str, minutes_ago: i64) -> PlayHistoryItem {
        item(
            Some(track(Some(track_id), "Song", vec!["Artist"])),
            &(Utc::now() - chrono::Duration::minutes(minutes_ago)).to_rfc3339(),
        )
    }

    #[tokio::test]
    async fn test_transient_page_fetch_recovers_on_retry() {
        let mut api = MockSpotifyApi::new();
        let mut seq = mockall::Sequence::new();
        api.expect_recently_played_page()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Err(ApiError::transient("rate limited")));
        api.expect_recently_played_page()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| {
                Ok(RecentlyPlayedPage {
                    items: vec![recent_item("t1", 5)],
                    next: None,
                })
            });

        let history = SpotifyHistory::new(Arc::new(api), fast_policy());
        let events = history.recent_plays(chrono::Duration::days(7)).await.unwrap();

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].track_id, "t1");
    }

    #[tokio::test]
    async fn test_follows_pagination_cursor() {
        let mut api = MockSpotifyApi::new();
        api.expect_recently_played_page()
            .withf(|url| url.is_none())
            .times(1)
            .returning(|_| {
                Ok(RecentlyPlayedPage {
                    items: vec![recent_item("t1", 5)],
                    next: Some("https://api.spotify.com/v1/next-page".into()),
                })
            });
        api.expect_recently_played_page()
            .withf(|url| url.as_deref() == Some("https://api.spotify.com/v1/next-page"))
            .times(1)
            .returning(|_| {
                Ok(RecentlyPlayedPage {
                    items: vec![recent_item("t2", 10)],
                    next: None,
                })
            });

        let history = SpotifyHistory::new(Arc::new(api), fast_policy());
        let events = history.recent_plays(chrono::Duration::days(7)).await.unwrap();

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].track_id, "t1");
        assert_eq!(events[1].track_id, "t2");
    }

    #[tokio::test]
    async fn test_stops_at_page_cap() {
        let mut api = MockSpotifyApi::new();
        api.expect_recently_played_page()
            .times(MAX_HISTORY_PAGES)
            .returning(|_| {
                Ok(RecentlyPlayedPage {
                    items: vec![recent_item("t1", 5)],
                    next: Some("https://api.spotify.com/v1/next-page".into()),
                })
            });

        let history = SpotifyHistory::new(Arc::new(api), fast_policy());
        let events = history.recent_plays(chrono::Duration::days(7)).await.unwrap();

        assert_eq!(events.len(), MAX_HISTORY_PAGES);
    }
}
