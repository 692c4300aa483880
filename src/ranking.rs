use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::ports::history::PlayEvent;

/// How often one track was played within the window, with the metadata
/// needed downstream for the playlist and the email preview.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackRanking {
    pub track_id: String,
    pub track_name: String,
    pub artist_name: String,
    pub play_count: usize,
    pub first_played: DateTime<Utc>,
}

/// Rank tracks by play count, descending. Ties go to the track whose first
/// play is earliest; equal timestamps fall back to the track id so the
/// result is fully deterministic. Pure, no I/O.
pub fn rank_top_tracks(events: &[PlayEvent], top_n: usize) -> Vec<TrackRanking> {
    let mut by_track: HashMap<&str, TrackRanking> = HashMap::new();

    // Events arrive most recent first, so the first occurrence of a track
    // carries its freshest display metadata.
    for event in events {
        let entry = by_track
            .entry(&event.track_id)
            .or_insert_with(|| TrackRanking {
                track_id: event.track_id.clone(),
                track_name: event.track_name.clone(),
                artist_name: event.artist_name.clone(),
                play_count: 0,
                first_played: event.played_at,
            });
        entry.play_count += 1;
        if event.played_at < entry.first_played {
            entry.first_played = event.played_at;
        }
    }

    let mut ranking: Vec<TrackRanking> = by_track.into_values().collect();
    ranking.sort_by(|a, b| {
        b.play_count
            .cmp(&a.play_count)
            .then_with(|| a.first_played.cmp(&b.first_played))
            .then_with(|| a.track_id.cmp(&b.track_id))
    });
    ranking.truncate(top_n);
    ranking
}
