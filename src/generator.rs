use std::time::Duration;

use chrono::Utc;
use serde::Serialize;

use crate::error::ApiError;
use crate::ports::history::PlayHistory;
use crate::ports::mailer::{Reminder, ReminderMailer};
use crate::ports::playlist::{PlaylistSpec, PlaylistStore};
use crate::ranking::{TrackRanking, rank_top_tracks};
use crate::tracker::{RunRecord, RunTracker};

const EMAIL_PREVIEW_TRACKS: usize = 5;

/// Steps of one invocation. Every run walks these in order; `Failed` is
/// terminal and reachable from any of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idle,
    FetchingHistory,
    Ranking,
    Publishing,
    Notifying,
    Done,
    Failed,
}

impl Stage {
    /// Component name reported when a run fails in this stage.
    pub fn component(self) -> &'static str {
        match self {
            Stage::FetchingHistory => "HistoryClient",
            Stage::Ranking => "RankingFunction",
            Stage::Publishing => "PlaylistPublisher",
            Stage::Notifying => "NotificationSender",
            Stage::Idle | Stage::Done | Stage::Failed => "Orchestrator",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Success,
    Failure,
}

#[derive(Debug, Clone, Serialize)]
pub struct FailureReport {
    pub component: String,
    pub kind: String,
    pub message: String,
}

/// The structured result handed back to the invoking scheduler.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub status: RunStatus,
    pub detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub playlist_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureReport>,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Success
    }

    fn success(detail: impl Into<String>, playlist_url: Option<String>) -> Self {
        Self {
            status: RunStatus::Success,
            detail: detail.into(),
            playlist_url,
            failure: None,
        }
    }

    fn failure(stage: Stage, err: &ApiError) -> Self {
        tracing::error!(%err, stage = ?stage, "run failed");
        Self {
            status: RunStatus::Failure,
            detail: format!("{} failed: {err}", stage.component()),
            playlist_url: None,
            failure: Some(FailureReport {
                component: stage.component().to_string(),
                kind: err.kind().to_string(),
                message: err.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GeneratorOptions {
    pub playlist_name: String,
    pub top_tracks: usize,
    pub lookback: chrono::Duration,
    pub deadline: Duration,
    pub dry_run: bool,
}

/// Sequences the pipeline: fetch history, rank, publish, record, notify.
///
/// Holds no business logic of its own beyond sequencing, error translation
/// and the final status report; the components behind the ports own their
/// retry behavior.
pub struct Generator<H, P, M> {
    history: H,
    playlists: P,
    mailer: M,
    tracker: RunTracker,
    opts: GeneratorOptions,
}

impl<H, P, M> Generator<H, P, M>
where
    H: PlayHistory,
    P: PlaylistStore,
    M: ReminderMailer,
{
    pub fn new(
        history: H,
        playlists: P,
        mailer: M,
        tracker: RunTracker,
        opts: GeneratorOptions,
    ) -> Self {
        Self {
            history,
            playlists,
            mailer,
            tracker,
            opts,
        }
    }

    /// Run the whole pipeline under the configured deadline.
    ///
    /// Hitting the deadline can leave partial remote state behind (playlist
    /// updated, email unsent); that is accepted and logged, never hidden.
    pub async fn run(&self) -> RunReport {
        self.transition(Stage::Idle);
        match tokio::time::timeout(self.opts.deadline, self.run_inner()).await {
            Ok(report) => report,
            Err(_) => {
                let err = ApiError::Timeout(self.opts.deadline);
                tracing::error!(
                    "run exceeded its deadline; remote state may be partially updated"
                );
                RunReport::failure(Stage::Failed, &err)
            }
        }
    }

    async fn run_inner(&self) -> RunReport {
        let window_start = Utc::now() - self.opts.lookback;

        self.transition(Stage::FetchingHistory);
        let events = match self.history.recent_plays(self.opts.lookback).await {
            Ok(events) => events,
            Err(err) => return RunReport::failure(Stage::FetchingHistory, &err),
        };

        self.transition(Stage::Ranking);
        let ranking = rank_top_tracks(&events, self.opts.top_tracks);
        if ranking.is_empty() {
            // No plays, no playlist mutation, no email.
            tracing::info!("no play events within the lookback window");
            return RunReport::success(
                "no plays within the lookback window; nothing to publish",
                None,
            );
        }
        let spec = self.build_spec(&ranking);

        if self.opts.dry_run {
            for (index, track) in ranking.iter().enumerate() {
                tracing::info!(
                    "{:>2}. {} - {} ({} plays)",
                    index + 1,
                    track.track_name,
                    track.artist_name,
                    track.play_count
                );
            }
            return RunReport::success(
                format!(
                    "dry run: would publish {} tracks to \"{}\"",
                    spec.track_ids.len(),
                    spec.name
                ),
                None,
            );
        }

        if let Some(previous) = self.unchanged_since_last_run(&spec) {
            tracing::info!(playlist_id = %previous.playlist_id, "playlist unchanged since last run");
            return RunReport::success(
                "playlist unchanged since last run; nothing republished",
                Some(previous.url),
            );
        }

        self.transition(Stage::Publishing);
        let published = match self.playlists.publish(&spec).await {
            Ok(published) => published,
            Err(err) => return RunReport::failure(Stage::Publishing, &err),
        };

        let record = RunRecord {
            playlist_id: published.id.clone(),
            url: published.url.clone(),
            name: spec.name.clone(),
            published_at: Utc::now(),
            window_start,
            track_ids: spec.track_ids.clone(),
        };
        if let Err(err) = self.tracker.record(record) {
            tracing::warn!(%err, "failed to record run in the local history file");
        }

        self.transition(Stage::Notifying);
        let reminder = Reminder {
            playlist_name: spec.name.clone(),
            playlist_url: published.url.clone(),
            track_count: spec.track_ids.len(),
            preview: ranking
                .iter()
                .take(EMAIL_PREVIEW_TRACKS)
                .map(|track| format!("{} - {}", track.track_name, track.artist_name))
                .collect(),
        };
        if let Err(err) = self.mailer.send_reminder(&reminder).await {
            return RunReport::failure(Stage::Notifying, &err);
        }

        self.transition(Stage::Done);
        RunReport::success(
            format!(
                "published {} tracks to \"{}\"",
                spec.track_ids.len(),
                spec.name
            ),
            Some(published.url),
        )
    }

    fn build_spec(&self, ranking: &[TrackRanking]) -> PlaylistSpec {
        PlaylistSpec {
            name: self.opts.playlist_name.clone(),
            description: format!(
                "Top tracks from your recent listening. Updated {}.",
                Utc::now().format("%Y-%m-%d")
            ),
            track_ids: ranking.iter().map(|track| track.track_id.clone()).collect(),
        }
    }

    fn unchanged_since_last_run(&self, spec: &PlaylistSpec) -> Option<RunRecord> {
        let last = self.tracker.last_run()?;
        (last.name == spec.name && last.track_ids == spec.track_ids).then_some(last)
    }

    fn transition(&self, stage: Stage) {
        tracing::info!(stage = ?stage, "stage transition");
    }
}
