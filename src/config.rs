use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use url::Url;

use crate::error::ConfigError;

/// Spotify OAuth client credentials plus the long-lived refresh token.
#[derive(Debug, Clone)]
pub struct SpotifyCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
}

#[derive(Debug, Clone)]
pub struct MailConfig {
    pub api_url: Url,
    pub api_key: String,
    pub sender: String,
    pub recipient: String,
}

/// Everything one invocation needs, resolved once at startup and passed by
/// reference from then on.
#[derive(Debug, Clone)]
pub struct Config {
    pub spotify: SpotifyCredentials,
    pub mail: MailConfig,
    pub playlist_name: String,
    pub top_tracks: usize,
    pub lookback: chrono::Duration,
    pub public_playlist: bool,
    pub data_dir: PathBuf,
    pub deadline: Duration,
}

pub const DEFAULT_PLAYLIST_NAME: &str = "Moodify — Weekly Gems";
pub const DEFAULT_TOP_TRACKS: usize = 10;
pub const DEFAULT_LOOKBACK_DAYS: i64 = 7;
pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(120);

/// Optional TOML override file. Environment variables win over the file.
#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    #[serde(default)]
    spotify: FileSpotify,
    #[serde(default)]
    mail: FileMail,
    #[serde(default)]
    playlist: FilePlaylist,
    data_dir: Option<String>,
    deadline: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct FileSpotify {
    client_id: Option<String>,
    client_secret: Option<String>,
    refresh_token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct FileMail {
    api_url: Option<String>,
    api_key: Option<String>,
    sender: Option<String>,
    recipient: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct FilePlaylist {
    name: Option<String>,
    tracks: Option<usize>,
    lookback: Option<String>,
    public: Option<bool>,
}

impl Config {
    /// Load from the given file (or the default location when present),
    /// overlay environment variables, then validate.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let file = match path {
            Some(path) => Some(FileConfig::from_file(path)?),
            None => match Self::config_path() {
                Some(path) if path.is_file() => Some(FileConfig::from_file(&path)?),
                _ => None,
            },
        };

        Self::from_sources(file.unwrap_or_default(), &|key| std::env::var(key).ok())
    }

    /// Default config file path (similar to beets).
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|path| path.join("moodify").join("config.toml"))
    }

    fn from_sources(
        file: FileConfig,
        env: &dyn Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let spotify = SpotifyCredentials {
            client_id: required("SPOTIFY_CLIENT_ID", env, file.spotify.client_id)?,
            client_secret: required("SPOTIFY_CLIENT_SECRET", env, file.spotify.client_secret)?,
            refresh_token: required("SPOTIFY_REFRESH_TOKEN", env, file.spotify.refresh_token)?,
        };

        let api_url = required("MAIL_API_URL", env, file.mail.api_url)?;
        let api_url = Url::parse(&api_url).map_err(|err| ConfigError::Invalid {
            name: "MAIL_API_URL",
            reason: err.to_string(),
        })?;

        let mail = MailConfig {
            api_url,
            api_key: required("MAIL_API_KEY", env, file.mail.api_key)?,
            sender: required("SENDER_EMAIL", env, file.mail.sender)?,
            recipient: required("RECIPIENT_EMAIL", env, file.mail.recipient)?,
        };

        let playlist_name = optional("MOODIFY_PLAYLIST_NAME", env, file.playlist.name)
            .unwrap_or_else(|| DEFAULT_PLAYLIST_NAME.to_string());

        let top_tracks = match optional("MOODIFY_TOP_TRACKS", env, None) {
            Some(raw) => raw.parse().map_err(|_| ConfigError::Invalid {
                name: "MOODIFY_TOP_TRACKS",
                reason: format!("`{raw}` is not a number"),
            })?,
            None => file.playlist.tracks.unwrap_or(DEFAULT_TOP_TRACKS),
        };

        let lookback = match optional("MOODIFY_LOOKBACK", env, file.playlist.lookback) {
            Some(raw) => parse_window("MOODIFY_LOOKBACK", &raw)?,
            None => chrono::Duration::days(DEFAULT_LOOKBACK_DAYS),
        };

        let public_playlist = match optional("MOODIFY_PUBLIC", env, None) {
            Some(raw) => raw == "1" || raw.eq_ignore_ascii_case("true"),
            None => file.playlist.public.unwrap_or(false),
        };

        let data_dir = optional("MOODIFY_DATA_DIR", env, file.data_dir)
            .map(PathBuf::from)
            .or_else(|| dirs::data_dir().map(|dir| dir.join("moodify")))
            .ok_or(ConfigError::Missing("MOODIFY_DATA_DIR"))?;

        let deadline = match optional("MOODIFY_DEADLINE", env, file.deadline) {
            Some(raw) => humantime::parse_duration(&raw).map_err(|err| ConfigError::Invalid {
                name: "MOODIFY_DEADLINE",
                reason: err.to_string(),
            })?,
            None => DEFAULT_DEADLINE,
        };

        Ok(Config {
            spotify,
            mail,
            playlist_name,
            top_tracks,
            lookback,
            public_playlist,
            data_dir,
            deadline,
        })
    }
}

impl FileConfig {
    fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }
}

/// A required value must be present and non-empty in the environment or the
/// override file.
fn required(
    key: &'static str,
    env: &dyn Fn(&str) -> Option<String>,
    file_value: Option<String>,
) -> Result<String, ConfigError> {
    optional(key, env, file_value).ok_or(ConfigError::Missing(key))
}

fn optional(
    key: &str,
    env: &dyn Fn(&str) -> Option<String>,
    file_value: Option<String>,
) -> Option<String> {
    env(key)
        .filter(|value| !value.trim().is_empty())
        .or(file_value.filter(|value| !value.trim().is_empty()))
}

fn parse_window(name: &'static str, raw: &str) -> Result<chrono::Duration, ConfigError> {
    let std_duration = humantime::parse_duration(raw).map_err(|err| ConfigError::Invalid {
        name,
        reason: err.to_string(),
    })?;
    chrono::Duration::from_std(std_duration).map_err(|err| ConfigError::Invalid {
        name,
        reason: err.to_string(),
    })
}
