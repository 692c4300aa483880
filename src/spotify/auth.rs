use std::collections::HashMap;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::StatusCode;

use crate::config::SpotifyCredentials;
use crate::error::ApiError;
use crate::spotify::types::TokenResponse;

const SPOTIFY_TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
const TOKEN_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Exchange the long-lived refresh token for an access token.
/// https://developer.spotify.com/documentation/web-api/tutorials/refreshing-tokens
pub async fn refresh_access_token(
    client: &reqwest::Client,
    credentials: &SpotifyCredentials,
) -> Result<TokenResponse, ApiError> {
    let mut params = HashMap::new();
    params.insert("grant_type", "refresh_token");
    params.insert("refresh_token", credentials.refresh_token.as_str());

    let response = client
        .post(SPOTIFY_TOKEN_URL)
        // This automatically serializes to x-www-form-urlencoded and sets the header (as required by spotify)
        .form(&params)
        .header("Authorization", basic_auth_header(credentials))
        .timeout(TOKEN_REQUEST_TIMEOUT)
        .send()
        .await
        .map_err(ApiError::from)?;

    let status = response.status();
    if status.is_success() {
        return response.json::<TokenResponse>().await.map_err(|err| {
            ApiError::UnexpectedResponse(format!("failed to decode token response: {err}"))
        });
    }

    let body = response.text().await.unwrap_or_default();
    Err(match status {
        StatusCode::TOO_MANY_REQUESTS => ApiError::transient(format!("token endpoint: {body}")),
        status if status.is_server_error() => {
            ApiError::transient(format!("token endpoint returned {status}: {body}"))
        }
        // 400 covers a revoked or malformed refresh token.
        _ => ApiError::Auth(format!("token refresh rejected ({status}): {body}")),
    })
}

fn basic_auth_header(credentials: &SpotifyCredentials) -> String {
    format!(
        "Basic {}",
        STANDARD.encode(format!(
            "{}:{}",
            credentials.client_id, credentials.client_secret
        ))
    )
}
