use std::time::Duration;

use chrono::{NaiveDate, Utc};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::config::MailConfig;
use crate::error::ApiError;
use crate::ports::mailer::{Reminder, ReminderMailer};
use crate::retry::{RetryPolicy, with_retries};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Reminder sender backed by a JSON mail API (bearer key, single send
/// endpoint returning a message id).
pub struct MailApiClient {
    http: reqwest::Client,
    config: MailConfig,
    retry: RetryPolicy,
}

#[derive(Debug, Serialize)]
struct OutboundEmail<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    text: &'a str,
    html: &'a str,
}

#[derive(Debug, Deserialize)]
struct SendReceipt {
    id: String,
}

impl MailApiClient {
    pub fn new(config: MailConfig, retry: RetryPolicy) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
            retry,
        }
    }

    async fn send(&self, email: &OutboundEmail<'_>) -> Result<SendReceipt, ApiError> {
        let response = self
            .http
            .post(self.config.api_url.clone())
            .bearer_auth(&self.config.api_key)
            .timeout(REQUEST_TIMEOUT)
            .json(email)
            .send()
            .await
            .map_err(ApiError::from)?;

        let status = response.status();
        if status.is_success() {
            return response.json::<SendReceipt>().await.map_err(|err| {
                ApiError::UnexpectedResponse(format!("failed to decode mail receipt: {err}"))
            });
        }

        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse::<u64>().ok())
            .map(Duration::from_secs);
        let body = response.text().await.unwrap_or_default();

        Err(match status {
            StatusCode::TOO_MANY_REQUESTS => ApiError::Transient {
                message: format!("mail service rate limited: {body}"),
                retry_after,
            },
            status if status.is_server_error() => {
                ApiError::transient(format!("mail service returned {status}: {body}"))
            }
            status => ApiError::InvalidRecipient(format!("mail service returned {status}: {body}")),
        })
    }
}

#[async_trait::async_trait]
impl ReminderMailer for MailApiClient {
    #[instrument(skip(self, reminder), fields(playlist = %reminder.playlist_name))]
    async fn send_reminder(&self, reminder: &Reminder) -> Result<String, ApiError> {
        let (subject, text) = compose_reminder(reminder, Utc::now().date_naive());
        let html = text.replace('\n', "<br>");

        let email = OutboundEmail {
            from: &self.config.sender,
            to: &self.config.recipient,
            subject: &subject,
            text: &text,
            html: &html,
        };

        let receipt = with_retries(&self.retry, "send reminder email", || self.send(&email)).await?;
        tracing::info!(message_id = %receipt.id, "reminder email sent");
        Ok(receipt.id)
    }
}

fn compose_reminder(reminder: &Reminder, today: NaiveDate) -> (String, String) {
    let subject = format!("Your weekly playlist is ready: {}", reminder.playlist_name);

    let mut body = format!(
        "Your weekly playlist \"{}\" has been updated!\n\n\
         Playlist details:\n\
         - {} tracks from your recent listening\n\
         - Updated on {}\n",
        reminder.playlist_name,
        reminder.track_count,
        today.format("%Y-%m-%d"),
    );

    if !reminder.preview.is_empty() {
        body.push_str("\nFeatured tracks:\n");
        for (index, line) in reminder.preview.iter().enumerate() {
            body.push_str(&format!("{}. {}\n", index + 1, line));
        }
    }

    body.push_str(&format!(
        "\nListen to your playlist here:\n{}\n\nEnjoy your music!\n\n--\nMoodify\n",
        reminder.playlist_url,
    ));

    (subject, body)
}
