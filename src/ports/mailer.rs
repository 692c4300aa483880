use crate::error::ApiError;

/// Everything the reminder email template needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reminder {
    pub playlist_name: String,
    pub playlist_url: String,
    pub track_count: usize,
    /// Display lines for the first few tracks, already formatted.
    pub preview: Vec<String>,
}

/// Port trait wrapping the mail service.
///
/// Implementations live in `mailer` (production) or test mocks. The caller
/// is responsible for invoking this at most once per run.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait ReminderMailer: Send + Sync {
    /// Send the reminder and return the provider's message id.
    async fn send_reminder(&self, reminder: &Reminder) -> Result<String, ApiError>;
}
