//! Best-effort run notification
//!
//! A failed notification never changes the outcome of a run.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use std::time::Duration;

use crate::error::{PipelineError, PipelineResult};

const TELEGRAM_API: &str = "https://api.telegram.org";

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, total: usize, changed: bool) -> PipelineResult<()>;

    /// Fire and forget: failures are logged and dropped
    async fn notify(&self, total: usize, changed: bool) {
        if let Err(e) = self.send(total, changed).await {
            tracing::warn!("{}", e);
        }
    }
}

/// Human readable run report
pub fn format_message(total: usize, changed: bool, at: DateTime<Utc>) -> String {
    let status = if changed { "Updated" } else { "No Change" };
    format!(
        "📡 IPTV Auto Update\nStatus: {}\nTotal Channels: {}\nUTC Time: {}",
        status,
        total,
        at.format("%Y-%m-%d %H:%M:%S")
    )
}

/// Sends the report through a Telegram bot
pub struct TelegramNotifier {
    client: Client,
    api_base: String,
    token: Option<String>,
    chat_id: Option<String>,
}

impl TelegramNotifier {
    pub fn new(
        token: Option<String>,
        chat_id: Option<String>,
        timeout_ms: u64,
    ) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .build()?;

        Ok(Self {
            client,
            api_base: TELEGRAM_API.to_string(),
            token,
            chat_id,
        })
    }

    #[cfg(test)]
    fn with_api_base(mut self, api_base: &str) -> Self {
        self.api_base = api_base.trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, total: usize, changed: bool) -> PipelineResult<()> {
        let (Some(token), Some(chat_id)) = (&self.token, &self.chat_id) else {
            tracing::info!("Telegram credentials missing, skipping notification");
            return Ok(());
        };

        let url = format!("{}/bot{}/sendMessage", self.api_base, token);
        let text = format_message(total, changed, Utc::now());

        let response = self
            .client
            .post(&url)
            .form(&[("chat_id", chat_id.as_str()), ("text", text.as_str())])
            .send()
            .await
            .map_err(|e| PipelineError::Notifier(e.without_url().to_string()))?;

        let status = response.status();
        tracing::info!("Telegram status code: {}", status.as_u16());

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PipelineError::Notifier(format!(
                "HTTP {}: {}",
                status.as_u16(),
                body
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_format_message() {
        let at = Utc.with_ymd_and_hms(2026, 3, 4, 5, 6, 7).unwrap();
        assert_eq!(
            format_message(42, true, at),
            "📡 IPTV Auto Update\nStatus: Updated\nTotal Channels: 42\nUTC Time: 2026-03-04 05:06:07"
        );
        assert!(format_message(0, false, at).contains("Status: No Change"));
    }

    #[tokio::test]
    async fn test_missing_credentials_is_noop() {
        let notifier = TelegramNotifier::new(None, Some("1".into()), 1_000).unwrap();
        assert!(notifier.send(3, true).await.is_ok());
    }

    #[tokio::test]
    async fn test_posts_form_to_bot_endpoint() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/botTOKEN/sendMessage"))
            .and(body_string_contains("chat_id=99"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{\"ok\":true}"))
            .expect(1)
            .mount(&server)
            .await;

        let notifier = TelegramNotifier::new(Some("TOKEN".into()), Some("99".into()), 1_000)
            .unwrap()
            .with_api_base(&server.uri());
        notifier.send(7, false).await.unwrap();
    }

    #[tokio::test]
    async fn test_failure_is_swallowed_by_notify() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let notifier = TelegramNotifier::new(Some("T".into()), Some("1".into()), 1_000)
            .unwrap()
            .with_api_base(&server.uri());

        assert!(matches!(
            notifier.send(1, true).await,
            Err(PipelineError::Notifier(_))
        ));
        // Returns unit, never panics or propagates
        notifier.notify(1, true).await;
    }
}
