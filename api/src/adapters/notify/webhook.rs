//! Webhook notifier
//!
//! POSTs a JSON body per event to `NOTIFY_WEBHOOK_URL`. The receiver is
//! responsible for fanning out to members (email, chat, ...).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Serialize;

use crate::domain::entities::MemberId;
use crate::domain::ports::MembershipNotifier;
use crate::error::NotifyError;

/// Body sent to the webhook
#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    event: &'static str,
    target_id: &'a MemberId,
    affected_ids: &'a [MemberId],
    sent_at: DateTime<Utc>,
}

/// Notifier that forwards events over HTTP
pub struct WebhookNotifier {
    http: Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: String) -> Self {
        Self {
            http: Client::new(),
            url,
        }
    }

    async fn post(
        &self,
        event: &'static str,
        target_id: &MemberId,
        affected_ids: &[MemberId],
    ) -> Result<(), NotifyError> {
        let payload = WebhookPayload {
            event,
            target_id,
            affected_ids,
            sent_at: Utc::now(),
        };

        let resp = self.http.post(&self.url).json(&payload).send().await?;

        if resp.status().is_success() {
            Ok(())
        } else {
            let status = resp.status().as_u16();
            let message = resp.text().await.unwrap_or_default();
            Err(NotifyError::Rejected { status, message })
        }
    }
}

#[async_trait]
impl MembershipNotifier for WebhookNotifier {
    async fn notify_expired(
        &self,
        target_id: &MemberId,
        affected_ids: &[MemberId],
    ) -> Result<(), NotifyError> {
        self.post("member_expired", target_id, affected_ids).await
    }

    async fn notify_reverted(
        &self,
        target_id: &MemberId,
        affected_ids: &[MemberId],
    ) -> Result<(), NotifyError> {
        self.post("member_reverted", target_id, affected_ids).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn payload_serialization() {
        let target = MemberId(Uuid::nil());
        let affected = vec![MemberId(Uuid::nil())];
        let payload = WebhookPayload {
            event: "member_expired",
            target_id: &target,
            affected_ids: &affected,
            sent_at: Utc::now(),
        };

        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["event"], "member_expired");
        assert_eq!(json["target_id"], "00000000-0000-0000-0000-000000000000");
        assert_eq!(json["affected_ids"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unreachable_webhook_returns_request_error() {
        // Bind then release a port so nothing is listening on it
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let notifier = WebhookNotifier::new(format!("http://{}/hook", addr));
        let result = notifier.notify_expired(&MemberId::new(), &[]).await;
        assert!(matches!(result, Err(NotifyError::Request(_))));
    }

    #[tokio::test]
    async fn non_success_status_is_rejected() {
        use axum::{http::StatusCode, routing::post, Router};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = Router::new().route(
            "/hook",
            post(|| async { (StatusCode::SERVICE_UNAVAILABLE, "try later") }),
        );
        tokio::spawn(async move { axum::serve(listener, app).await });

        let notifier = WebhookNotifier::new(format!("http://{}/hook", addr));
        let result = notifier.notify_reverted(&MemberId::new(), &[]).await;
        assert!(matches!(
            result,
            Err(NotifyError::Rejected { status: 503, ref message }) if message == "try later"
        ));
    }
}
