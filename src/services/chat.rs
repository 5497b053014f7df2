use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;

/// Messaging backend for booking threads. Thread creation happens before the
/// booking row is written; system messages are posted after state changes
/// commit and are never part of a transaction.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    async fn create_thread(
        &self,
        booking_id: &str,
        client_id: &str,
        host_id: &str,
    ) -> anyhow::Result<String>;

    async fn post_system_message(&self, chat_id: &str, body: &str) -> anyhow::Result<()>;
}

pub struct HttpChatService {
    base_url: String,
    client: reqwest::Client,
}

impl HttpChatService {
    pub fn new(base_url: String) -> Self {
        Self {
            base_url,
            client: reqwest::Client::new(),
        }
    }
}

#[derive(Deserialize)]
struct CreateThreadResponse {
    thread_id: String,
}

#[async_trait]
impl ChatProvider for HttpChatService {
    async fn create_thread(
        &self,
        booking_id: &str,
        client_id: &str,
        host_id: &str,
    ) -> anyhow::Result<String> {
        let url = format!("{}/threads", self.base_url);

        let resp: CreateThreadResponse = self
            .client
            .post(&url)
            .json(&serde_json::json!({
                "booking_id": booking_id,
                "participants": [client_id, host_id],
            }))
            .send()
            .await
            .context("failed to reach chat service")?
            .error_for_status()
            .context("chat service returned error")?
            .json()
            .await
            .context("bad response from chat service")?;

        Ok(resp.thread_id)
    }

    async fn post_system_message(&self, chat_id: &str, body: &str) -> anyhow::Result<()> {
        let url = format!("{}/threads/{}/system-messages", self.base_url, chat_id);

        self.client
            .post(&url)
            .json(&serde_json::json!({ "body": body }))
            .send()
            .await
            .context("failed to reach chat service")?
            .error_for_status()
            .context("chat service returned error")?;

        Ok(())
    }
}

/// Stand-in for local development without a chat service. Threads get a
/// locally generated id and system messages only hit the logs.
pub struct NoopChat;

#[async_trait]
impl ChatProvider for NoopChat {
    async fn create_thread(
        &self,
        booking_id: &str,
        _client_id: &str,
        _host_id: &str,
    ) -> anyhow::Result<String> {
        let thread_id = format!("local-{}", uuid::Uuid::new_v4());
        tracing::debug!(booking_id = %booking_id, thread_id = %thread_id, "created local chat thread");
        Ok(thread_id)
    }

    async fn post_system_message(&self, chat_id: &str, body: &str) -> anyhow::Result<()> {
        tracing::debug!(chat_id = %chat_id, body = %body, "chat system message (noop)");
        Ok(())
    }
}
