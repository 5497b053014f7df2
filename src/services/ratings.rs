use anyhow::Context;
use async_trait::async_trait;

/// Downstream aggregate-rating service. Recomputes are fired after reviews
/// publish; a failure never rolls back the publish.
#[async_trait]
pub trait RatingsProvider: Send + Sync {
    async fn recompute(&self, target_id: &str) -> anyhow::Result<()>;
}

pub struct HttpRatingsService {
    base_url: String,
    client: reqwest::Client,
}

impl HttpRatingsService {
    pub fn new(base_url: String) -> Self {
        Self {
            base_url,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl RatingsProvider for HttpRatingsService {
    async fn recompute(&self, target_id: &str) -> anyhow::Result<()> {
        let url = format!("{}/ratings/{}/recompute", self.base_url, target_id);

        self.client
            .post(&url)
            .send()
            .await
            .context("failed to reach ratings service")?
            .error_for_status()
            .context("ratings service returned error")?;

        Ok(())
    }
}

pub struct NoopRatings;

#[async_trait]
impl RatingsProvider for NoopRatings {
    async fn recompute(&self, target_id: &str) -> anyhow::Result<()> {
        tracing::debug!(target_id = %target_id, "ratings recompute (noop)");
        Ok(())
    }
}
