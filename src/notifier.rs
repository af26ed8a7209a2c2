use crate::ledger::RunSummary;
use anyhow::{Context, Result, bail};
use std::time::Duration;

/// Receives the end-of-run summary. Delivery is best-effort; a failure is
/// logged by the caller and never changes the batch outcome.
pub trait Notifier: Send + Sync {
    fn notify(&self, summary: &RunSummary) -> Result<()>;
}

pub struct WebhookNotifier {
    url: String,
    client: reqwest::blocking::Client,
}

impl WebhookNotifier {
    pub fn new(url: String) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context("build webhook client")?;
        Ok(Self { url, client })
    }
}

impl Notifier for WebhookNotifier {
    fn notify(&self, summary: &RunSummary) -> Result<()> {
        let response = self
            .client
            .post(&self.url)
            .json(summary)
            .send()
            .with_context(|| format!("post summary to {}", self.url))?;
        if !response.status().is_success() {
            bail!("webhook {} returned {}", self.url, response.status());
        }
        Ok(())
    }
}

/// Used when no webhook endpoint is configured.
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn notify(&self, _summary: &RunSummary) -> Result<()> {
        tracing::debug!("no webhook configured; summary not delivered");
        Ok(())
    }
}
