//! Webhook delivery of run outcomes.

use std::time::Duration;

use {
    serde::Serialize,
    tracing::{debug, warn},
};

use crate::{
    error::{Error, Result},
    ssrf::validate_webhook_url,
    types::{CronJob, CronRunOutcome, RunStatus},
};

/// Hard ceiling on a delivery attempt.
const WEBHOOK_TIMEOUT_MS: u64 = 10_000;

/// Outcome of one delivery attempt. Failures never escalate past here; the
/// dispatcher decides whether they taint the run outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookDelivery {
    pub delivered: bool,
    pub error: Option<String>,
}

impl WebhookDelivery {
    fn failed(error: impl Into<String>) -> Self {
        Self {
            delivered: false,
            error: Some(error.into()),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WebhookBody<'a> {
    job_id: &'a str,
    name: &'a str,
    status: RunStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    session_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    session_key: Option<&'a str>,
}

pub struct WebhookDeliverer {
    client: reqwest::Client,
    token: Option<String>,
}

impl WebhookDeliverer {
    /// `token`, when non-empty, is sent as a bearer `authorization` header.
    pub fn new(token: Option<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(Duration::from_millis(WEBHOOK_TIMEOUT_MS))
            .build()
            .map_err(|e| Error::external("failed to build webhook http client", e))?;
        Ok(Self {
            client,
            token: token.filter(|t| !t.is_empty()),
        })
    }

    /// POST the outcome to `url`. Never panics, never hangs past the
    /// timeout; every failure folds into the returned struct.
    pub async fn deliver(
        &self,
        url: &str,
        job: &CronJob,
        outcome: &CronRunOutcome,
    ) -> WebhookDelivery {
        let url = match validate_webhook_url(url).await {
            Ok(url) => url,
            Err(violation) => {
                warn!(job_id = %job.id, reason = violation.reason_code, "webhook target rejected");
                return if violation.reason_code == "webhook_url_invalid"
                    || violation.reason_code == "webhook_blocked_scheme"
                {
                    WebhookDelivery::failed("invalid webhook url")
                } else {
                    WebhookDelivery::failed(violation.detail)
                };
            }
        };

        let body = WebhookBody {
            job_id: &job.id,
            name: &job.name,
            status: outcome.status,
            summary: outcome.summary.as_deref(),
            error: outcome.error.as_deref(),
            session_id: outcome.session_id.as_deref(),
            session_key: outcome.session_key.as_deref(),
        };

        let mut request = self.client.post(url).json(&body);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        match request.send().await {
            Ok(response) if response.status().is_success() => {
                debug!(job_id = %job.id, "webhook delivered");
                WebhookDelivery {
                    delivered: true,
                    error: None,
                }
            }
            Ok(response) => {
                WebhookDelivery::failed(format!("webhook failed: {}", response.status().as_u16()))
            }
            Err(e) => WebhookDelivery::failed(e.to_string()),
        }
    }
}
