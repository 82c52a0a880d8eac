//! API runner: HTTP GET with bounded retries and an off-reactor parser.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{AUTHORIZATION, USER_AGENT};
use reqwest::Client;
use tokio::time::sleep;
use tracing::debug;

use super::{collect_valid, supervise, UnitContext, UnitOutcome};
use crate::domain::NormalizedDomain;
use crate::error::SourceError;
use crate::plugins::{ApiPlugin, Credential, Payload};
use crate::retry::RetryPolicy;

/// Query an API plugin for `ctx.domain`.
///
/// `policy` is the scan-wide budget; a plugin's own `max_attempts` wins.
pub async fn invoke(
    client: &Client,
    plugin: &ApiPlugin,
    ctx: &UnitContext<'_>,
    policy: RetryPolicy,
    user_agent: &str,
) -> UnitOutcome {
    let policy = plugin
        .max_attempts
        .map_or(policy, |attempts| policy.with_max_attempts(attempts));

    supervise(ctx, async {
        let request = Request {
            client,
            plugin,
            url: plugin.build_url(ctx.domain.as_str()),
            domain: ctx.domain.as_str(),
            timeout: ctx.timeout,
            user_agent,
        };
        match request.with_retries(policy).await {
            Ok(found) => UnitOutcome::Success(found),
            Err(err) => UnitOutcome::from_error(&plugin.name, err),
        }
    })
    .await
}

struct Request<'a> {
    client: &'a Client,
    plugin: &'a ApiPlugin,
    url: String,
    domain: &'a str,
    timeout: Duration,
    user_agent: &'a str,
}

impl Request<'_> {
    async fn with_retries(
        &self,
        policy: RetryPolicy,
    ) -> Result<BTreeSet<NormalizedDomain>, SourceError> {
        let mut attempt = 0u32;
        loop {
            match self.attempt().await {
                Ok(found) => return Ok(found),
                Err(err) if err.is_retryable() && !policy.is_last(attempt) => {
                    let delay = policy.delay_for(attempt);
                    debug!(
                        source = %self.plugin.name,
                        attempt = attempt + 1,
                        max_attempts = policy.max_attempts(),
                        delay_ms = delay.as_millis() as u64,
                        "Request failed, retrying: {}",
                        err
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn attempt(&self) -> Result<BTreeSet<NormalizedDomain>, SourceError> {
        let mut request = self
            .client
            .get(&self.url)
            .timeout(self.timeout)
            .header(USER_AGENT, self.user_agent);
        if let Some(value) = self
            .plugin
            .credential
            .as_ref()
            .and_then(Credential::header_value)
        {
            request = request.header(AUTHORIZATION, value);
        }

        let response = request.send().await?.error_for_status()?;
        let payload = if self.plugin.is_json {
            let body = response.bytes().await?;
            let value = serde_json::from_slice(&body).map_err(|err| {
                SourceError::PluginContractViolation(format!("response is not valid json: {}", err))
            })?;
            Payload::Json(value)
        } else {
            Payload::Text(response.text().await?)
        };

        let parser = Arc::clone(&self.plugin.parser);
        let domain = self.domain.to_string();
        let candidates = tokio::task::spawn_blocking(move || parser.parse(&domain, &payload))
            .await
            .map_err(|err| {
                SourceError::PluginContractViolation(format!("parser did not complete: {}", err))
            })??;

        Ok(collect_valid(&self.plugin.name, candidates))
    }
}
