//! Delivery of a custom resource's terminal status to the orchestrator.

use async_trait::async_trait;

use architect_types::{CallbackResponse, Completion, InvocationContext, LifecycleEvent};

// ---------------------------------------------------------------------------
// ResponseReporter trait
// ---------------------------------------------------------------------------

#[async_trait]
pub trait ResponseReporter: Send + Sync {
    /// Deliver `completion` for `event`. Delivery faults are logged, never returned.
    async fn complete(&self, event: &LifecycleEvent, ctx: &InvocationContext, completion: Completion);
}

/// Build the fixed-shape callback body for `event`.
pub fn callback_response(
    event: &LifecycleEvent,
    ctx: &InvocationContext,
    completion: Completion,
) -> CallbackResponse {
    let log_hint = format!(
        "See the details in CloudWatch Log Stream: {}",
        ctx.log_stream_name
    );
    let reason = match completion.reason {
        Some(reason) => format!("{reason}. {log_hint}"),
        None => log_hint,
    };

    CallbackResponse {
        status: completion.status,
        reason,
        physical_resource_id: completion
            .physical_resource_id
            .unwrap_or_else(|| ctx.log_stream_name.clone()),
        stack_id: event.stack_id.clone(),
        request_id: event.request_id.clone(),
        logical_resource_id: event.logical_resource_id.clone(),
        no_echo: false,
        data: completion.data,
    }
}

// ---------------------------------------------------------------------------
// HttpReporter
// ---------------------------------------------------------------------------

/// PUTs the callback body to the event's pre-signed response URL.
#[derive(Debug, Clone, Default)]
pub struct HttpReporter {
    client: reqwest::Client,
}

impl HttpReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ResponseReporter for HttpReporter {
    async fn complete(&self, event: &LifecycleEvent, ctx: &InvocationContext, completion: Completion) {
        let response = callback_response(event, ctx, completion);
        let body = match serde_json::to_string(&response) {
            Ok(body) => body,
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize callback body");
                return;
            }
        };
        tracing::info!(body = %body, "Custom resource result");

        // Pre-signed URLs are signed without a content type.
        let result = self
            .client
            .put(&event.response_url)
            .header(reqwest::header::CONTENT_TYPE, "")
            .body(body)
            .send()
            .await;

        match result {
            Ok(resp) if resp.status().is_success() => {
                tracing::info!(status = resp.status().as_u16(), "Callback delivered");
            }
            Ok(resp) => {
                tracing::warn!(
                    status = resp.status().as_u16(),
                    url = %event.response_url,
                    "Callback rejected"
                );
            }
            Err(e) => {
                tracing::error!(error = %e, url = %event.response_url, "Callback delivery failed");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
