//! Macro dispatcher: the single entry point for transform requests and
//! callout lifecycle events.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use architect_acm::DynCertificateApi;
use architect_types::{
    Completion, InvocationContext, LifecycleEvent, MacroError, PropertyMap, Resource, Result,
    TemplateFragment, TransformRequest, TransformResponse,
};

use crate::config::MacroConfig;
use crate::functions::{HandlerEnv, HandlerRequest, MacroFunction};
use crate::reporter::ResponseReporter;

/// What the dispatcher hands back to the platform.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum MacroResponse {
    Transform(TransformResponse),
    /// Lifecycle events answer through the callback URL; the direct result is `{}`.
    Lifecycle(PropertyMap),
}

impl MacroResponse {
    fn empty() -> Self {
        MacroResponse::Lifecycle(PropertyMap::new())
    }
}

pub struct MacroDispatcher {
    config: MacroConfig,
    api: DynCertificateApi,
    reporter: Arc<dyn ResponseReporter>,
}

impl MacroDispatcher {
    pub fn new(
        config: MacroConfig,
        api: DynCertificateApi,
        reporter: impl ResponseReporter + 'static,
    ) -> Self {
        Self {
            config,
            api,
            reporter: Arc::new(reporter),
        }
    }

    pub fn config(&self) -> &MacroConfig {
        &self.config
    }

    /// Route a raw event: anything carrying a `fragment` is a transform
    /// request, everything else a lifecycle event.
    pub async fn dispatch(&self, event: Value, ctx: &InvocationContext) -> MacroResponse {
        if event.get("fragment").is_some() {
            let request_id = event
                .get("requestId")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            return match serde_json::from_value::<TransformRequest>(event) {
                Ok(request) => MacroResponse::Transform(self.transform(request)),
                Err(e) => {
                    tracing::error!(error = %e, "Malformed transform request");
                    MacroResponse::Transform(TransformResponse::failure(request_id))
                }
            };
        }

        match LifecycleEvent::deserialize(&event) {
            Ok(decoded) => self.execute(&decoded, ctx).await,
            Err(e) => self.reject(&event, MacroError::InvalidEvent(e.to_string()), ctx).await,
        }
        MacroResponse::empty()
    }

    /// Answer an undecodable lifecycle event with FAILED when its envelope
    /// still names a callback URL.
    async fn reject(&self, raw: &Value, error: MacroError, ctx: &InvocationContext) {
        let Some(envelope) = LifecycleEvent::envelope(raw) else {
            tracing::error!(error = %error, "Malformed lifecycle event, no callback possible");
            return;
        };
        tracing::error!(
            error = %error,
            resource = %envelope.logical_resource_id,
            "Malformed lifecycle event"
        );

        let mut completion = Completion::failed(
            "Invalid lifecycle event",
            Some(json!({ "error": error.to_string() })),
        );
        completion.physical_resource_id = envelope.physical_resource_id.clone();
        self.reporter.complete(&envelope, ctx, completion).await;
    }

    /// Rewrite every pseudo-resource in the fragment.
    pub fn transform(&self, request: TransformRequest) -> TransformResponse {
        transform(&self.config, request)
    }

    /// Run the handler for one lifecycle event and report its outcome exactly once.
    pub async fn execute(&self, event: &LifecycleEvent, ctx: &InvocationContext) {
        let function_name = event.resource_properties.function.as_str();
        tracing::info!(
            function = %function_name,
            request_type = ?event.request_type,
            resource = %event.logical_resource_id,
            "Handling lifecycle event"
        );

        let completion = match function_name.parse::<MacroFunction>() {
            Ok(function) => {
                let request = HandlerRequest {
                    request_type: event.request_type,
                    properties: &event.resource_properties.properties,
                    previous: event.previous_properties(),
                };
                let env = HandlerEnv {
                    api: self.api.as_api(),
                    poll: &self.config.poll,
                    ctx,
                };
                function.implementation().handle(&request, &env).await
            }
            Err(e) => {
                tracing::warn!(error = %e, "No handler for lifecycle event");
                Completion::failed(
                    "Handler does not exist for function",
                    Some(json!({ "function": function_name })),
                )
            }
        };

        tracing::info!(
            resource = %event.logical_resource_id,
            status = ?completion.status,
            "Lifecycle event resolved"
        );
        self.reporter.complete(event, ctx, completion).await;
    }
}

/// Rewrite every pseudo-resource in the request's fragment. Any unknown
/// function fails the whole transform.
pub fn transform(config: &MacroConfig, request: TransformRequest) -> TransformResponse {
    let TransformRequest {
        mut fragment,
        request_id,
        region,
        account_id,
    } = request;

    match rewrite_fragment(config, &mut fragment, &region, &account_id) {
        Ok(rewritten) => {
            tracing::info!(request_id = %request_id, rewritten, "Macro transform succeeded");
            TransformResponse::success(request_id, fragment)
        }
        Err(e) => {
            tracing::error!(request_id = %request_id, error = %e, "Macro transform failed");
            TransformResponse::failure(request_id)
        }
    }
}

fn rewrite_fragment(
    config: &MacroConfig,
    fragment: &mut TemplateFragment,
    region: &str,
    account_id: &str,
) -> Result<usize> {
    let Some(resources) = fragment.resources.as_mut() else {
        return Ok(0);
    };
    let prefix = config.custom_type_prefix.as_str();
    let names: Vec<String> = resources.keys().cloned().collect();
    let mut rewritten = 0;

    for name in names {
        // Earlier rewrites may already have replaced this entry.
        let Some(declaration) = resources.get(&name) else {
            continue;
        };
        let Some(function_name) = declaration.resource_type.strip_prefix(prefix) else {
            continue;
        };

        let function: MacroFunction = function_name.parse()?;
        let callout = callout_resource(config, function, region, account_id, declaration);
        tracing::debug!(resource = %name, function = %function, "Rewriting pseudo-resource");

        function.implementation().rewrite(resources, &callout, &name);
        rewritten += 1;
    }

    Ok(rewritten)
}

/// Synthesize the callout resource that calls back into the macro function.
pub fn callout_resource(
    config: &MacroConfig,
    function: MacroFunction,
    region: &str,
    account_id: &str,
    declaration: &Resource,
) -> Resource {
    let mut callout = Resource::new(&config.callout_type);
    callout.condition = declaration.condition.clone();

    let properties = callout.properties_mut();
    properties.insert(
        "ServiceToken".into(),
        Value::String(config.service_token(region, account_id)),
    );
    properties.insert("Function".into(), Value::String(function.name().to_string()));
    properties.insert(
        "Properties".into(),
        Value::Object(declaration.properties.clone().unwrap_or_default()),
    );
    callout
}
