//! Shared types for the AWS Architect CloudFormation macro.
//!
//! This crate provides the vocabulary used by every other crate in the workspace:
//! - `MacroError`: unified error taxonomy
//! - `Resource` / `ResourceGraph` / `TemplateFragment`: the template data model
//! - `TransformRequest` / `TransformResponse`: the macro transform contract
//! - `LifecycleEvent` / `CallbackResponse`: the custom-resource protocol
//! - `Completion` / `InvocationContext`: handler outcome and per-invocation context

use std::collections::BTreeMap;
use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};

/// Unified error type for all macro subsystems.
#[derive(Debug, thiserror::Error)]
pub enum MacroError {
    #[error("No macro function is registered under '{function}'")]
    UnknownFunction { function: String },

    #[error("Certificate API call {operation} failed: {message}")]
    CertificateApi { operation: String, message: String },

    #[error("Invalid event: {0}")]
    InvalidEvent(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// A convenience alias for `Result<T, MacroError>`.
pub type Result<T> = std::result::Result<T, MacroError>;

// ---------------------------------------------------------------------------
// Template model
// ---------------------------------------------------------------------------

/// Free-form property bag as it appears in a template.
pub type PropertyMap = serde_json::Map<String, serde_json::Value>;

/// Resources of a template fragment keyed by logical name.
pub type ResourceGraph = BTreeMap<String, Resource>;

/// A single resource declaration.
///
/// Keys other than `Type`, `Condition` and `Properties` (`DependsOn`,
/// `Metadata`, `DeletionPolicy`, ...) are carried through untouched in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    #[serde(rename = "Type")]
    pub resource_type: String,

    #[serde(rename = "Condition", default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,

    #[serde(rename = "Properties", default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<PropertyMap>,

    #[serde(flatten)]
    pub extra: PropertyMap,
}

impl Resource {
    /// Create a resource of the given type with an empty property map.
    pub fn new(resource_type: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            condition: None,
            properties: Some(PropertyMap::new()),
            extra: PropertyMap::new(),
        }
    }

    /// Mutable access to the properties, creating the map if it was absent.
    pub fn properties_mut(&mut self) -> &mut PropertyMap {
        self.properties.get_or_insert_with(PropertyMap::new)
    }

    /// Read a property value by key.
    pub fn property(&self, key: &str) -> Option<&serde_json::Value> {
        self.properties.as_ref().and_then(|p| p.get(key))
    }
}

/// The template fragment handed to a macro.
///
/// Only `Resources` is interpreted; every other section is preserved verbatim.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TemplateFragment {
    #[serde(rename = "Resources", default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceGraph>,

    #[serde(flatten)]
    pub sections: PropertyMap,
}

// ---------------------------------------------------------------------------
// Transform contract
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformRequest {
    pub fragment: TemplateFragment,
    #[serde(default)]
    pub request_id: String,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub account_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransformStatus {
    Success,
    Failure,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformResponse {
    pub request_id: String,
    pub status: TransformStatus,
    pub fragment: TemplateFragment,
}

impl TransformResponse {
    pub fn success(request_id: impl Into<String>, fragment: TemplateFragment) -> Self {
        Self {
            request_id: request_id.into(),
            status: TransformStatus::Success,
            fragment,
        }
    }

    /// A failed transform always answers with an empty fragment.
    pub fn failure(request_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            status: TransformStatus::Failure,
            fragment: TemplateFragment::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Custom-resource protocol
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequestType {
    Create,
    Update,
    Delete,
}

/// Properties of a callout resource as they arrive in a lifecycle event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CalloutProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_token: Option<String>,
    #[serde(default)]
    pub function: String,
    #[serde(default)]
    pub properties: PropertyMap,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LifecycleEvent {
    pub request_type: RequestType,
    #[serde(rename = "ResponseURL")]
    pub response_url: String,
    pub stack_id: String,
    pub request_id: String,
    pub logical_resource_id: String,
    #[serde(default)]
    pub physical_resource_id: Option<String>,
    #[serde(default)]
    pub resource_type: Option<String>,
    pub resource_properties: CalloutProperties,
    #[serde(default)]
    pub old_resource_properties: Option<CalloutProperties>,
}

impl LifecycleEvent {
    /// Routing fields of an event that failed to decode, enough to answer it.
    ///
    /// Returns `None` when the callback URL or any id the callback body needs
    /// is missing. An unreadable `RequestType` falls back to `Create`.
    pub fn envelope(raw: &serde_json::Value) -> Option<Self> {
        let field = |key: &str| raw.get(key).and_then(serde_json::Value::as_str).map(str::to_string);

        Some(Self {
            request_type: raw
                .get("RequestType")
                .and_then(|t| RequestType::deserialize(t).ok())
                .unwrap_or(RequestType::Create),
            response_url: field("ResponseURL")?,
            stack_id: field("StackId")?,
            request_id: field("RequestId")?,
            logical_resource_id: field("LogicalResourceId")?,
            physical_resource_id: field("PhysicalResourceId"),
            resource_type: field("ResourceType"),
            resource_properties: CalloutProperties {
                function: raw
                    .pointer("/ResourceProperties/Function")
                    .and_then(serde_json::Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                ..CalloutProperties::default()
            },
            old_resource_properties: None,
        })
    }

    /// Declared properties of the previous revision (Update only).
    pub fn previous_properties(&self) -> Option<&PropertyMap> {
        self.old_resource_properties.as_ref().map(|p| &p.properties)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ResponseStatus {
    Success,
    Failed,
}

/// Body delivered to the orchestrator's callback URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CallbackResponse {
    pub status: ResponseStatus,
    pub reason: String,
    pub physical_resource_id: String,
    pub stack_id: String,
    pub request_id: String,
    pub logical_resource_id: String,
    pub no_echo: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

/// Terminal outcome of a handler invocation.
///
/// Handlers return exactly one `Completion`; the dispatcher hands it to the
/// response reporter, so each lifecycle event is answered once.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub status: ResponseStatus,
    pub reason: Option<String>,
    pub data: Option<serde_json::Value>,
    pub physical_resource_id: Option<String>,
}

impl Completion {
    pub fn success() -> Self {
        Self {
            status: ResponseStatus::Success,
            reason: None,
            data: None,
            physical_resource_id: None,
        }
    }

    pub fn success_with(data: serde_json::Value) -> Self {
        Self {
            data: Some(data),
            ..Self::success()
        }
    }

    /// A failure whose data carries the reason as `title` plus any extra detail.
    pub fn failed(reason: impl Into<String>, detail: Option<serde_json::Value>) -> Self {
        let reason = reason.into();
        let mut data = PropertyMap::new();
        data.insert("title".into(), serde_json::Value::String(reason.clone()));
        if let Some(serde_json::Value::Object(extra)) = detail {
            data.extend(extra);
        } else if let Some(other) = detail {
            data.insert("detail".into(), other);
        }
        Self {
            status: ResponseStatus::Failed,
            reason: Some(reason),
            data: Some(serde_json::Value::Object(data)),
            physical_resource_id: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ResponseStatus::Success
    }
}

/// Per-invocation execution context, threaded explicitly through handlers and
/// the reporter.
#[derive(Debug, Clone, PartialEq)]
pub struct InvocationContext {
    pub log_stream_name: String,
    pub deadline: Option<SystemTime>,
}

impl InvocationContext {
    pub fn new(log_stream_name: impl Into<String>) -> Self {
        Self {
            log_stream_name: log_stream_name.into(),
            deadline: None,
        }
    }

    pub fn with_deadline(mut self, deadline: SystemTime) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Time left before the platform deadline, if one is known.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.duration_since(SystemTime::now()).unwrap_or(Duration::ZERO))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn error_display_unknown_function() {
        let err = MacroError::UnknownFunction {
            function: "Nope".into(),
        };
        assert_eq!(
            err.to_string(),
            "No macro function is registered under 'Nope'"
        );
    }

    #[test]
    fn error_display_certificate_api() {
        let err = MacroError::CertificateApi {
            operation: "ListCertificates".into(),
            message: "throttled".into(),
        };
        assert_eq!(
            err.to_string(),
            "Certificate API call ListCertificates failed: throttled"
        );
    }

    #[test]
    fn error_display_invalid_event() {
        let err = MacroError::InvalidEvent("missing field `StackId`".into());
        assert_eq!(err.to_string(), "Invalid event: missing field `StackId`");
    }

    // --- Resource ---

    #[test]
    fn resource_preserves_unmodelled_keys() {
        let raw = json!({
            "Type": "AWS::S3::Bucket",
            "DependsOn": ["Other"],
            "DeletionPolicy": "Retain",
            "Properties": { "BucketName": "b" }
        });
        let resource: Resource = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(resource.resource_type, "AWS::S3::Bucket");
        assert_eq!(resource.extra.get("DeletionPolicy"), Some(&json!("Retain")));
        assert_eq!(serde_json::to_value(&resource).unwrap(), raw);
    }

    #[test]
    fn resource_without_properties_stays_without_properties() {
        let raw = json!({ "Type": "AWS::SNS::Topic" });
        let resource: Resource = serde_json::from_value(raw.clone()).unwrap();
        assert!(resource.properties.is_none());
        assert_eq!(serde_json::to_value(&resource).unwrap(), raw);
    }

    #[test]
    fn properties_mut_creates_missing_map() {
        let mut resource: Resource =
            serde_json::from_value(json!({ "Type": "AWS::SNS::Topic" })).unwrap();
        resource.properties_mut().insert("TopicName".into(), json!("t"));
        assert_eq!(resource.property("TopicName"), Some(&json!("t")));
    }

    #[test]
    fn fragment_keeps_other_sections() {
        let raw = json!({
            "AWSTemplateFormatVersion": "2010-09-09",
            "Outputs": { "Out": { "Value": "x" } },
            "Resources": { "Topic": { "Type": "AWS::SNS::Topic" } }
        });
        let fragment: TemplateFragment = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(fragment.resources.as_ref().unwrap().len(), 1);
        assert_eq!(serde_json::to_value(&fragment).unwrap(), raw);
    }

    #[test]
    fn failed_transform_has_empty_fragment() {
        let response = TransformResponse::failure("req-1");
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({ "requestId": "req-1", "status": "failure", "fragment": {} })
        );
    }

    // --- Lifecycle event ---

    #[test]
    fn envelope_recovers_routing_fields_of_undecodable_event() {
        let raw = json!({
            "RequestType": "Update",
            "ResponseURL": "https://example.com/callback",
            "StackId": "stack",
            "RequestId": "req",
            "LogicalResourceId": "Certificate",
            "PhysicalResourceId": "phys",
            "ResourceProperties": { "Function": "VirtualCertificate", "Properties": "not-an-object" }
        });
        assert!(serde_json::from_value::<LifecycleEvent>(raw.clone()).is_err());

        let event = LifecycleEvent::envelope(&raw).unwrap();
        assert_eq!(event.request_type, RequestType::Update);
        assert_eq!(event.response_url, "https://example.com/callback");
        assert_eq!(event.logical_resource_id, "Certificate");
        assert_eq!(event.physical_resource_id.as_deref(), Some("phys"));
        assert_eq!(event.resource_properties.function, "VirtualCertificate");
        assert!(event.resource_properties.properties.is_empty());
    }

    #[test]
    fn envelope_needs_a_callback_url() {
        let raw = json!({
            "RequestType": "Create",
            "StackId": "stack",
            "RequestId": "req",
            "LogicalResourceId": "Certificate"
        });
        assert!(LifecycleEvent::envelope(&raw).is_none());
    }

    #[test]
    fn envelope_defaults_unreadable_request_type() {
        let raw = json!({
            "RequestType": 7,
            "ResponseURL": "https://example.com/callback",
            "StackId": "stack",
            "RequestId": "req",
            "LogicalResourceId": "Certificate"
        });
        let event = LifecycleEvent::envelope(&raw).unwrap();
        assert_eq!(event.request_type, RequestType::Create);
        assert_eq!(event.physical_resource_id, None);
    }

    #[test]
    fn lifecycle_event_deserializes() {
        let event: LifecycleEvent = serde_json::from_value(json!({
            "RequestType": "Update",
            "ResponseURL": "https://example.com/callback",
            "StackId": "stack",
            "RequestId": "req",
            "LogicalResourceId": "Route53ValidationForRecord",
            "PhysicalResourceId": "phys",
            "ResourceType": "Custom::AwsArchitectFunction",
            "ResourceProperties": {
                "ServiceToken": "arn",
                "Function": "Route53DnsValidationRecord",
                "Properties": { "CertificateName": "example.com" }
            },
            "OldResourceProperties": {
                "ServiceToken": "arn",
                "Function": "Route53DnsValidationRecord",
                "Properties": { "CertificateName": "old.example.com" }
            }
        }))
        .unwrap();

        assert_eq!(event.request_type, RequestType::Update);
        assert_eq!(event.response_url, "https://example.com/callback");
        assert_eq!(event.resource_properties.function, "Route53DnsValidationRecord");
        assert_eq!(
            event.previous_properties().unwrap().get("CertificateName"),
            Some(&json!("old.example.com"))
        );
    }

    #[test]
    fn callback_response_serializes_pascal_case() {
        let body = CallbackResponse {
            status: ResponseStatus::Success,
            reason: "r".into(),
            physical_resource_id: "p".into(),
            stack_id: "s".into(),
            request_id: "q".into(),
            logical_resource_id: "l".into(),
            no_echo: false,
            data: None,
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({
                "Status": "SUCCESS",
                "Reason": "r",
                "PhysicalResourceId": "p",
                "StackId": "s",
                "RequestId": "q",
                "LogicalResourceId": "l",
                "NoEcho": false
            })
        );
    }

    // --- Completion ---

    #[test]
    fn completion_failed_carries_title_and_detail() {
        let c = Completion::failed("CertificateName is required", None);
        assert_eq!(c.status, ResponseStatus::Failed);
        assert_eq!(c.data, Some(json!({ "title": "CertificateName is required" })));

        let c = Completion::failed("boom", Some(json!({ "error": "e" })));
        assert_eq!(c.data, Some(json!({ "title": "boom", "error": "e" })));
    }

    #[test]
    fn invocation_context_remaining_saturates() {
        let past = SystemTime::now() - Duration::from_secs(5);
        let ctx = InvocationContext::new("stream").with_deadline(past);
        assert_eq!(ctx.remaining(), Some(Duration::ZERO));
        assert_eq!(InvocationContext::new("stream").remaining(), None);
    }
}
