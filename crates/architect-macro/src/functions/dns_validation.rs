//! Route53DnsValidationRecord: publishes the DNS records that validate a
//! pending certificate.
//!
//! At transform time the pseudo-resource becomes one `AWS::Route53::RecordSet`
//! per subject name, each reading its name and value from the callout
//! resource. At deploy time the callout waits for the certificate to show up
//! as pending validation and answers with the issuer's validation records.

use std::collections::HashSet;

use async_trait::async_trait;
use serde_json::{json, Value};

use architect_acm::{CertificateApi, CertificateDetail, CertificateListing, ListCertificates};
use architect_types::{Completion, PropertyMap, RequestType, Resource, ResourceGraph};

use crate::functions::{attribute_suffix, HandlerEnv, HandlerRequest, MacroResource};
use crate::poll::{poll_until, PollOutcome, PollStep};

pub const CALLOUT_PREFIX: &str = "Route53ValidationFor";
pub const RECORD_SET_TYPE: &str = "AWS::Route53::RecordSet";

/// Declared only to drive the macro; not a RecordSet property.
const PSEUDO_PROPERTIES: &[&str] = &["CertificateName"];
const IDENTITY: &[&str] = &["CertificateName"];

pub struct DnsValidationRecord;

#[async_trait]
impl MacroResource for DnsValidationRecord {
    fn rewrite(&self, graph: &mut ResourceGraph, callout: &Resource, target: &str) {
        let callout_name = format!("{CALLOUT_PREFIX}{target}");
        graph.insert(callout_name.clone(), callout.clone());

        let subjects = validation_subjects(declared_properties(callout));

        if let Some(resource) = graph.get_mut(target) {
            strip_pseudo_properties(resource);
        }
        let declaration = graph
            .get(target)
            .cloned()
            .unwrap_or_else(|| Resource::new(RECORD_SET_TYPE));

        for index in 0..subjects.len() {
            let suffix = attribute_suffix(index);
            let name = if index == 0 {
                target.to_string()
            } else {
                format!("{target}-Alt{suffix}")
            };

            let resource = graph.entry(name).or_insert_with(|| declaration.clone());
            resource.resource_type = RECORD_SET_TYPE.to_string();
            strip_pseudo_properties(resource);

            let properties = resource.properties_mut();
            properties.insert(
                "Name".into(),
                json!({ "Fn::GetAtt": [callout_name, format!("VerificationRecordName{suffix}")] }),
            );
            properties.insert(
                "ResourceRecords".into(),
                json!([{ "Fn::GetAtt": [callout_name, format!("VerificationRecordValue{suffix}")] }]),
            );
        }

        tracing::debug!(
            resource = %target,
            callout = %callout_name,
            records = subjects.len(),
            "Rewrote DNS validation record"
        );
    }

    async fn handle(&self, request: &HandlerRequest<'_>, env: &HandlerEnv<'_>) -> Completion {
        let Some(certificate_name) = request.string_property("CertificateName") else {
            return Completion::failed("CertificateName is required", None);
        };

        if request.request_type == RequestType::Delete || request.is_unchanged_update(IDENTITY) {
            return Completion::success();
        }

        match find_validation_records(certificate_name, env).await {
            Ok(PollOutcome::Ready { value, attempts }) => {
                tracing::info!(certificate = %certificate_name, attempts, "Validation records found");
                Completion::success_with(value)
            }
            Ok(PollOutcome::Exhausted { attempts, last }) => {
                tracing::warn!(certificate = %certificate_name, attempts, "Validation records never appeared");
                Completion::failed(
                    format!("Certificate with CertificateName {certificate_name} not found."),
                    Some(json!({ "certificatesResult": last })),
                )
            }
            Err(e) => {
                tracing::error!(certificate = %certificate_name, error = %e, "Certificate lookup failed");
                Completion::failed(
                    "Failed to get Certificate data",
                    Some(json!({ "error": e.to_string() })),
                )
            }
        }
    }
}

/// Properties the author declared on the pseudo-resource, as carried by the callout.
fn declared_properties(callout: &Resource) -> Option<&PropertyMap> {
    callout.property("Properties").and_then(Value::as_object)
}

fn strip_pseudo_properties(resource: &mut Resource) {
    if let Some(properties) = resource.properties.as_mut() {
        for key in PSEUDO_PROPERTIES {
            properties.remove(*key);
        }
    }
}

/// Subject names that need their own validation record, in declaration order.
///
/// The primary domain always takes slot 0, even when undeclared. A wildcard
/// `*.name` is dropped when `name` itself is listed, since both validate with
/// the same record.
pub fn validation_subjects(declared: Option<&PropertyMap>) -> Vec<String> {
    let primary = declared
        .and_then(|p| p.get("DomainName"))
        .map(subject_text)
        .unwrap_or_default();
    let alternatives = declared
        .and_then(|p| p.get("SubjectAlternativeNames"))
        .and_then(Value::as_array)
        .map(|names| names.iter().map(subject_text).collect::<Vec<_>>())
        .unwrap_or_default();

    let names: Vec<String> = std::iter::once(primary).chain(alternatives).collect();
    let concrete: HashSet<&str> = names
        .iter()
        .map(String::as_str)
        .filter(|n| !n.starts_with('*'))
        .collect();

    names
        .iter()
        .filter(|n| {
            !n.starts_with('*') || !concrete.contains(n.strip_prefix("*.").unwrap_or(n.as_str()))
        })
        .cloned()
        .collect()
}

/// Intrinsic functions (`Fn::Sub`, ...) are kept as opaque text so they still
/// occupy a slot.
fn subject_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

async fn find_validation_records(
    certificate_name: &str,
    env: &HandlerEnv<'_>,
) -> architect_types::Result<PollOutcome<Value, CertificateListing>> {
    let api = env.api;
    let query = ListCertificates::pending_validation();
    let query = &query;

    poll_until(env.poll, env.ctx.deadline, |attempt| async move {
        let listing = api.list_certificates(query).await?;
        let certificate_arn = listing
            .find_by_domain(certificate_name)
            .map(|summary| summary.certificate_arn.clone());
        let Some(certificate_arn) = certificate_arn else {
            tracing::info!(certificate = %certificate_name, attempt, "No pending certificate found yet");
            return Ok(PollStep::Pending(listing));
        };

        let detail = describe(api, &certificate_arn).await?;
        match detail {
            Some(detail) if detail.validation_ready() => {
                Ok(PollStep::Ready(verification_records(&detail)))
            }
            _ => {
                tracing::info!(
                    certificate = %certificate_name,
                    attempt,
                    "Certificate found, validation options not yet available"
                );
                Ok(PollStep::Pending(listing))
            }
        }
    })
    .await
}

async fn describe(
    api: &dyn CertificateApi,
    certificate_arn: &str,
) -> architect_types::Result<Option<CertificateDetail>> {
    let detail = api.describe_certificate(None, certificate_arn).await?;
    tracing::debug!(certificate_arn = %certificate_arn, detail = ?detail, "Described certificate");
    Ok(detail)
}

/// `VerificationRecordName{n}` / `VerificationRecordValue{n}` for every option
/// still awaiting DNS validation.
///
/// Options sharing a record name (`*.example.com` next to `example.com`) take
/// one slot, matching the subjects the rewriter wires.
pub fn verification_records(detail: &CertificateDetail) -> Value {
    let mut data = PropertyMap::new();
    let mut seen = HashSet::new();
    for option in detail.pending_dns_validations() {
        let Some(record) = option.resource_record.as_ref() else {
            continue;
        };
        if !seen.insert(record.name.as_str()) {
            continue;
        }
        let suffix = attribute_suffix(seen.len() - 1);
        data.insert(
            format!("VerificationRecordName{suffix}"),
            Value::String(record.name.clone()),
        );
        data.insert(
            format!("VerificationRecordValue{suffix}"),
            Value::String(record.value.clone()),
        );
    }
    Value::Object(data)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
