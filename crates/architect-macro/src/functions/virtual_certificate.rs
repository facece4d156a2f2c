//! VirtualCertificate: resolves the ARN of an existing certificate by domain
//! name, possibly in another region, and exposes it as `CertificateArn`.

use async_trait::async_trait;
use serde_json::json;

use architect_acm::ListCertificates;
use architect_types::{Completion, RequestType, Resource, ResourceGraph};

use crate::functions::{HandlerEnv, HandlerRequest, MacroResource};

const IDENTITY: &[&str] = &["Region", "DomainName"];

pub struct VirtualCertificate;

#[async_trait]
impl MacroResource for VirtualCertificate {
    fn rewrite(&self, graph: &mut ResourceGraph, callout: &Resource, target: &str) {
        graph.insert(target.to_string(), callout.clone());
    }

    async fn handle(&self, request: &HandlerRequest<'_>, env: &HandlerEnv<'_>) -> Completion {
        let (Some(region), Some(domain_name)) = (
            request.string_property("Region"),
            request.string_property("DomainName"),
        ) else {
            return Completion::failed("Region and DomainName are required", None);
        };

        if request.request_type == RequestType::Delete || request.is_unchanged_update(IDENTITY) {
            return Completion::success();
        }

        let listing = match env
            .api
            .list_certificates(&ListCertificates::in_region(region))
            .await
        {
            Ok(listing) => listing,
            Err(e) => {
                tracing::error!(region = %region, error = %e, "Listing certificates failed");
                return Completion::failed("Failed to get Certificate", Some(json!({ "error": e.to_string() })));
            }
        };

        match listing.find_by_domain(domain_name) {
            Some(certificate) => {
                tracing::info!(
                    domain = %domain_name,
                    certificate_arn = %certificate.certificate_arn,
                    "Resolved certificate"
                );
                Completion::success_with(json!({ "CertificateArn": certificate.certificate_arn }))
            }
            None => Completion::failed("No certificate exists", Some(json!({ "DomainName": domain_name }))),
        }
    }
}
