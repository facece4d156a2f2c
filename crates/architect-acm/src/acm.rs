use async_trait::async_trait;
use aws_config::{BehaviorVersion, SdkConfig};
use aws_sdk_acm::config::Region;
use aws_sdk_acm::error::DisplayErrorContext;

use architect_types::{MacroError, Result};

use crate::{
    CertificateApi, CertificateDetail, CertificateListing, CertificateSummary, DomainValidation,
    ListCertificates, ResourceRecord,
};

// ---------------------------------------------------------------------------
// AcmClient
// ---------------------------------------------------------------------------

/// `CertificateApi` backed by AWS Certificate Manager.
#[derive(Debug, Clone)]
pub struct AcmClient {
    sdk_config: SdkConfig,
    default_client: aws_sdk_acm::Client,
}

impl AcmClient {
    pub fn new(sdk_config: SdkConfig) -> Self {
        let default_client = aws_sdk_acm::Client::new(&sdk_config);
        Self {
            sdk_config,
            default_client,
        }
    }

    /// Load credentials and region from the environment.
    pub async fn from_env() -> Self {
        let sdk_config = aws_config::load_defaults(BehaviorVersion::latest()).await;
        Self::new(sdk_config)
    }

    fn client_for(&self, region: Option<&str>) -> aws_sdk_acm::Client {
        match region {
            Some(region) => {
                let config = aws_sdk_acm::config::Builder::from(&self.sdk_config)
                    .region(Region::new(region.to_string()))
                    .build();
                aws_sdk_acm::Client::from_conf(config)
            }
            None => self.default_client.clone(),
        }
    }
}

fn api_error<E>(operation: &str, err: E) -> MacroError
where
    E: std::error::Error,
{
    MacroError::CertificateApi {
        operation: operation.to_string(),
        message: DisplayErrorContext(&err).to_string(),
    }
}

#[async_trait]
impl CertificateApi for AcmClient {
    async fn list_certificates(&self, query: &ListCertificates) -> Result<CertificateListing> {
        let client = self.client_for(query.region.as_deref());
        let mut listing = CertificateListing::default();
        let mut next_token: Option<String> = None;

        loop {
            let mut request = client.list_certificates();
            for status in &query.statuses {
                request = request.certificate_statuses(
                    aws_sdk_acm::types::CertificateStatus::from(status.as_str()),
                );
            }
            if let Some(token) = next_token.take() {
                request = request.next_token(token);
            }

            let output = request
                .send()
                .await
                .map_err(|e| api_error("ListCertificates", e))?;

            listing
                .certificate_summary_list
                .extend(output.certificate_summary_list().iter().map(|s| {
                    CertificateSummary {
                        certificate_arn: s.certificate_arn().unwrap_or_default().to_string(),
                        domain_name: s.domain_name().unwrap_or_default().to_string(),
                    }
                }));

            match output.next_token() {
                Some(token) if !token.is_empty() => next_token = Some(token.to_string()),
                _ => break,
            }
        }

        tracing::debug!(
            region = ?query.region,
            count = listing.certificate_summary_list.len(),
            "Listed certificates"
        );
        Ok(listing)
    }

    async fn describe_certificate(
        &self,
        region: Option<&str>,
        certificate_arn: &str,
    ) -> Result<Option<CertificateDetail>> {
        let output = self
            .client_for(region)
            .describe_certificate()
            .certificate_arn(certificate_arn)
            .send()
            .await
            .map_err(|e| api_error("DescribeCertificate", e))?;

        Ok(output.certificate().map(|c| CertificateDetail {
            certificate_arn: c.certificate_arn().unwrap_or_default().to_string(),
            domain_name: c.domain_name().unwrap_or_default().to_string(),
            subject_alternative_names: c.subject_alternative_names().to_vec(),
            status: c.status().map(|s| s.as_str().to_string()),
            domain_validation_options: c
                .domain_validation_options()
                .iter()
                .map(convert_validation)
                .collect(),
        }))
    }
}

fn convert_validation(option: &aws_sdk_acm::types::DomainValidation) -> DomainValidation {
    DomainValidation {
        domain_name: option.domain_name().to_string(),
        validation_status: option.validation_status().map(|s| s.as_str().to_string()),
        validation_method: option.validation_method().map(|m| m.as_str().to_string()),
        resource_record: option.resource_record().map(|r| ResourceRecord {
            name: r.name().to_string(),
            record_type: r.r#type().as_str().to_string(),
            value: r.value().to_string(),
        }),
    }
}
