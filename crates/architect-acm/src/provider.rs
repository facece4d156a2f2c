use std::sync::Arc;

use async_trait::async_trait;

use architect_types::Result;

use crate::{CertificateDetail, CertificateListing, ListCertificates};

// ---------------------------------------------------------------------------
// CertificateApi
// ---------------------------------------------------------------------------

#[async_trait]
pub trait CertificateApi: Send + Sync {
    async fn list_certificates(&self, query: &ListCertificates) -> Result<CertificateListing>;

    /// `Ok(None)` when the issuer answered without a certificate body.
    async fn describe_certificate(
        &self,
        region: Option<&str>,
        certificate_arn: &str,
    ) -> Result<Option<CertificateDetail>>;
}

// ---------------------------------------------------------------------------
// DynCertificateApi
// ---------------------------------------------------------------------------

/// Cheaply clonable, object-safe handle to a `CertificateApi`.
#[derive(Clone)]
pub struct DynCertificateApi(Arc<dyn CertificateApi>);

impl DynCertificateApi {
    pub fn new(api: impl CertificateApi + 'static) -> Self {
        Self(Arc::new(api))
    }

    pub fn from_arc(api: Arc<dyn CertificateApi>) -> Self {
        Self(api)
    }

    pub fn as_api(&self) -> &dyn CertificateApi {
        self.0.as_ref()
    }

    pub async fn list_certificates(&self, query: &ListCertificates) -> Result<CertificateListing> {
        self.0.list_certificates(query).await
    }

    pub async fn describe_certificate(
        &self,
        region: Option<&str>,
        certificate_arn: &str,
    ) -> Result<Option<CertificateDetail>> {
        self.0.describe_certificate(region, certificate_arn).await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CertificateStatus, CertificateSummary, DomainValidation, ResourceRecord};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct MockApi {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl CertificateApi for MockApi {
        async fn list_certificates(&self, query: &ListCertificates) -> Result<CertificateListing> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            assert_eq!(query.statuses, vec![CertificateStatus::PendingValidation]);
            Ok(CertificateListing {
                certificate_summary_list: vec![CertificateSummary {
                    certificate_arn: "arn:cert".into(),
                    domain_name: "example.com".into(),
                }],
            })
        }

        async fn describe_certificate(
            &self,
            _region: Option<&str>,
            certificate_arn: &str,
        ) -> Result<Option<CertificateDetail>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Some(CertificateDetail {
                certificate_arn: certificate_arn.into(),
                domain_name: "example.com".into(),
                subject_alternative_names: vec![],
                status: Some("PENDING_VALIDATION".into()),
                domain_validation_options: vec![DomainValidation {
                    domain_name: "example.com".into(),
                    validation_status: Some("PENDING_VALIDATION".into()),
                    validation_method: Some("DNS".into()),
                    resource_record: Some(ResourceRecord {
                        name: "_abc.example.com.".into(),
                        record_type: "CNAME".into(),
                        value: "_xyz.acm-validations.aws.".into(),
                    }),
                }],
            }))
        }
    }

    #[tokio::test]
    async fn dyn_api_delegates() {
        let api = Arc::new(MockApi {
            calls: AtomicUsize::new(0),
        });
        let dyn_api = DynCertificateApi::from_arc(api.clone());

        let listing = dyn_api
            .list_certificates(&ListCertificates::pending_validation())
            .await
            .unwrap();
        let summary = listing.find_by_domain("example.com").unwrap();
        let detail = dyn_api
            .describe_certificate(None, &summary.certificate_arn)
            .await
            .unwrap()
            .unwrap();

        assert!(detail.validation_ready());
        assert_eq!(detail.pending_dns_validations().count(), 1);
        assert_eq!(api.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn find_by_domain_is_exact() {
        let listing = CertificateListing {
            certificate_summary_list: vec![CertificateSummary {
                certificate_arn: "arn".into(),
                domain_name: "www.example.com".into(),
            }],
        };
        assert!(listing.find_by_domain("example.com").is_none());
        assert!(listing.find_by_domain("www.example.com").is_some());
    }

    #[test]
    fn email_validation_is_not_pending_dns() {
        let option = DomainValidation {
            domain_name: "example.com".into(),
            validation_status: Some("PENDING_VALIDATION".into()),
            validation_method: Some("EMAIL".into()),
            resource_record: Some(ResourceRecord {
                name: "n".into(),
                record_type: "CNAME".into(),
                value: "v".into(),
            }),
        };
        assert!(!option.is_pending_dns());
    }

    #[test]
    fn validated_option_is_not_pending_dns() {
        let option = DomainValidation {
            domain_name: "example.com".into(),
            validation_status: Some("SUCCESS".into()),
            validation_method: Some("DNS".into()),
            resource_record: Some(ResourceRecord {
                name: "n".into(),
                record_type: "CNAME".into(),
                value: "v".into(),
            }),
        };
        assert!(!option.is_pending_dns());
    }

    #[test]
    fn detail_without_record_is_not_ready() {
        let detail = CertificateDetail {
            certificate_arn: "arn".into(),
            domain_name: "example.com".into(),
            subject_alternative_names: vec![],
            status: None,
            domain_validation_options: vec![DomainValidation {
                domain_name: "example.com".into(),
                validation_status: Some("PENDING_VALIDATION".into()),
                validation_method: Some("DNS".into()),
                resource_record: None,
            }],
        };
        assert!(!detail.validation_ready());
    }

    #[test]
    fn listing_serializes_like_the_issuer() {
        let listing = CertificateListing {
            certificate_summary_list: vec![CertificateSummary {
                certificate_arn: "arn".into(),
                domain_name: "example.com".into(),
            }],
        };
        assert_eq!(
            serde_json::to_value(&listing).unwrap(),
            serde_json::json!({
                "CertificateSummaryList": [
                    { "CertificateArn": "arn", "DomainName": "example.com" }
                ]
            })
        );
    }
}
