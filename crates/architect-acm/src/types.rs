use serde::{Deserialize, Serialize};

/// Certificate lifecycle states understood by the list filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CertificateStatus {
    PendingValidation,
    Issued,
    Inactive,
    Expired,
    ValidationTimedOut,
    Revoked,
    Failed,
}

impl CertificateStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CertificateStatus::PendingValidation => "PENDING_VALIDATION",
            CertificateStatus::Issued => "ISSUED",
            CertificateStatus::Inactive => "INACTIVE",
            CertificateStatus::Expired => "EXPIRED",
            CertificateStatus::ValidationTimedOut => "VALIDATION_TIMED_OUT",
            CertificateStatus::Revoked => "REVOKED",
            CertificateStatus::Failed => "FAILED",
        }
    }
}

/// Validation method name for DNS-based domain validation.
pub const VALIDATION_METHOD_DNS: &str = "DNS";

/// Query for `list_certificates`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListCertificates {
    /// Region override; `None` uses the client's configured region.
    pub region: Option<String>,
    /// Status filter; empty means every status.
    pub statuses: Vec<CertificateStatus>,
}

impl ListCertificates {
    pub fn pending_validation() -> Self {
        Self {
            region: None,
            statuses: vec![CertificateStatus::PendingValidation],
        }
    }

    pub fn in_region(region: impl Into<String>) -> Self {
        Self {
            region: Some(region.into()),
            statuses: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CertificateSummary {
    pub certificate_arn: String,
    pub domain_name: String,
}

/// Raw listing result, kept whole so it can be echoed back for diagnosis.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CertificateListing {
    pub certificate_summary_list: Vec<CertificateSummary>,
}

impl CertificateListing {
    pub fn find_by_domain(&self, domain_name: &str) -> Option<&CertificateSummary> {
        self.certificate_summary_list
            .iter()
            .find(|c| c.domain_name == domain_name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ResourceRecord {
    pub name: String,
    #[serde(rename = "Type")]
    pub record_type: String,
    pub value: String,
}

/// Validation state of one subject name on a certificate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DomainValidation {
    pub domain_name: String,
    #[serde(default)]
    pub validation_status: Option<String>,
    #[serde(default)]
    pub validation_method: Option<String>,
    #[serde(default)]
    pub resource_record: Option<ResourceRecord>,
}

impl DomainValidation {
    /// Still waiting on a DNS record, and the record to publish is known.
    pub fn is_pending_dns(&self) -> bool {
        self.resource_record.is_some()
            && self.validation_status.as_deref()
                == Some(CertificateStatus::PendingValidation.as_str())
            && self.validation_method.as_deref() == Some(VALIDATION_METHOD_DNS)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CertificateDetail {
    pub certificate_arn: String,
    pub domain_name: String,
    #[serde(default)]
    pub subject_alternative_names: Vec<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub domain_validation_options: Vec<DomainValidation>,
}

impl CertificateDetail {
    /// The issuer populates validation records some time after the
    /// certificate itself becomes visible; the first option carrying a record
    /// marks the detail as usable.
    pub fn validation_ready(&self) -> bool {
        self.domain_validation_options
            .first()
            .is_some_and(|o| o.resource_record.is_some())
    }

    pub fn pending_dns_validations(&self) -> impl Iterator<Item = &DomainValidation> {
        self.domain_validation_options
            .iter()
            .filter(|o| o.is_pending_dns())
    }
}
