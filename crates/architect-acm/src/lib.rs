//! Certificate authority collaborator for the macro's resource handlers.
//!
//! Provides the `CertificateApi` trait, the `DynCertificateApi` wrapper, plain
//! data records for listings and certificate details, and `AcmClient`, the
//! adapter over AWS Certificate Manager.

mod acm;
mod provider;
mod types;

pub use acm::AcmClient;
pub use provider::*;
pub use types::*;
