//! Macro functions: the rewriter/handler pairs behind each pseudo-resource type.
//!
//! Every pseudo-type `<prefix><Name>` resolves to exactly one [`MacroFunction`]
//! variant. The same variant rewrites the template at transform time and
//! handles the callout resource's lifecycle events at deploy time.

pub mod dns_validation;
pub mod virtual_certificate;

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;

use architect_acm::CertificateApi;
use architect_types::{
    Completion, InvocationContext, MacroError, PropertyMap, RequestType, Resource, ResourceGraph,
};

use crate::poll::PollPolicy;

pub use dns_validation::DnsValidationRecord;
pub use virtual_certificate::VirtualCertificate;

// ---------------------------------------------------------------------------
// MacroResource trait
// ---------------------------------------------------------------------------

/// One lifecycle invocation of a callout resource, as seen by a handler.
#[derive(Debug, Clone, Copy)]
pub struct HandlerRequest<'a> {
    pub request_type: RequestType,
    pub properties: &'a PropertyMap,
    /// Declared properties of the previous revision (Update only).
    pub previous: Option<&'a PropertyMap>,
}

impl<'a> HandlerRequest<'a> {
    pub fn string_property(&self, key: &str) -> Option<&'a str> {
        self.properties
            .get(key)
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
    }

    /// An Update whose identifying properties all match the previous revision.
    pub fn is_unchanged_update(&self, identity: &[&str]) -> bool {
        match (self.request_type, self.previous) {
            (RequestType::Update, Some(previous)) => identity
                .iter()
                .all(|key| previous.get(*key) == self.properties.get(*key)),
            _ => false,
        }
    }
}

/// Collaborators a handler may use while resolving a request.
#[derive(Clone, Copy)]
pub struct HandlerEnv<'a> {
    pub api: &'a dyn CertificateApi,
    pub poll: &'a PollPolicy,
    pub ctx: &'a InvocationContext,
}

#[async_trait]
pub trait MacroResource: Send + Sync {
    /// Replace the pseudo-resource `target` in `graph`, wiring it to `callout`.
    ///
    /// Never fails: malformed declarations surface when the handler validates
    /// the callout's properties.
    fn rewrite(&self, graph: &mut ResourceGraph, callout: &Resource, target: &str);

    /// Resolve one lifecycle event. Every path yields exactly one completion.
    async fn handle(&self, request: &HandlerRequest<'_>, env: &HandlerEnv<'_>) -> Completion;
}

// ---------------------------------------------------------------------------
// MacroFunction registry
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MacroFunction {
    VirtualCertificate,
    Route53DnsValidationRecord,
}

impl MacroFunction {
    pub const ALL: [MacroFunction; 2] = [
        MacroFunction::VirtualCertificate,
        MacroFunction::Route53DnsValidationRecord,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            MacroFunction::VirtualCertificate => "VirtualCertificate",
            MacroFunction::Route53DnsValidationRecord => "Route53DnsValidationRecord",
        }
    }

    /// The rewriter/handler pair registered under this function.
    pub fn implementation(&self) -> &'static dyn MacroResource {
        match self {
            MacroFunction::VirtualCertificate => &VirtualCertificate,
            MacroFunction::Route53DnsValidationRecord => &DnsValidationRecord,
        }
    }
}

impl FromStr for MacroFunction {
    type Err = MacroError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        MacroFunction::ALL
            .into_iter()
            .find(|f| f.name() == name)
            .ok_or_else(|| MacroError::UnknownFunction {
                function: name.to_string(),
            })
    }
}

impl fmt::Display for MacroFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Attribute suffix for the subject at `index`: `""`, `"2"`, `"3"`, ...
pub fn attribute_suffix(index: usize) -> String {
    if index == 0 {
        String::new()
    } else {
        (index + 1).to_string()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
