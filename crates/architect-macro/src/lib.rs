//! CloudFormation macro that expands `AwsArchitectResource::*` pseudo-resources.
//!
//! At transform time the dispatcher rewrites each pseudo-resource into real
//! resources plus a callout custom resource. At deploy time the callout's
//! lifecycle events come back to the same dispatcher, which runs the paired
//! handler and reports the outcome to the orchestrator.

pub mod config;
pub mod dispatcher;
pub mod functions;
pub mod poll;
pub mod reporter;

pub use config::MacroConfig;
pub use dispatcher::{callout_resource, transform, MacroDispatcher, MacroResponse};
pub use functions::{
    DnsValidationRecord, HandlerEnv, HandlerRequest, MacroFunction, MacroResource,
    VirtualCertificate,
};
pub use poll::{poll_until, BackoffPolicy, PollOutcome, PollPolicy, PollStep};
pub use reporter::{callback_response, HttpReporter, ResponseReporter};
