//! Macro configuration: naming conventions, function identity, and poll budget.

use std::time::Duration;

use architect_types::{MacroError, Result};

use crate::poll::{BackoffPolicy, PollPolicy};

/// Hard ceiling on a single function invocation imposed by the platform.
pub const INVOCATION_CEILING: Duration = Duration::from_secs(15 * 60);

#[derive(Debug, Clone, PartialEq)]
pub struct MacroConfig {
    /// Prefix marking a resource type as a macro pseudo-type.
    pub custom_type_prefix: String,
    /// Resource type of the synthesized callout resources.
    pub callout_type: String,
    /// Name of the deployed macro function the callouts invoke.
    pub function_name: String,
    pub partition: String,
    pub poll: PollPolicy,
}

impl Default for MacroConfig {
    fn default() -> Self {
        Self {
            custom_type_prefix: "AwsArchitectResource::".to_string(),
            callout_type: "Custom::AwsArchitectFunction".to_string(),
            function_name: "AwsArchitectMacroFunction".to_string(),
            partition: "aws".to_string(),
            poll: PollPolicy::default(),
        }
    }
}

impl MacroConfig {
    /// Defaults overridden by `ARCHITECT_MACRO_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each setting.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(name) = lookup("ARCHITECT_MACRO_FUNCTION_NAME") {
            config.function_name = name;
        }
        if let Some(partition) = lookup("ARCHITECT_MACRO_PARTITION") {
            config.partition = partition;
        }
        if let Some(raw) = lookup("ARCHITECT_MACRO_POLL_ATTEMPTS") {
            config.poll.max_attempts = parse_number("ARCHITECT_MACRO_POLL_ATTEMPTS", &raw)? as usize;
        }
        if let Some(raw) = lookup("ARCHITECT_MACRO_POLL_INTERVAL_SECS") {
            let secs = parse_number("ARCHITECT_MACRO_POLL_INTERVAL_SECS", &raw)?;
            config.poll.backoff = if secs == 0 {
                BackoffPolicy::None
            } else {
                BackoffPolicy::Fixed(Duration::from_secs(secs))
            };
        }

        let budget = config.poll.budget();
        if budget >= INVOCATION_CEILING {
            return Err(MacroError::Config(format!(
                "poll budget of {}s does not fit in a {}s invocation",
                budget.as_secs(),
                INVOCATION_CEILING.as_secs()
            )));
        }

        Ok(config)
    }

    /// ARN of the macro's own function in the region/account that triggered the transform.
    pub fn service_token(&self, region: &str, account_id: &str) -> String {
        format!(
            "arn:{}:lambda:{}:{}:function:{}",
            self.partition, region, account_id, self.function_name
        )
    }
}

fn parse_number(key: &str, raw: &str) -> Result<u64> {
    raw.trim()
        .parse::<u64>()
        .map_err(|e| MacroError::Config(format!("{key}={raw:?}: {e}")))
}
