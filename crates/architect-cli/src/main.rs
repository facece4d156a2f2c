//! CLI binary for the AWS Architect macro function.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, UNIX_EPOCH};

use clap::{Parser, Subcommand};
use lambda_runtime::{service_fn, LambdaEvent};
use serde_json::Value;

use architect_acm::{AcmClient, DynCertificateApi};
use architect_macro::{HttpReporter, MacroConfig, MacroDispatcher, MacroResponse};
use architect_types::{InvocationContext, LifecycleEvent, TransformRequest, TransformStatus};

#[derive(Parser)]
#[command(
    name = "architect-macro",
    version,
    about = "CloudFormation macro expanding AwsArchitectResource pseudo-resources"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run as the Lambda function behind the macro and its callout resources
    Serve,

    /// Rewrite a template locally and print the transformed fragment
    Transform {
        /// Path to a JSON template fragment or a full transform request
        template: PathBuf,

        /// Region used to build the callout ServiceToken
        #[arg(long, default_value = "us-east-1")]
        region: String,

        /// Account id used to build the callout ServiceToken
        #[arg(long, default_value = "000000000000")]
        account_id: String,

        /// Write the response here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Run one lifecycle event against live ACM and post to its ResponseURL
    Handle {
        /// Path to the lifecycle event JSON
        event: PathBuf,

        /// Log stream name reported in the callback reason
        #[arg(long, default_value = "local")]
        log_stream: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup tracing
    let filter = if cli.verbose {
        "debug".to_string()
    } else {
        std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string())
    };
    if matches!(cli.command, Commands::Serve) {
        // The platform log stream stamps each line.
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_ansi(false)
            .without_time()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    let config = MacroConfig::from_env()?;

    match cli.command {
        Commands::Serve => {
            cmd_serve(config).await?;
        }
        Commands::Transform {
            template,
            region,
            account_id,
            output,
        } => {
            cmd_transform(&config, &template, &region, &account_id, output.as_deref())?;
        }
        Commands::Handle { event, log_stream } => {
            cmd_handle(config, &event, log_stream).await?;
        }
    }

    Ok(())
}

async fn cmd_serve(config: MacroConfig) -> anyhow::Result<()> {
    tracing::info!(
        function = %config.function_name,
        poll_attempts = config.poll.max_attempts,
        "Starting Lambda runtime loop"
    );
    let api = AcmClient::from_env().await;
    let dispatcher = Arc::new(MacroDispatcher::new(
        config,
        DynCertificateApi::new(api),
        HttpReporter::new(),
    ));

    lambda_runtime::run(service_fn(move |event: LambdaEvent<Value>| {
        let dispatcher = dispatcher.clone();
        async move {
            let (payload, context) = event.into_parts();
            let ctx = InvocationContext::new(context.env_config.log_stream.clone())
                .with_deadline(UNIX_EPOCH + Duration::from_millis(context.deadline));
            let response = dispatcher.dispatch(payload, &ctx).await;
            Ok::<MacroResponse, lambda_runtime::Error>(response)
        }
    }))
    .await
    .map_err(|e| anyhow::anyhow!(e))
}

/// Read a transform request from `path`. A bare template is wrapped in a
/// request for `region` / `account_id`.
fn load_template(path: &Path, region: &str, account_id: &str) -> anyhow::Result<TransformRequest> {
    let source = std::fs::read_to_string(path)?;
    let value: Value = serde_json::from_str(&source)?;

    if value.get("fragment").is_some() {
        return Ok(serde_json::from_value(value)?);
    }

    let request_id = path
        .file_stem()
        .unwrap_or_default()
        .to_string_lossy()
        .into_owned();
    Ok(TransformRequest {
        fragment: serde_json::from_value(value)?,
        request_id,
        region: region.to_string(),
        account_id: account_id.to_string(),
    })
}

fn cmd_transform(
    config: &MacroConfig,
    path: &Path,
    region: &str,
    account_id: &str,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    let request = load_template(path, region, account_id)?;
    let response = architect_macro::transform(config, request);
    let rendered = serde_json::to_string_pretty(&response)?;

    match output {
        Some(out) => {
            std::fs::write(out, rendered)?;
            println!("Wrote {}", out.display());
        }
        None => println!("{}", rendered),
    }

    if response.status == TransformStatus::Failure {
        anyhow::bail!("Transform failed for {}", path.display());
    }
    Ok(())
}

async fn cmd_handle(config: MacroConfig, path: &Path, log_stream: String) -> anyhow::Result<()> {
    let source = std::fs::read_to_string(path)?;
    let event: LifecycleEvent = serde_json::from_str(&source)?;

    let api = AcmClient::from_env().await;
    let dispatcher = MacroDispatcher::new(config, DynCertificateApi::new(api), HttpReporter::new());
    let ctx = InvocationContext::new(log_stream);

    dispatcher.execute(&event, &ctx).await;
    println!("Handled {} for {}", event.resource_properties.function, event.logical_resource_id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_json(value: &Value) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{}", value).unwrap();
        file
    }

    #[test]
    fn bare_template_is_wrapped_in_request() {
        let file = write_json(&serde_json::json!({
            "Resources": {
                "Certificate": {
                    "Type": "AwsArchitectResource::VirtualCertificate",
                    "Properties": { "Region": "us-east-1", "DomainName": "example.com" }
                }
            }
        }));

        let request = load_template(file.path(), "eu-west-1", "123456789012").unwrap();

        assert_eq!(request.region, "eu-west-1");
        assert_eq!(request.account_id, "123456789012");
        assert!(!request.request_id.is_empty());
        assert!(request.fragment.resources.unwrap().contains_key("Certificate"));
    }

    #[test]
    fn full_request_keeps_its_own_identity() {
        let file = write_json(&serde_json::json!({
            "requestId": "req-7",
            "region": "ap-southeast-2",
            "accountId": "42",
            "fragment": { "Resources": {} }
        }));

        let request = load_template(file.path(), "us-east-1", "1").unwrap();

        assert_eq!(request.request_id, "req-7");
        assert_eq!(request.region, "ap-southeast-2");
        assert_eq!(request.account_id, "42");
    }

    #[test]
    fn transform_writes_rewritten_fragment() {
        let file = write_json(&serde_json::json!({
            "Resources": {
                "Certificate": {
                    "Type": "AwsArchitectResource::VirtualCertificate",
                    "Properties": { "Region": "us-east-1", "DomainName": "example.com" }
                }
            }
        }));
        let out = tempfile::NamedTempFile::new().unwrap();

        cmd_transform(
            &MacroConfig::default(),
            file.path(),
            "us-east-1",
            "123456789012",
            Some(out.path()),
        )
        .unwrap();

        let written: Value =
            serde_json::from_str(&std::fs::read_to_string(out.path()).unwrap()).unwrap();
        assert_eq!(written["status"], "success");
        assert_eq!(
            written["fragment"]["Resources"]["Certificate"]["Type"],
            "Custom::AwsArchitectFunction"
        );
    }

    #[test]
    fn unknown_function_fails_the_command() {
        let file = write_json(&serde_json::json!({
            "Resources": { "Thing": { "Type": "AwsArchitectResource::Nope" } }
        }));
        let out = tempfile::NamedTempFile::new().unwrap();

        let result = cmd_transform(
            &MacroConfig::default(),
            file.path(),
            "us-east-1",
            "1",
            Some(out.path()),
        );

        assert!(result.is_err());
    }
}
