use anyhow::Context;
use clap::Parser;
use instance_stop_core::contract::StopRequestPayload;
use instance_stop_core::report::render_summary;
use instance_stop_function::adapters::gce::{AccessTokenSource, GceComputeClient};
use instance_stop_function::config::FunctionConfig;
use instance_stop_function::handlers::stop::{Deadline, InstanceStopper};
use instance_stop_function::handlers::trigger::handle_stop_message;
use instance_stop_function::telemetry::init_tracing;

#[derive(Parser)]
#[command(
    name = "stop_instances_once",
    about = "Stop every labelled Compute Engine instance in a project, once"
)]
struct Cli {
    /// Label key to match
    #[arg(long, requires = "label_value", conflicts_with = "payload")]
    label_key: Option<String>,
    /// Label value to match
    #[arg(long, requires = "label_key")]
    label_value: Option<String>,
    /// Raw trigger payload, e.g. '{"labelKey":"env","labelValue":"ci"}'
    #[arg(long, required_unless_present = "label_key")]
    payload: Option<String>,
    /// Project to operate on
    #[arg(long, env = "GCP_PROJECT")]
    project: Option<String>,
}

impl Cli {
    fn payload_bytes(&self) -> anyhow::Result<Vec<u8>> {
        match (&self.payload, &self.label_key, &self.label_value) {
            (Some(raw), _, _) => Ok(raw.clone().into_bytes()),
            (None, Some(label_key), Some(label_value)) => {
                let payload = StopRequestPayload {
                    label_key: label_key.clone(),
                    label_value: label_value.clone(),
                };
                Ok(serde_json::to_vec(&payload)?)
            }
            _ => anyhow::bail!("either --payload or --label-key/--label-value is required"),
        }
    }
}

fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let mut config = FunctionConfig::from_env()?;
    if let Some(project) = &cli.project {
        config.project = project.clone();
    }

    let compute = GceComputeClient::new(&config, AccessTokenSource::from_env())
        .context("failed to build compute client")?;
    let stopper = InstanceStopper::from_config(&compute, &config);
    let deadline = Deadline::from_timeout(config.invocation_timeout);

    let result = handle_stop_message(&cli.payload_bytes()?, &stopper, &deadline)?;
    println!("{}", render_summary(&result));
    Ok(())
}
