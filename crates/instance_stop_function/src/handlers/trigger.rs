use std::time::Instant;

use instance_stop_core::contract::decode_payload;
use instance_stop_core::report::{render_summary, StopResult};
use tracing::{error, info};

use crate::adapters::compute::ComputeInstances;
use crate::adapters::pubsub::PubSubMessage;
use crate::handlers::stop::{Deadline, InstanceStopper, StopError};

/// Decode the message data, run one stop pass and log the summary.
pub fn handle_stop_message<C: ComputeInstances + ?Sized>(
    data: &[u8],
    stopper: &InstanceStopper<'_, C>,
    deadline: &Deadline,
) -> Result<StopResult, StopError> {
    let started_at = Instant::now();
    let outcome = decode_payload(data)
        .map_err(StopError::from)
        .and_then(|payload| stopper.stop_labelled(&payload, deadline));

    match &outcome {
        Ok(result) => info!(
            component = "trigger_handler",
            event = "stop_completed",
            project = %stopper.project(),
            target_instance_count = result.target_instance_count(),
            duration_ms = started_at.elapsed().as_millis() as u64,
            "{}",
            render_summary(result)
        ),
        Err(failure) => error!(
            component = "trigger_handler",
            event = "stop_failed",
            project = %stopper.project(),
            kind = ?failure.kind(),
            duration_ms = started_at.elapsed().as_millis() as u64,
            error = %failure,
        ),
    }

    outcome
}

/// Same as [`handle_stop_message`], starting from a Pub/Sub message.
pub fn handle_pubsub_message<C: ComputeInstances + ?Sized>(
    message: &PubSubMessage,
    stopper: &InstanceStopper<'_, C>,
    deadline: &Deadline,
) -> Result<StopResult, StopError> {
    info!(
        component = "trigger_handler",
        event = "message_received",
        message_id = %message.message_id.as_deref().unwrap_or_default(),
        publish_time = %message.publish_time.map(|time| time.to_rfc3339()).unwrap_or_default(),
    );
    let data = message.decoded_data().map_err(|failure| {
        error!(
            component = "trigger_handler",
            event = "stop_failed",
            error = %failure,
        );
        StopError::from(failure)
    })?;
    handle_stop_message(&data, stopper, deadline)
}
