use std::time::Duration;

use instance_stop_core::contract::{DecodeError, StopRequestPayload};
use instance_stop_core::report::StopResult;
use thiserror::Error;
use tracing::{debug, info};

pub use crate::adapters::compute::Deadline;
use crate::adapters::compute::{list_filtered, ComputeInstances, ProviderError};
use crate::adapters::pubsub::EnvelopeError;
use crate::config::FunctionConfig;

/// Terminal failure of one invocation. None of these are retried here.
#[derive(Debug, Error)]
pub enum StopError {
    #[error(transparent)]
    Envelope(#[from] EnvelopeError),
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error("failed to list instances: {0}")]
    Inventory(#[source] ProviderError),
    /// Instances stopped before this one stay stopped.
    #[error("failed to stop instance {instance} in {zone}: {source}")]
    Actuation {
        instance: String,
        zone: String,
        #[source]
        source: ProviderError,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopErrorKind {
    Decode,
    Inventory,
    Actuation,
}

impl StopError {
    pub fn kind(&self) -> StopErrorKind {
        match self {
            Self::Envelope(_) | Self::Decode(_) => StopErrorKind::Decode,
            Self::Inventory(_) => StopErrorKind::Inventory,
            Self::Actuation { .. } => StopErrorKind::Actuation,
        }
    }
}

/// Lists labelled instances and stops the ones that are not settled.
pub struct InstanceStopper<'a, C: ComputeInstances + ?Sized> {
    compute: &'a C,
    project: String,
    stop_delay: Duration,
    pause: Box<dyn Fn(Duration) + 'a>,
}

impl<'a, C: ComputeInstances + ?Sized> InstanceStopper<'a, C> {
    pub fn new(compute: &'a C, project: impl Into<String>, stop_delay: Duration) -> Self {
        Self {
            compute,
            project: project.into(),
            stop_delay,
            pause: Box::new(std::thread::sleep),
        }
    }

    /// Replace how the post-stop delay is waited out.
    pub fn with_pause(mut self, pause: impl Fn(Duration) + 'a) -> Self {
        self.pause = Box::new(pause);
        self
    }

    pub fn from_config(compute: &'a C, config: &FunctionConfig) -> Self {
        Self::new(compute, config.project.clone(), config.stop_delay)
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    /// One sequential pass: list, classify each instance in listed order,
    /// stop the unsettled ones. The first failed stop aborts the pass.
    pub fn stop_labelled(
        &self,
        payload: &StopRequestPayload,
        deadline: &Deadline,
    ) -> Result<StopResult, StopError> {
        deadline.check().map_err(StopError::Inventory)?;
        let instances = list_filtered(
            self.compute,
            &self.project,
            &payload.label_key,
            &payload.label_value,
            deadline,
        )
        .map_err(StopError::Inventory)?;
        info!(
            component = "stop_handler",
            event = "instances_listed",
            project = %self.project,
            label_key = %payload.label_key,
            label_value = %payload.label_value,
            count = instances.len(),
        );

        let mut stopped_names = Vec::new();
        let mut already_stopped_names = Vec::new();

        for instance in instances {
            if instance.status.is_settled() {
                debug!(
                    component = "stop_handler",
                    event = "instance_skipped",
                    instance = %instance.name,
                    status = %instance.status,
                );
                already_stopped_names.push(instance.name);
                continue;
            }

            let zone = instance.zone_name().to_string();
            deadline
                .check()
                .and_then(|()| {
                    self.compute
                        .stop_instance(&self.project, &zone, &instance.name, deadline)
                })
                .map_err(|source| StopError::Actuation {
                    instance: instance.name.clone(),
                    zone: zone.clone(),
                    source,
                })?;
            info!(
                component = "stop_handler",
                event = "instance_stop_requested",
                instance = %instance.name,
                zone = %zone,
                status = %instance.status,
            );
            stopped_names.push(instance.name);

            if !self.stop_delay.is_zero() {
                (self.pause)(self.stop_delay);
            }
        }

        Ok(StopResult::from_partition(stopped_names, already_stopped_names))
    }
}
