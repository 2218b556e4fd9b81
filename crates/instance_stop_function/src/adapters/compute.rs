use std::time::{Duration, Instant};

use instance_stop_core::filter::InstanceListRequest;
use instance_stop_core::instance::InstanceRecord;
use thiserror::Error;

/// Failure talking to the compute provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("compute request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("compute API returned {status}: {message}")]
    Api { status: u16, message: String },
    #[error("invalid compute endpoint '{endpoint}': {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },
    #[error("failed to obtain access token: {0}")]
    Credentials(String),
    #[error("invocation deadline exceeded")]
    DeadlineExceeded,
}

/// Wall-clock limit imposed by the triggering transport. Applies to calls
/// that have not started and to calls already in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline(Option<Instant>);

impl Deadline {
    pub fn none() -> Self {
        Self(None)
    }

    pub fn after(timeout: Duration) -> Self {
        Self(Instant::now().checked_add(timeout))
    }

    pub fn at(instant: Instant) -> Self {
        Self(Some(instant))
    }

    pub fn from_timeout(timeout: Option<Duration>) -> Self {
        timeout.map_or_else(Self::none, Self::after)
    }

    pub fn check(&self) -> Result<(), ProviderError> {
        match self.0 {
            Some(deadline) if Instant::now() >= deadline => Err(ProviderError::DeadlineExceeded),
            _ => Ok(()),
        }
    }

    /// Time budget for the next call: `limit`, shortened to what is left of
    /// the deadline. The flag is true when the deadline is the binding bound.
    pub fn bound(&self, limit: Duration) -> Result<(Duration, bool), ProviderError> {
        self.check()?;
        match self.0 {
            Some(deadline) => {
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining < limit {
                    Ok((remaining, true))
                } else {
                    Ok((limit, false))
                }
            }
            None => Ok((limit, false)),
        }
    }
}

/// The two provider capabilities the stopper needs. Implementations must
/// fail with [`ProviderError::DeadlineExceeded`] once `deadline` passes,
/// including while a call is in flight.
pub trait ComputeInstances {
    /// Every instance in the project matching the request filter, flattened
    /// across zone scopes and pages. Scope order is unspecified.
    fn list_instances(
        &self,
        request: &InstanceListRequest,
        deadline: &Deadline,
    ) -> Result<Vec<InstanceRecord>, ProviderError>;

    /// Ask the provider to stop one instance. Returns once the stop
    /// operation is accepted, not when the instance reaches STOPPED.
    fn stop_instance(
        &self,
        project: &str,
        zone: &str,
        name: &str,
        deadline: &Deadline,
    ) -> Result<(), ProviderError>;
}

pub fn list_filtered<C: ComputeInstances + ?Sized>(
    compute: &C,
    project: &str,
    label_key: &str,
    label_value: &str,
    deadline: &Deadline,
) -> Result<Vec<InstanceRecord>, ProviderError> {
    compute.list_instances(
        &InstanceListRequest::for_label(project, label_key, label_value),
        deadline,
    )
}
