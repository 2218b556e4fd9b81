//! HTTP push endpoint for Pub/Sub triggered invocations.
//!
//! The compute client is blocking, so each invocation runs on the blocking
//! pool and owns its client for the duration of the call.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use instance_stop_core::report::render_summary;
use tracing::error;

use crate::adapters::compute::{ComputeInstances, ProviderError};
use crate::adapters::pubsub::parse_trigger_body;
use crate::config::FunctionConfig;
use crate::handlers::stop::{Deadline, InstanceStopper, StopError, StopErrorKind};
use crate::handlers::trigger::handle_pubsub_message;

pub type ConnectCompute =
    dyn Fn(&FunctionConfig) -> Result<Box<dyn ComputeInstances>, ProviderError> + Send + Sync;

pub struct AppState {
    pub config: FunctionConfig,
    pub connect: Box<ConnectCompute>,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", post(receive_push))
        .route("/healthz", get(healthz))
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

async fn receive_push(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    let deadline = Deadline::from_timeout(state.config.invocation_timeout);
    let outcome = tokio::task::spawn_blocking(move || run_invocation(&state, &body, &deadline)).await;

    match outcome {
        Ok(Ok(summary)) => (StatusCode::OK, summary).into_response(),
        Ok(Err(failure)) => (status_for(failure.kind()), failure.to_string()).into_response(),
        Err(join_error) => {
            error!(
                component = "push_endpoint",
                event = "invocation_panicked",
                error = %join_error,
            );
            (StatusCode::INTERNAL_SERVER_ERROR, "invocation aborted").into_response()
        }
    }
}

fn run_invocation(state: &AppState, body: &[u8], deadline: &Deadline) -> Result<String, StopError> {
    let message = parse_trigger_body(body)
        .map_err(StopError::from)
        .map_err(log_setup_failure)?;
    let compute = (state.connect)(&state.config)
        .map_err(StopError::Inventory)
        .map_err(log_setup_failure)?;
    let stopper = InstanceStopper::from_config(compute.as_ref(), &state.config);
    let result = handle_pubsub_message(&message, &stopper, deadline)?;
    Ok(render_summary(&result))
}

/// Failures before the trigger handler runs, which logs its own.
fn log_setup_failure(failure: StopError) -> StopError {
    error!(
        component = "push_endpoint",
        event = "stop_failed",
        kind = ?failure.kind(),
        error = %failure,
    );
    failure
}

/// Malformed messages are acknowledged with 400 so the push subscription
/// does not redeliver them; provider failures return 500 and are retried.
pub fn status_for(kind: StopErrorKind) -> StatusCode {
    match kind {
        StopErrorKind::Decode => StatusCode::BAD_REQUEST,
        StopErrorKind::Inventory | StopErrorKind::Actuation => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use instance_stop_core::filter::InstanceListRequest;
    use instance_stop_core::instance::{InstanceRecord, InstanceStatus};
    use tower::ServiceExt;

    use super::*;

    struct FixedFleet {
        stops: Arc<Mutex<Vec<String>>>,
    }

    impl ComputeInstances for FixedFleet {
        fn list_instances(
            &self,
            _request: &InstanceListRequest,
            _deadline: &Deadline,
        ) -> Result<Vec<InstanceRecord>, ProviderError> {
            Ok(vec![
                InstanceRecord {
                    name: "A".to_string(),
                    zone: "projects/p/zones/a".to_string(),
                    status: InstanceStatus::Running,
                },
                InstanceRecord {
                    name: "B".to_string(),
                    zone: "projects/p/zones/b".to_string(),
                    status: InstanceStatus::Stopped,
                },
            ])
        }

        fn stop_instance(
            &self,
            _: &str,
            _: &str,
            name: &str,
            _: &Deadline,
        ) -> Result<(), ProviderError> {
            self.stops
                .lock()
                .expect("poisoned mutex")
                .push(name.to_string());
            Ok(())
        }
    }

    fn test_config() -> FunctionConfig {
        FunctionConfig {
            project: "p".to_string(),
            compute_endpoint: "http://unused".to_string(),
            stop_delay: Duration::ZERO,
            http_timeout: Duration::from_secs(1),
            invocation_timeout: None,
            port: 0,
        }
    }

    fn app(stops: Arc<Mutex<Vec<String>>>) -> Router {
        with_connect(Box::new(move |_config: &FunctionConfig| {
            Ok(Box::new(FixedFleet {
                stops: stops.clone(),
            }) as Box<dyn ComputeInstances>)
        }))
    }

    fn with_connect(connect: Box<ConnectCompute>) -> Router {
        router(Arc::new(AppState {
            config: test_config(),
            connect,
        }))
    }

    fn push_request(data: &str) -> Request<Body> {
        let body = format!(
            r#"{{"message":{{"data":"{}","messageId":"1"}},"subscription":"s"}}"#,
            STANDARD.encode(data)
        );
        Request::builder()
            .method("POST")
            .uri("/")
            .header("content-type", "application/json")
            .body(Body::from(body))
            .expect("request should build")
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn push_returns_rendered_summary() {
        let stops = Arc::new(Mutex::new(Vec::new()));
        let response = app(stops.clone())
            .oneshot(push_request(r#"{"labelKey":"env","labelValue":"ci"}"#))
            .await
            .expect("request should complete");

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body should read");
        assert_eq!(&body[..], b"Stopped: 1(A)\n\nAlready stopped: 1(B)\n");
        assert_eq!(*stops.lock().expect("poisoned mutex"), vec!["A".to_string()]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn malformed_payload_is_bad_request() {
        let stops = Arc::new(Mutex::new(Vec::new()));
        let response = app(stops.clone())
            .oneshot(push_request("not json"))
            .await
            .expect("request should complete");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(stops.lock().expect("poisoned mutex").is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn unparseable_body_is_bad_request() {
        let stops = Arc::new(Mutex::new(Vec::new()));
        let response = app(stops.clone())
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/")
                    .body(Body::from("not an envelope"))
                    .expect("request should build"),
            )
            .await
            .expect("request should complete");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(stops.lock().expect("poisoned mutex").is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn client_build_failure_is_retryable() {
        let response = with_connect(Box::new(|_config: &FunctionConfig| {
            Err::<Box<dyn ComputeInstances>, _>(ProviderError::Credentials(
                "metadata server unreachable".to_string(),
            ))
        }))
        .oneshot(push_request(r#"{"labelKey":"env","labelValue":"ci"}"#))
        .await
        .expect("request should complete");

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body should read");
        assert_eq!(
            &body[..],
            b"failed to list instances: failed to obtain access token: metadata server unreachable"
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn healthz_is_ok() {
        let response = app(Arc::new(Mutex::new(Vec::new())))
            .oneshot(
                Request::builder()
                    .uri("/healthz")
                    .body(Body::empty())
                    .expect("request should build"),
            )
            .await
            .expect("request should complete");

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn provider_failures_map_to_retryable_status() {
        assert_eq!(status_for(StopErrorKind::Decode), StatusCode::BAD_REQUEST);
        assert_eq!(
            status_for(StopErrorKind::Inventory),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status_for(StopErrorKind::Actuation),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
