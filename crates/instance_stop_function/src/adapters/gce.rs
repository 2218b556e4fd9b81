use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::Duration;

use instance_stop_core::filter::InstanceListRequest;
use instance_stop_core::instance::InstanceRecord;
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::Url;
use serde::Deserialize;

use crate::adapters::compute::{ComputeInstances, Deadline, ProviderError};
use crate::config::FunctionConfig;

const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";
const ACCESS_TOKEN_ENV: &str = "GOOGLE_OAUTH_ACCESS_TOKEN";

/// Where bearer tokens come from. Both variants reuse credentials the
/// calling environment already has.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessTokenSource {
    Static(String),
    MetadataServer { url: String },
}

impl AccessTokenSource {
    /// `GOOGLE_OAUTH_ACCESS_TOKEN` when set, otherwise the metadata server.
    pub fn from_env() -> Self {
        match std::env::var(ACCESS_TOKEN_ENV) {
            Ok(token) if !token.trim().is_empty() => Self::Static(token.trim().to_string()),
            _ => Self::MetadataServer {
                url: METADATA_TOKEN_URL.to_string(),
            },
        }
    }

    fn fetch(
        &self,
        client: &Client,
        limit: Duration,
        deadline: &Deadline,
    ) -> Result<String, ProviderError> {
        match self {
            Self::Static(token) => Ok(token.clone()),
            Self::MetadataServer { url } => {
                let credentials = |error: reqwest::Error, limited: bool| {
                    match classify(error, limited, deadline) {
                        ProviderError::Http(error) => ProviderError::Credentials(error.to_string()),
                        other => other,
                    }
                };
                let (budget, limited) = deadline.bound(limit)?;
                let response = client
                    .get(url)
                    .header("Metadata-Flavor", "Google")
                    .timeout(budget)
                    .send()
                    .map_err(|error| credentials(error, limited))?;
                if !response.status().is_success() {
                    return Err(ProviderError::Credentials(format!(
                        "metadata server returned {}",
                        response.status()
                    )));
                }
                let body: MetadataToken =
                    response.json().map_err(|error| credentials(error, limited))?;
                Ok(body.access_token)
            }
        }
    }
}

/// Blocking Compute Engine v1 REST client. Built once per invocation; the
/// access token is fetched on first use and reused for the rest of it.
#[derive(Debug)]
pub struct GceComputeClient {
    client: Client,
    endpoint: String,
    http_timeout: Duration,
    tokens: AccessTokenSource,
    cached_token: Mutex<Option<String>>,
}

impl GceComputeClient {
    pub fn new(config: &FunctionConfig, tokens: AccessTokenSource) -> Result<Self, ProviderError> {
        let client = Client::builder().timeout(config.http_timeout).build()?;
        Ok(Self {
            client,
            endpoint: config.compute_endpoint.trim_end_matches('/').to_string(),
            http_timeout: config.http_timeout,
            tokens,
            cached_token: Mutex::new(None),
        })
    }

    fn access_token(&self, deadline: &Deadline) -> Result<String, ProviderError> {
        let mut cached = self
            .cached_token
            .lock()
            .map_err(|_| ProviderError::Credentials("token cache poisoned".to_string()))?;
        if let Some(token) = cached.as_ref() {
            return Ok(token.clone());
        }
        let token = self.tokens.fetch(&self.client, self.http_timeout, deadline)?;
        *cached = Some(token.clone());
        Ok(token)
    }

    /// Send with a timeout of `http_timeout`, cut short by the deadline.
    /// The same budget covers reading the body.
    fn execute<T>(
        &self,
        request: RequestBuilder,
        deadline: &Deadline,
        read: impl FnOnce(Response) -> Result<T, ProviderError>,
    ) -> Result<T, ProviderError> {
        let (budget, limited) = deadline.bound(self.http_timeout)?;
        let response = request
            .timeout(budget)
            .send()
            .map_err(|error| classify(error, limited, deadline))?;
        read(ensure_success(response)?).map_err(|error| match error {
            ProviderError::Http(error) => classify(error, limited, deadline),
            other => other,
        })
    }

    fn fetch_page(
        &self,
        request: &InstanceListRequest,
        page_token: Option<&str>,
        token: &str,
        deadline: &Deadline,
    ) -> Result<AggregatedInstanceList, ProviderError> {
        let url = aggregated_list_url(&self.endpoint, request, page_token)?;
        self.execute(self.client.get(url).bearer_auth(token), deadline, |response| {
            Ok(response.json()?)
        })
    }
}

impl ComputeInstances for GceComputeClient {
    fn list_instances(
        &self,
        request: &InstanceListRequest,
        deadline: &Deadline,
    ) -> Result<Vec<InstanceRecord>, ProviderError> {
        let token = self.access_token(deadline)?;
        let mut instances = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let page = self.fetch_page(request, page_token.as_deref(), &token, deadline)?;
            page_token = page.next_page_token.clone().filter(|value| !value.is_empty());
            instances.extend(page.into_instances());
            if page_token.is_none() {
                break;
            }
        }

        Ok(instances)
    }

    fn stop_instance(
        &self,
        project: &str,
        zone: &str,
        name: &str,
        deadline: &Deadline,
    ) -> Result<(), ProviderError> {
        let token = self.access_token(deadline)?;
        let url = stop_url(&self.endpoint, project, zone, name)?;
        self.execute(self.client.post(url).bearer_auth(token), deadline, |_| Ok(()))
    }
}

/// A timeout caused by the deadline rather than by `http_timeout` is
/// reported as [`ProviderError::DeadlineExceeded`].
fn classify(error: reqwest::Error, limited: bool, deadline: &Deadline) -> ProviderError {
    if error.is_timeout() && (limited || deadline.check().is_err()) {
        ProviderError::DeadlineExceeded
    } else {
        ProviderError::Http(error)
    }
}

#[derive(Deserialize)]
struct MetadataToken {
    access_token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AggregatedInstanceList {
    #[serde(default)]
    items: BTreeMap<String, InstancesScopedList>,
    next_page_token: Option<String>,
}

impl AggregatedInstanceList {
    /// Scopes that carry only a warning (no instances) contribute nothing.
    fn into_instances(self) -> impl Iterator<Item = InstanceRecord> {
        self.items.into_values().flat_map(|scope| scope.instances)
    }
}

#[derive(Debug, Deserialize)]
struct InstancesScopedList {
    #[serde(default)]
    instances: Vec<InstanceRecord>,
}

#[derive(Deserialize)]
struct GoogleErrorBody {
    error: GoogleError,
}

#[derive(Deserialize)]
struct GoogleError {
    message: String,
}

fn ensure_success(response: Response) -> Result<Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().unwrap_or_default();
    Err(ProviderError::Api {
        status: status.as_u16(),
        message: api_error_message(&body),
    })
}

fn api_error_message(body: &str) -> String {
    serde_json::from_str::<GoogleErrorBody>(body)
        .map(|parsed| parsed.error.message)
        .unwrap_or_else(|_| body.trim().to_string())
}

fn aggregated_list_url(
    endpoint: &str,
    request: &InstanceListRequest,
    page_token: Option<&str>,
) -> Result<Url, ProviderError> {
    let mut url = Url::parse(endpoint).map_err(|error| invalid_url(endpoint, error))?;
    url.path_segments_mut()
        .map_err(|_| invalid_url(endpoint, "cannot be a base"))?
        .pop_if_empty()
        .extend(["compute", "v1", "projects", request.project.as_str(), "aggregated", "instances"]);
    {
        let mut query = url.query_pairs_mut();
        query.append_pair("filter", &request.filter);
        if let Some(token) = page_token {
            query.append_pair("pageToken", token);
        }
    }
    Ok(url)
}

fn stop_url(endpoint: &str, project: &str, zone: &str, name: &str) -> Result<Url, ProviderError> {
    let mut url = Url::parse(endpoint).map_err(|error| invalid_url(endpoint, error))?;
    url.path_segments_mut()
        .map_err(|_| invalid_url(endpoint, "cannot be a base"))?
        .pop_if_empty()
        .extend([
            "compute", "v1", "projects", project, "zones", zone, "instances", name, "stop",
        ]);
    Ok(url)
}

fn invalid_url(endpoint: &str, reason: impl std::fmt::Display) -> ProviderError {
    ProviderError::InvalidEndpoint {
        endpoint: endpoint.to_string(),
        reason: reason.to_string(),
    }
}
