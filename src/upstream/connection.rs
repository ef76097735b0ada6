//! Per-service connection handles.
//!
//! # Responsibilities
//! - Open the long-lived RPC channel for a service
//! - Build the pooled HTTP client for a service
//! - Bound concurrent forwarded requests per service
//!
//! # Design Decisions
//! - RPC channels are lazy; the health probe drives the held channel through
//!   a `grpc.health.v1` check, so readiness reflects the connection in use
//! - The HTTP client carries the forwarding timeouts, probes override them
//! - In-flight requests are capped with a semaphore, waiting when saturated

use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::time;
use tonic::transport::{Channel, Endpoint};
use tonic::Code;
use tonic_health::pb::health_check_response::ServingStatus;
use tonic_health::pb::health_client::HealthClient;
use tonic_health::pb::HealthCheckRequest;
use url::Url;

use crate::config::{GatewayConfig, RpcConfig};
use crate::registry::ServiceEndpoint;
use crate::upstream::{ForwardError, UpstreamRequest, UpstreamResponse};

/// Failure to set up a connection handle.
#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("invalid RPC address for {service}: {source}")]
    RpcAddress {
        service: String,
        #[source]
        source: tonic::transport::Error,
    },

    #[error("invalid HTTP base URL for {service}: {source}")]
    HttpAddress {
        service: String,
        #[source]
        source: url::ParseError,
    },

    #[error("failed to build HTTP client for {service}: {source}")]
    HttpClient {
        service: String,
        #[source]
        source: reqwest::Error,
    },
}

/// Connection settings shared by every handle.
#[derive(Debug, Clone)]
pub struct ConnectionSettings {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub max_connections: usize,
    pub max_idle_connections: usize,
    pub rpc: RpcConfig,
}

impl ConnectionSettings {
    pub fn from_config(config: &GatewayConfig) -> Self {
        Self {
            connect_timeout: Duration::from_secs(config.timeouts.connect_secs),
            request_timeout: Duration::from_secs(config.timeouts.request_secs),
            max_connections: config.http_pool.max_connections,
            max_idle_connections: config.http_pool.max_idle_connections,
            rpc: config.rpc.clone(),
        }
    }
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self::from_config(&GatewayConfig::default())
    }
}

/// Long-lived gRPC channel to one service.
#[derive(Debug, Clone)]
pub struct RpcChannel {
    endpoint: Endpoint,
    channel: Channel,
}

impl RpcChannel {
    /// Configure the channel. No connection is attempted here.
    pub fn open(address: &str, settings: &ConnectionSettings) -> Result<Self, tonic::transport::Error> {
        let rpc = &settings.rpc;
        let endpoint = Endpoint::from_shared(format!("http://{address}"))?
            .connect_timeout(settings.connect_timeout)
            .http2_keep_alive_interval(Duration::from_secs(rpc.keepalive_interval_secs))
            .keep_alive_timeout(Duration::from_secs(rpc.keepalive_timeout_secs))
            .keep_alive_while_idle(rpc.keepalive_while_idle);
        let channel = endpoint.connect_lazy();
        Ok(Self { endpoint, channel })
    }

    /// Check the service over the held channel.
    ///
    /// Services that do not expose the standard health service still count
    /// as ready once they answer, since the channel itself is connected.
    pub async fn ready(&self) -> Result<(), RpcReadyError> {
        let mut client = HealthClient::new(self.channel());
        let request = HealthCheckRequest {
            service: String::new(),
        };
        match client.check(request).await {
            Ok(response) => match response.into_inner().status() {
                ServingStatus::Serving => Ok(()),
                status => Err(RpcReadyError::NotServing(status.as_str_name().to_string())),
            },
            Err(status) if status.code() == Code::Unimplemented => Ok(()),
            Err(status) => Err(RpcReadyError::Status(status.message().to_string())),
        }
    }

    /// Shared channel for generated gRPC clients.
    pub fn channel(&self) -> Channel {
        self.channel.clone()
    }

    pub fn uri(&self) -> String {
        self.endpoint.uri().to_string()
    }
}

/// Why an RPC channel is not ready.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RpcReadyError {
    #[error("service reports {0}")]
    NotServing(String),

    #[error("{0}")]
    Status(String),
}

/// Pooled HTTP client bound to one service's base URL.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    base_url: Url,
    permits: Arc<Semaphore>,
    request_timeout: Duration,
}

impl HttpClient {
    pub fn open(base_url: &str, settings: &ConnectionSettings) -> Result<Self, HttpClientError> {
        let base_url = Url::parse(base_url).map_err(HttpClientError::Url)?;
        let client = reqwest::Client::builder()
            .timeout(settings.request_timeout)
            .connect_timeout(settings.connect_timeout)
            .pool_max_idle_per_host(settings.max_idle_connections)
            .no_proxy()
            .build()
            .map_err(HttpClientError::Build)?;

        Ok(Self {
            client,
            base_url,
            permits: Arc::new(Semaphore::new(settings.max_connections)),
            request_timeout: settings.request_timeout,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Forward a request and buffer the response.
    ///
    /// Waiting for a permit counts against the same request timeout as the
    /// exchange itself.
    pub async fn send(&self, request: UpstreamRequest) -> Result<UpstreamResponse, ForwardError> {
        time::timeout(self.request_timeout, self.exchange(request))
            .await
            .map_err(|_| ForwardError::Timeout)?
    }

    async fn exchange(&self, request: UpstreamRequest) -> Result<UpstreamResponse, ForwardError> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| ForwardError::Transport("connection pool closed".to_string()))?;

        let url = self
            .base_url
            .join(&request.path_and_query)
            .map_err(|e| ForwardError::Transport(e.to_string()))?;

        let response = self
            .client
            .request(request.method, url)
            .headers(request.headers)
            .body(request.body)
            .send()
            .await?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?;

        Ok(UpstreamResponse { status, headers, body })
    }

    /// `GET path` bounded by `timeout`, returning only the status.
    pub async fn get_status(&self, path: &str, timeout: Duration) -> Result<StatusCode, StatusCheckError> {
        let url = self.base_url.join(path).map_err(StatusCheckError::Path)?;
        let response = self
            .client
            .get(url)
            .header("user-agent", "api-gateway-health-check")
            .timeout(timeout)
            .send()
            .await
            .map_err(StatusCheckError::Request)?;
        Ok(response.status())
    }

    /// Refuse new requests; in-flight ones finish.
    pub fn close(&self) {
        self.permits.close();
    }

    pub fn is_closed(&self) -> bool {
        self.permits.is_closed()
    }
}

/// Failure of [`HttpClient::get_status`].
#[derive(Debug, Error)]
pub enum StatusCheckError {
    #[error("invalid health path: {0}")]
    Path(url::ParseError),

    #[error(transparent)]
    Request(reqwest::Error),
}

/// Failure building an [`HttpClient`].
#[derive(Debug, Error)]
pub enum HttpClientError {
    #[error(transparent)]
    Url(url::ParseError),

    #[error(transparent)]
    Build(reqwest::Error),
}

/// RPC channel and HTTP client for one service.
#[derive(Debug)]
pub struct ConnectionHandle {
    service: String,
    rpc: Option<RpcChannel>,
    http: Option<HttpClient>,
}

impl ConnectionHandle {
    /// Open every transport the endpoint declares.
    pub fn open(endpoint: &ServiceEndpoint, settings: &ConnectionSettings) -> Result<Self, ConnectError> {
        let rpc = match endpoint.rpc_address() {
            Some(address) if settings.rpc.enabled => Some(
                RpcChannel::open(&address, settings).map_err(|source| ConnectError::RpcAddress {
                    service: endpoint.name.clone(),
                    source,
                })?,
            ),
            _ => None,
        };

        let http = match endpoint.http_base_url() {
            Some(base_url) => Some(HttpClient::open(&base_url, settings).map_err(|err| match err {
                HttpClientError::Url(source) => ConnectError::HttpAddress {
                    service: endpoint.name.clone(),
                    source,
                },
                HttpClientError::Build(source) => ConnectError::HttpClient {
                    service: endpoint.name.clone(),
                    source,
                },
            })?),
            None => None,
        };

        Ok(Self {
            service: endpoint.name.clone(),
            rpc,
            http,
        })
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn rpc(&self) -> Option<&RpcChannel> {
        self.rpc.as_ref()
    }

    pub fn http(&self) -> Option<&HttpClient> {
        self.http.as_ref()
    }

    /// Stop accepting forwarded requests. The RPC channel closes when the
    /// last clone of it is dropped.
    pub fn close(&self) {
        if let Some(http) = &self.http {
            http.close();
        }
    }
}
