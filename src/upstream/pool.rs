//! Connection pool management.
//!
//! # Responsibilities
//! - Open one handle per configured service at startup
//! - Abort startup when a required service cannot be set up
//! - Serve forwarded requests through the service's HTTP client
//! - Close every handle at shutdown, whoever still holds the pool

use std::sync::Arc;

use dashmap::DashMap;

use crate::registry::ServiceEndpoint;
use crate::upstream::connection::{ConnectError, ConnectionHandle, ConnectionSettings};
use crate::upstream::{ForwardError, Upstream, UpstreamRequest, UpstreamResponse};

/// Connection handles keyed by service name. Membership is fixed after
/// construction until [`ConnectionPool::close`] empties it.
#[derive(Debug, Default)]
pub struct ConnectionPool {
    handles: DashMap<String, Arc<ConnectionHandle>>,
}

impl ConnectionPool {
    /// Open handles for every endpoint.
    ///
    /// A required endpoint that fails aborts with its error; other failures
    /// are logged and the service is left without a handle.
    pub fn connect(endpoints: &[ServiceEndpoint], settings: &ConnectionSettings) -> Result<Self, ConnectError> {
        let handles = DashMap::new();

        for endpoint in endpoints {
            match ConnectionHandle::open(endpoint, settings) {
                Ok(handle) => {
                    tracing::info!(
                        service = %endpoint.name,
                        host = %endpoint.host,
                        grpc_port = ?endpoint.grpc_port,
                        http_port = ?endpoint.http_port,
                        "Initialized connection"
                    );
                    handles.insert(endpoint.name.clone(), Arc::new(handle));
                }
                Err(e) if endpoint.required => {
                    tracing::error!(service = %endpoint.name, error = %e, "Failed to connect to required service");
                    return Err(e);
                }
                Err(e) => {
                    tracing::warn!(service = %endpoint.name, error = %e, "Failed to connect, continuing without service");
                }
            }
        }

        Ok(Self { handles })
    }

    pub fn get(&self, service: &str) -> Option<Arc<ConnectionHandle>> {
        self.handles.get(service).map(|h| h.value().clone())
    }

    pub fn has_rpc(&self, service: &str) -> bool {
        self.handles.get(service).is_some_and(|h| h.rpc().is_some())
    }

    pub fn has_http(&self, service: &str) -> bool {
        self.handles.get(service).is_some_and(|h| h.http().is_some())
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Close and remove every handle.
    ///
    /// Requests already holding a handle finish on it; anything forwarded
    /// afterwards fails with [`ForwardError::NoClient`].
    pub fn close(&self) {
        let services: Vec<String> = self.handles.iter().map(|h| h.key().clone()).collect();
        for service in services {
            let Some((service, handle)) = self.handles.remove(&service) else {
                continue;
            };
            handle.close();
            if handle.rpc().is_some() {
                tracing::info!(service = %service, "Closed gRPC channel");
            }
            if handle.http().is_some() {
                tracing::info!(service = %service, "Closed HTTP client");
            }
        }
    }
}

impl Upstream for ConnectionPool {
    async fn forward(&self, service: &str, request: UpstreamRequest) -> Result<UpstreamResponse, ForwardError> {
        let handle = self
            .get(service)
            .ok_or_else(|| ForwardError::NoClient(service.to_string()))?;
        let client = handle
            .http()
            .ok_or_else(|| ForwardError::NoClient(service.to_string()))?;
        client.send(request).await
    }
}
