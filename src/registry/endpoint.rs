//! Static backend service description.

use serde::Serialize;

/// Immutable address and policy for one backend service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceEndpoint {
    /// Unique service name.
    pub name: String,
    pub host: String,
    pub grpc_port: Option<u16>,
    pub http_port: Option<u16>,
    /// A failed initial connection to a required service aborts startup.
    pub required: bool,
    /// Name used in client-facing error messages.
    pub display_name: String,
    pub description: String,
}

impl ServiceEndpoint {
    /// Create an endpoint with both transports and no special policy.
    pub fn new(name: impl Into<String>, host: impl Into<String>, grpc_port: u16, http_port: u16) -> Self {
        let name = name.into();
        Self {
            display_name: name.clone(),
            name,
            host: host.into(),
            grpc_port: Some(grpc_port),
            http_port: Some(http_port),
            required: false,
            description: String::new(),
        }
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = display_name.into();
        self
    }

    /// Drop the RPC transport (HTTP-only backend).
    pub fn without_rpc(mut self) -> Self {
        self.grpc_port = None;
        self
    }

    /// `host:grpc_port`, if the service speaks gRPC.
    pub fn rpc_address(&self) -> Option<String> {
        self.grpc_port.map(|port| format!("{}:{}", self.host, port))
    }

    /// `http://host:http_port`, if the service speaks HTTP.
    pub fn http_base_url(&self) -> Option<String> {
        self.http_port.map(|port| format!("http://{}:{}", self.host, port))
    }
}
