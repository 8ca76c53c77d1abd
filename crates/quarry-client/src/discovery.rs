//! Backend address discovery

use std::net::SocketAddr;

use async_trait::async_trait;
use tracing::debug;

use quarry_common::config::ClusterConfig;
use quarry_common::error::{Error, NetworkError, Result};

/// Resolves the backends a remote connection may use
#[async_trait]
pub trait Discovery: Send + Sync {
    /// Candidate addresses, in preference order
    async fn endpoints(&self) -> Result<Vec<SocketAddr>>;
}

/// Discovery over a fixed list of `host:port` endpoints
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticDiscovery {
    endpoints: Vec<String>,
}

impl StaticDiscovery {
    /// Parse a comma-separated connect string such as `"a:2181,b:2181"`
    pub fn parse(connect: &str) -> Result<Self> {
        let endpoints: Vec<String> = connect
            .split(',')
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .map(String::from)
            .collect();

        if endpoints.is_empty() {
            return Err(NetworkError::AddressResolution(format!(
                "no endpoints in connect string '{}'",
                connect
            ))
            .into());
        }
        if let Some(bad) = endpoints.iter().find(|e| !has_port(e)) {
            return Err(NetworkError::AddressResolution(format!(
                "endpoint '{}' is not host:port",
                bad
            ))
            .into());
        }

        Ok(Self { endpoints })
    }

    /// Build discovery from the cluster section of the configuration
    pub fn from_config(config: &ClusterConfig) -> Result<Self> {
        if config.discovery_method != "static" {
            return Err(Error::Config(format!(
                "Unsupported discovery method: {}",
                config.discovery_method
            )));
        }

        if config.endpoints.is_empty() {
            Self::parse(&config.connect)
        } else {
            Self::parse(&config.endpoints.join(","))
        }
    }

    pub fn raw_endpoints(&self) -> &[String] {
        &self.endpoints
    }
}

#[async_trait]
impl Discovery for StaticDiscovery {
    async fn endpoints(&self) -> Result<Vec<SocketAddr>> {
        let mut resolved = Vec::new();
        for endpoint in &self.endpoints {
            match tokio::net::lookup_host(endpoint.as_str()).await {
                Ok(addrs) => resolved.extend(addrs),
                Err(e) => debug!(%endpoint, error = %e, "Failed to resolve endpoint"),
            }
        }

        if resolved.is_empty() {
            return Err(NetworkError::AddressResolution(format!(
                "none of {} resolved",
                self.endpoints.join(",")
            ))
            .into());
        }

        Ok(resolved)
    }
}

fn has_port(endpoint: &str) -> bool {
    endpoint
        .rsplit_once(':')
        .map_or(false, |(host, port)| !host.is_empty() && port.parse::<u16>().is_ok())
}
