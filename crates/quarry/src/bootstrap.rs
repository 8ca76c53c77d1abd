//! Obtaining a connection: embedded backends or a remote cluster

use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use quarry_client::{RemoteConnection, StaticDiscovery};
use quarry_common::config::Config;
use quarry_protocol::user::Connection;
use quarry_server::{LocalConnection, LocalServiceSet};

/// A connection plus the embedded backends it may own
pub struct Session {
    connection: Arc<dyn Connection>,
    services: Option<Arc<LocalServiceSet>>,
}

impl Session {
    /// Start `config.local.bits` embedded nodes and connect to them in-process
    pub fn local(config: &Config) -> Self {
        let services = LocalServiceSet::start(&config.local);
        let connection = LocalConnection::new(Arc::clone(&services));

        Self {
            connection: Arc::new(connection),
            services: Some(services),
        }
    }

    /// Connect to a backend found through discovery
    pub async fn remote(config: &Config) -> Result<Self> {
        let discovery = StaticDiscovery::from_config(&config.cluster)?;
        info!("Discovering backends via {:?}", discovery.raw_endpoints());

        let connection = RemoteConnection::connect(&discovery, config.cluster.connect_timeout()).await?;

        Ok(Self {
            connection: Arc::new(connection),
            services: None,
        })
    }

    pub async fn open(config: &Config, local: bool) -> Result<Self> {
        if local {
            Ok(Self::local(config))
        } else {
            Self::remote(config).await
        }
    }

    pub fn connection(&self) -> &Arc<dyn Connection> {
        &self.connection
    }

    pub fn services(&self) -> Option<&Arc<LocalServiceSet>> {
        self.services.as_ref()
    }

    /// Close the connection and stop any embedded nodes
    pub async fn close(self) -> Result<()> {
        let closed = self.connection.close().await;
        if let Some(services) = &self.services {
            services.shutdown();
        }
        closed?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_local_session_owns_nodes() {
        let mut config = Config::default();
        config.local.bits = 2;

        let session = Session::open(&config, true).await.unwrap();
        let services = Arc::clone(session.services().unwrap());
        assert_eq!(services.len(), 2);

        session.close().await.unwrap();
        assert!(services.pick().is_none());
    }

    #[tokio::test]
    async fn test_remote_session_without_backend_fails() {
        let mut config = Config::default();
        config.cluster.connect = "127.0.0.1:1".to_string();
        config.cluster.connect_timeout_ms = 500;

        assert!(Session::open(&config, false).await.is_err());
    }
}
