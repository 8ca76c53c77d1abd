//! `quarry-backend`: serve one backend node over TCP

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic)]

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use quarry::{config, logging, BackendOptions};
use quarry_server::{Node, TcpServer};

#[tokio::main]
async fn main() -> Result<()> {
    let options = BackendOptions::parse();

    let mut config = config::load(options.config.as_deref()).await?;
    if let Some(bind) = options.bind {
        config.server.bind_address = bind;
    }
    logging::init(&config.logging)?;

    let node = Arc::new(Node::new(1, &config.local));
    let server = TcpServer::bind(&config.server.bind_address, Arc::clone(&node)).await?;

    // Handle shutdown gracefully
    let shutdown = async {
        tokio::signal::ctrl_c().await.ok();
        info!("Shutdown signal received");
    };

    tokio::select! {
        result = server.run() => result?,
        () = shutdown => {
            node.stop();
        }
    }

    Ok(())
}
