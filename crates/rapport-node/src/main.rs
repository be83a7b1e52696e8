//! Rapport Node binary
//!
//! Serves the accounts, connections, and admin HTTP API.

use rapport_node::{NodeConfig, RapportNode};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rapport_node=info,rapport_graph=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Rapport Node");

    let config = NodeConfig::from_env()?;
    let node = RapportNode::new(config)?;
    node.run().await?;

    Ok(())
}
