//! MemberPool MCP Server
//!
//! Admin tools for the MemberPool API over stdio. Authenticates with the
//! API's admin key from the environment and exposes tools for:
//! - Viewing the roster and single members
//! - Adding members and bulk CSV imports
//! - Expiring and reverting members

mod client;
mod server;

use anyhow::Result;
use rmcp::ServiceExt;
use server::MemberPoolServer;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // stdout carries the MCP protocol
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("Starting MemberPool MCP server");

    let server = MemberPoolServer::from_env()?;

    let transport = (tokio::io::stdin(), tokio::io::stdout());
    let service = server.serve(transport).await?;

    service.waiting().await?;

    Ok(())
}
