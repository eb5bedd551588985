//! Chat Summary MCP Server
//!
//! Speaks MCP over stdio. Summaries are produced by the connected client's
//! model through sampling and served back as resources.

use anyhow::{Context, Result};
use clap::Parser;
use rmcp::{ServiceExt, transport::stdio};
use tracing::{error, info};

use chat_summary_mcp::{Options, SummaryServer, structured_logging};

#[derive(Parser)]
#[command(name = "chat-summary-mcp")]
#[command(about = "MCP server that summarizes IDE chat sessions")]
struct Args {
    #[command(flatten)]
    options: Options,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let flush_guard = structured_logging::init_component_tracing(&args.options)
        .context("Failed to initialize logging")?;

    info!("Starting Chat Summary MCP Server");
    let server = SummaryServer::new(args.options.summary_config());
    let summaries = server.summaries().clone();

    // Start the MCP server with stdio transport
    let service = server.serve(stdio()).await.inspect_err(|e| {
        error!("MCP server error: {:?}", e);
    })?;

    info!("Chat Summary MCP Server is ready and listening");

    service.waiting().await?;

    info!("Chat Summary MCP Server shutting down");
    summaries.shutdown();

    std::mem::drop(flush_guard);
    Ok(())
}
