//! docqa CLI — retrieval-augmented question answering over a crawled
//! documentation site.
//!
//! Crawls a documentation site into a chunked, embedded working directory
//! and answers questions grounded in the retrieved chunks.

mod commands;
mod server;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
