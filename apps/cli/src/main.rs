//! lodebot — character lookup and weekly announcements for a chat community.
//!
//! Resolves game characters through the upstream lookup API and renders a
//! role-bucketed summary. `lodebot run` is the long-lived bot loop.

mod commands;

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
