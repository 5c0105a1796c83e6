#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]

//! Binary entrypoint that wires the Clipforge services together and serves
//! the job-orchestration API.

use anyhow::Result;

/// Bootstraps the Clipforge application and blocks until shutdown.
#[tokio::main]
async fn main() -> Result<()> {
    clipforge_app::run_app().await?;
    Ok(())
}
