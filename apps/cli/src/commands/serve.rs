//! `polyglot serve`

use anyhow::Result;
use polyglot_core::{Config, server};

/// Execute the serve command.
pub async fn execute(config: &Config) -> Result<()> {
    server::run(config).await?;
    Ok(())
}
