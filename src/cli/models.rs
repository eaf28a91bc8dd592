// src/cli/models.rs — `xeerchat models`

use crate::catalog::render_catalog;
use crate::cli::AppContext;

pub async fn run_models(ctx: &AppContext) -> anyhow::Result<()> {
    let catalog = ctx.backend.models().await?;
    print!("{}", render_catalog(&catalog, &ctx.model()));
    Ok(())
}
