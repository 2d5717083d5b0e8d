use anyhow::Result;
use portier::cli::start;

#[tokio::main]
async fn main() -> Result<()> {
    let action = start()?;

    action.execute().await?;

    Ok(())
}
