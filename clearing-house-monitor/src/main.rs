use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    clearing_house_monitor::run().await?;
    Ok(())
}
