use anyhow::{Context, Result};
use s3_csv_transformer::trigger::Trigger;
use s3_csv_transformer::{app, client};
use std::env::var;
use tracing::info;

/// Process a single object named by the `BUCKET` and `KEY`
/// environment variables, as if an event had been received for it.
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_target(false)
        .without_time()
        .init();
    app::init()?;
    client::init().await?;

    let bucket = var("BUCKET").context("BUCKET is required")?;
    let key = var("KEY").context("KEY is required")?;
    let trigger = Trigger { bucket, key };

    let outcome = app::current()
        .handle(&trigger, client::current())
        .await
        .with_context(|| format!("Failed to handle {:?}", &trigger))?;
    info!(?outcome, "Done");

    Ok(())
}
