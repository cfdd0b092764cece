use anyhow::{anyhow, Result};
use aws_lambda_events::event::s3::S3Event;
use lambda_runtime::{run, service_fn, LambdaEvent};
use s3_csv_transformer::app::{self, InvocationResult};
use s3_csv_transformer::client;

/// Rewrite every qualifying object named in the S3 event.
async fn function_handler(event: LambdaEvent<S3Event>) -> Result<InvocationResult> {
    app::current()
        .handle_event(&event.payload, client::current())
        .await
}

/// Run an AWS Lambda function that listens to S3 object creation
/// events and copies each CSV object under the source prefix to the
/// target prefix.
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_target(false)
        .without_time()
        .init();
    app::init()?;
    client::init().await?;

    run(service_fn(function_handler))
        .await
        .map_err(|e| anyhow!("{:?}", e))
}
