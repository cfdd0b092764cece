use anyhow::Result;
use aws_sdk_sqs::types::{DeleteMessageBatchRequestEntry, Message};
use aws_sdk_sqs::Client;
use envy::from_env;
use s3_csv_transformer::conf::QueueSettings;
use s3_csv_transformer::queue::{handle_messages, Backoff, Verdict};
use s3_csv_transformer::{app, client};
use tokio::time::sleep;
use tracing::{info, instrument, warn};

/// Polls an SQS queue for S3 event notifications and rewrites the
/// objects they name.
struct Consumer {
    settings: QueueSettings,
    client: Client,
    backoff: Backoff,
}

impl Consumer {
    /// Delete handled messages. Returns whether the request went
    /// through.
    async fn delete(&self, messages: &[Message]) -> bool {
        info!("Deleting SQS messages");
        let entries = messages
            .iter()
            .map(|message| {
                DeleteMessageBatchRequestEntry::builder()
                    .set_id(message.message_id().map(String::from))
                    .set_receipt_handle(message.receipt_handle().map(String::from))
                    .build()
            })
            .collect();
        let deleted = match self
            .client
            .delete_message_batch()
            .queue_url(&self.settings.sqs_queue_url)
            .set_entries(Some(entries))
            .send()
            .await
        {
            Ok(deleted) => deleted,
            Err(e) => {
                warn!("Couldn't delete SQS messages: {:?}", e);
                return false;
            }
        };
        let failed = deleted.failed().unwrap_or_default().len();
        if failed > 0 {
            warn!(
                "Couldn't delete some SQS messages: {} out of {} weren't deleted",
                failed,
                messages.len()
            );
        }
        true
    }

    /// Receive, handle and settle a single batch of messages, then
    /// wait before the next one.
    #[instrument(skip(self))]
    async fn tick(&mut self) {
        let received = self
            .client
            .receive_message()
            .queue_url(&self.settings.sqs_queue_url)
            .visibility_timeout(self.settings.sqs_visibility_timeout)
            .max_number_of_messages(self.settings.sqs_max_number_of_messages)
            .wait_time_seconds(20)
            .send()
            .await;
        let messages = match received {
            Ok(output) => output.messages().unwrap_or_default().to_vec(),
            Err(e) => {
                warn!("Error while consuming messages from SQS queue: {:?}", e);
                return sleep(self.backoff.fail()).await;
            }
        };

        let verdict = handle_messages(app::current(), &messages, client::current()).await;
        let lapse = match verdict {
            Verdict::Idle => self.backoff.pass(),
            Verdict::Delete => {
                if self.delete(&messages).await {
                    self.backoff.pass()
                } else {
                    self.backoff.fail()
                }
            }
            Verdict::Retain => {
                warn!("SQS messages won't be deleted and will be delivered again");
                self.backoff.fail()
            }
        };
        sleep(lapse).await;
    }
}

/// Consume S3 events delivered through an SQS queue, rewriting each
/// qualifying object. Messages are deleted once all of their events
/// were handled.
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_target(false)
        .without_time()
        .init();
    app::init()?;
    client::init().await?;

    let mut consumer = Consumer {
        settings: from_env()?,
        client: Client::new(&client::aws_service_config().await),
        backoff: Backoff::default(),
    };

    let (stop_processing, mut should_stop) = tokio::sync::oneshot::channel();
    tokio::spawn(async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Couldn't listen for CTRL-C: {:?}", e);
            return;
        }
        info!("CTRL-C");
        let _ = stop_processing.send(());
    });

    loop {
        tokio::select! {
            _ = consumer.tick() => (),
            _ = &mut should_stop => break
        }
    }
    Ok(())
}
