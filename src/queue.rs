//! Handles S3 events delivered as SQS messages, and paces the
//! consumer polling for them.

use crate::app::App;
use crate::store::ObjectStore;
use aws_lambda_events::event::s3::S3Event;
use aws_sdk_sqs::types::Message;
use core::time::Duration;
use std::cmp::min;
use tracing::{info, instrument, warn};

/// The minimum time to wait between polls, in milliseconds.
const BASE_LAPSE_TIME: u64 = 300;

/// The base of the exponential backoff sequence.
const BACKOFF_BASE: u64 = 2;

/// The maximum amount of milliseconds to wait between polls. Set to
/// the equivalent of 20 minutes.
const MAX_SLEEP: u64 = 1200000;

/// What to do with a batch of received messages after handling it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Nothing was received.
    Idle,

    /// Every event was handled (or couldn't be parsed, and never
    /// will); the messages can go.
    Delete,

    /// Some event failed; the messages stay for redelivery.
    Retain,
}

/// Read the body of a message as an S3 event.
fn parse_body(message: &Message) -> Option<S3Event> {
    let body = message.body()?;
    serde_json::from_str(body)
        .map_err(|e| {
            warn!(
                message_id = ?message.message_id(),
                "Couldn't parse the body of SQS message: {:?}", e
            );
            e
        })
        .ok()
}

/// Handle every S3 event carried by the messages. A failing event
/// doesn't prevent the others from being handled.
#[instrument(skip_all, fields(messages = messages.len()))]
pub async fn handle_messages(app: &App, messages: &[Message], store: &dyn ObjectStore) -> Verdict {
    if messages.is_empty() {
        return Verdict::Idle;
    }
    let mut verdict = Verdict::Delete;
    for event in messages.iter().filter_map(parse_body) {
        match app.handle_event(&event, store).await {
            Ok(summary) => info!("{}", summary.body),
            Err(e) => {
                warn!("Error encountered while handling events: {:?}", e);
                verdict = Verdict::Retain;
            }
        }
    }
    verdict
}

/// Exponential backoff between polls, reset on success.
#[derive(Debug, Default)]
pub struct Backoff {
    failures: u32,
}

impl Backoff {
    /// Record a success and get the time to wait.
    pub fn pass(&mut self) -> Duration {
        self.failures = 0;
        Duration::from_millis(BASE_LAPSE_TIME)
    }

    /// Record a failure and get the time to wait, which grows with
    /// consecutive failures.
    pub fn fail(&mut self) -> Duration {
        let lapse = min(
            BASE_LAPSE_TIME.saturating_mul(BACKOFF_BASE.saturating_pow(self.failures)),
            MAX_SLEEP,
        );
        self.failures = self.failures.saturating_add(1);
        Duration::from_millis(lapse)
    }
}
