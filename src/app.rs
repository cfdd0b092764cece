//! Defines the read-only application state and the event handler.

use crate::conf::Settings;
use crate::store::ObjectStore;
use crate::table;
use crate::trigger::Trigger;
use anyhow::{anyhow, bail, Context, Result};
use aws_lambda_events::event::s3::S3Event;
use envy::from_env;
use once_cell::sync::OnceCell;
use serde::Serialize;
use tracing::{info, instrument};

/// The result of handling a single trigger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The object was rewritten under `key`.
    Processed { key: String },

    /// The object lies outside the source prefix.
    Skipped,
}

/// The structured response of an invocation.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct InvocationResult {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    pub body: String,
}

impl InvocationResult {
    fn from_processed(keys: &[String]) -> Self {
        let body = match keys {
            [] => String::from("No files processed"),
            [key] => format!("Processed file saved to {}", key),
            keys => format!("Processed files saved to {}", keys.join(", ")),
        };
        InvocationResult {
            status_code: 200,
            body,
        }
    }
}

/// An App is an initialized application state, derived from
/// settings.
#[derive(Debug)]
pub struct App {
    /// The original settings.
    pub settings: Settings,
}

impl App {
    /// Initialize an App instance given a settings struct. Consumes
    /// the settings struct.
    pub fn new(settings: Settings) -> Result<Self> {
        if settings.target_bucket.is_none()
            && settings.target_prefix.starts_with(&settings.source_prefix)
        {
            bail!(
                "target prefix {:?} lies within source prefix {:?}; \
                 outputs would trigger further processing",
                settings.target_prefix,
                settings.source_prefix
            );
        }
        Ok(App { settings })
    }

    /// The key an object is written to, or `None` if the key lies
    /// outside the source prefix.
    pub fn target_key(&self, key: &str) -> Option<String> {
        key.strip_prefix(&self.settings.source_prefix)
            .map(|rest| format!("{}{}", self.settings.target_prefix, rest))
    }

    /// Handle a single created object.
    #[instrument(skip(self, store))]
    pub async fn handle(&self, trigger: &Trigger, store: &dyn ObjectStore) -> Result<Outcome> {
        let target_key = match self.target_key(&trigger.key) {
            Some(key) => key,
            None => {
                info!(key = %trigger.key, "Skipping key outside source prefix");
                return Ok(Outcome::Skipped);
            }
        };
        let target_bucket = self
            .settings
            .target_bucket
            .as_deref()
            .unwrap_or(&trigger.bucket);
        if target_bucket == trigger.bucket && self.target_key(&target_key).is_some() {
            bail!(
                "output {:?} in bucket {:?} would trigger further processing",
                target_key,
                target_bucket
            );
        }
        info!(key = %trigger.key, "Processing object");

        let body = store.get(&trigger.bucket, &trigger.key).await?;
        let table = table::parse(&body).with_context(|| {
            format!(
                "Failed to parse object {:?} from bucket {:?}",
                trigger.key, trigger.bucket
            )
        })?;
        let output = table.to_bytes().with_context(|| {
            format!("Failed to serialize output for object {:?}", trigger.key)
        })?;

        store.put(target_bucket, &target_key, output).await?;

        info!(key = %target_key, bucket = target_bucket, rows = table.rows.len(), "Object processed");
        Ok(Outcome::Processed { key: target_key })
    }

    /// Handle every record of an S3 event, in order. The first
    /// failure aborts the invocation.
    #[instrument(skip_all)]
    pub async fn handle_event(
        &self,
        event: &S3Event,
        store: &dyn ObjectStore,
    ) -> Result<InvocationResult> {
        let mut processed = Vec::new();
        for trigger in Trigger::from(event) {
            let outcome = self
                .handle(&trigger, store)
                .await
                .with_context(|| format!("Failed to handle {:?}", &trigger))?;
            if let Outcome::Processed { key } = outcome {
                processed.push(key);
            }
        }
        Ok(InvocationResult::from_processed(&processed))
    }
}

/// Global App instance.
static CURRENT: OnceCell<App> = OnceCell::new();

/// Initialize the global App instance.
pub fn init() -> Result<()> {
    let settings = from_env()?;
    let app = App::new(settings)?;
    CURRENT
        .set(app)
        .map_err(|_| anyhow!("app::CURRENT was already initialized"))
}

/// Get the current App instance, or panic if it hasn't been
/// initialized.
pub fn current() -> &'static App {
    CURRENT.get().expect("app is not initialized")
}
