//! Defines a _trigger_, the input for the handling of a single
//! object. Triggers are built from the records of an S3 event.

use aws_lambda_events::event::s3::{S3Event, S3EventRecord};
use tracing::{instrument, warn};

/// A created object that may need processing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trigger {
    /// The bucket holding the object.
    pub bucket: String,

    /// The object key, already URL-decoded.
    pub key: String,
}

/// Decode an object key as found in S3 event notifications, which
/// are form-encoded (spaces arrive as `+`).
fn decode_key(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    match urlencoding::decode(&spaced) {
        Ok(decoded) => decoded.into_owned(),
        Err(e) => {
            warn!(?e, key = raw, "Couldn't URL-decode object key; using it verbatim");
            raw.to_string()
        }
    }
}

impl Trigger {
    /// Builds a trigger from a single event record, if it names both
    /// a bucket and a key.
    fn from_record(record: &S3EventRecord) -> Option<Self> {
        let bucket = record.s3.bucket.name.as_ref();
        let key = record.s3.object.key.as_ref();
        match (bucket, key) {
            (Some(bucket), Some(key)) => Some(Trigger {
                bucket: bucket.clone(),
                key: decode_key(key),
            }),
            _ => {
                warn!(?bucket, ?key, "Event record lacks a bucket or key; ignoring it");
                None
            }
        }
    }

    /// Builds a vector of triggers from the records inside an S3
    /// event, keeping their order.
    #[instrument(skip(event), fields(records = event.records.len()))]
    pub fn from(event: &S3Event) -> Vec<Self> {
        event.records.iter().filter_map(Self::from_record).collect()
    }
}
