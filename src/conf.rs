//! Defines configuration as read from the environment.

use serde::Deserialize;

/// Default `source_prefix` value.
fn default_source_prefix() -> String {
    String::from("raw/")
}

/// Default `target_prefix` value.
fn default_target_prefix() -> String {
    String::from("processed/")
}

/// Default `sqs_visibility_timeout` value, in seconds.
fn default_sqs_visibility_timeout() -> i32 {
    30
}

/// Default `sqs_max_number_of_messages` value.
fn default_sqs_max_number_of_messages() -> i32 {
    1
}

/// The transformer reads CSV objects created under a prefix, and
/// writes them back under another. The configuration must be given as
/// environment variables.
#[derive(Debug, Deserialize)]
pub struct Settings {
    /// Defines the key prefix of objects that get processed. Events
    /// for keys outside of it are skipped.
    #[serde(default = "default_source_prefix")]
    pub source_prefix: String,

    /// Defines the key prefix that replaces `source_prefix` in the
    /// key of each output object.
    #[serde(default = "default_target_prefix")]
    pub target_prefix: String,

    /// Defines a bucket to receive the outputs. If omitted, it will
    /// be the same bucket as the one in the triggering event. Objects
    /// from this same bucket whose output key would fall back under
    /// `source_prefix` are refused at handling time.
    #[serde(default)]
    pub target_bucket: Option<String>,
}

/// Settings of the SQS consumer, also read from the environment.
#[derive(Debug, Deserialize)]
pub struct QueueSettings {
    /// The queue receiving S3 event notifications.
    pub sqs_queue_url: String,

    #[serde(default = "default_sqs_visibility_timeout")]
    pub sqs_visibility_timeout: i32,

    #[serde(default = "default_sqs_max_number_of_messages")]
    pub sqs_max_number_of_messages: i32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_to_an_empty_environment() {
        let settings: Settings = envy::from_iter(Vec::<(String, String)>::new()).unwrap();
        assert_eq!(settings.source_prefix, "raw/");
        assert_eq!(settings.target_prefix, "processed/");
        assert!(settings.target_bucket.is_none());
    }

    #[test]
    fn variables_override_defaults() {
        let settings: Settings = envy::from_iter(vec![
            (String::from("SOURCE_PREFIX"), String::from("incoming/")),
            (String::from("TARGET_PREFIX"), String::from("clean/")),
            (String::from("TARGET_BUCKET"), String::from("warehouse")),
        ])
        .unwrap();
        assert_eq!(settings.source_prefix, "incoming/");
        assert_eq!(settings.target_prefix, "clean/");
        assert_eq!(settings.target_bucket.as_deref(), Some("warehouse"));
    }

    #[test]
    fn queue_settings_require_a_url() {
        let missing: Result<QueueSettings, _> = envy::from_iter(Vec::<(String, String)>::new());
        assert!(missing.is_err());

        let settings: QueueSettings = envy::from_iter(vec![(
            String::from("SQS_QUEUE_URL"),
            String::from("https://sqs.us-east-1.amazonaws.com/123456789012/uploads"),
        )])
        .unwrap();
        assert_eq!(settings.sqs_visibility_timeout, 30);
        assert_eq!(settings.sqs_max_number_of_messages, 1);
    }

    #[test]
    fn queue_numbers_must_parse() {
        let invalid: Result<QueueSettings, _> = envy::from_iter(vec![
            (String::from("SQS_QUEUE_URL"), String::from("http://localhost/q")),
            (String::from("SQS_VISIBILITY_TIMEOUT"), String::from("soon")),
        ]);
        assert!(invalid.is_err());
    }
}
