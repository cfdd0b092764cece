//! Rewrites CSV objects created under a source prefix into a target
//! prefix, driven by S3 event notifications.

pub mod app;
pub mod client;
pub mod conf;
pub mod queue;
pub mod store;
pub mod table;
pub mod trigger;
