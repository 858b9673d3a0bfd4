//! Crosscast - publish one post everywhere
//!
//! This library fans a single logical post (text plus optional media) out to
//! multiple content-sharing networks in one call, concurrently, and returns
//! one aggregated per-destination report. Each destination's publishing
//! protocol lives behind a common adapter trait; failures are classified
//! into a uniform taxonomy and never cross from one destination to another.

pub mod classify;
pub mod config;
pub mod destinations;
pub mod dispatch;
pub mod error;
pub mod logging;
pub mod media;
pub mod retry;
pub mod types;

// Re-export commonly used types
pub use config::Config;
pub use dispatch::Dispatcher;
pub use error::{CrosscastError, ErrorKind, PublishError, Result};
pub use media::{MediaItem, MediaKind, ObjectStoreUploader};
pub use retry::RetryPolicy;
pub use types::{BatchReport, Credential, DestinationId, DestinationResult, PublishRequest};
