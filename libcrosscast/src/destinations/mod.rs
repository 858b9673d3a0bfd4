//! Destination abstraction and implementations
//!
//! This module provides a unified trait for publishing to the supported
//! content-sharing networks. Each implementation encapsulates one
//! destination's publish protocol: validation, media upload sub-steps, the
//! final publish call, and the shape of its responses.
//!
//! # Examples
//!
//! ```no_run
//! use libcrosscast::config::{HttpConfig, TwitterConfig};
//! use libcrosscast::destinations::{twitter::TwitterDestination, Destination};
//! use libcrosscast::types::Credential;
//!
//! # async fn example() -> libcrosscast::error::Result<()> {
//! let destination = TwitterDestination::new(&TwitterConfig::default(), &HttpConfig::default())?;
//!
//! let caps = destination.capabilities();
//! println!("{} accepts up to {} media items", destination.id(), caps.max_media);
//!
//! let credential = Credential::new("oauth2-user-token");
//! let post_id = destination
//!     .publish(Some("Hello, world!"), &[], &credential)
//!     .await?;
//! println!("Published: {}", post_id);
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use serde::Serialize;

use crate::config::HttpConfig;
use crate::error::PublishError;
use crate::media::{MediaItem, MediaKind};
use crate::types::{Credential, DestinationId};

pub mod facebook;
pub mod instagram;
pub mod linkedin;
pub mod twitter;

// Mock destination is available for all builds (not just tests) to support
// integration tests
pub mod mock;

/// Static publishing limits of one destination. Pure data, no network calls.
#[derive(Debug, Clone, Serialize)]
pub struct Capabilities {
    /// Maximum media items in one post.
    pub max_media: usize,
    /// Maximum image items in one post.
    pub max_images: usize,
    /// Maximum video items in one post.
    pub max_videos: usize,
    /// Whether images and videos may appear in the same post.
    pub allows_mixed_kinds: bool,
    /// Whether a post without media is rejected.
    pub requires_media: bool,
    /// Maximum characters of text, if the destination has a hard limit.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub character_limit: Option<usize>,
    /// Maximum bytes for a single image upload.
    pub max_image_bytes: u64,
    /// Maximum bytes for a single video upload.
    pub max_video_bytes: u64,
}

/// Unified publishing contract implemented by every destination adapter.
///
/// Implementations never panic across this boundary and never abort a
/// sibling destination: all failures come back as a classified
/// [`PublishError`], which the dispatcher folds into a per-destination
/// result.
#[async_trait]
pub trait Destination: Send + Sync {
    /// The destination this adapter publishes to.
    fn id(&self) -> DestinationId;

    /// The destination's static limits.
    fn capabilities(&self) -> Capabilities;

    /// Validate a post against the destination's limits.
    ///
    /// Runs before any network call so malformed posts fail fast with a
    /// `validation`-kind error.
    fn validate(
        &self,
        content: Option<&str>,
        media: &[MediaItem],
    ) -> Result<(), PublishError>;

    /// Execute the destination's publish protocol.
    ///
    /// Returns the destination-side post id. Per-item media failures are
    /// absorbed inside the adapter (logged and skipped); only a failure of
    /// the post itself surfaces as an error.
    async fn publish(
        &self,
        content: Option<&str>,
        media: &[MediaItem],
        credential: &Credential,
    ) -> Result<String, PublishError>;
}

/// Count images and videos in a media sequence.
pub(crate) fn count_kinds(media: &[MediaItem]) -> (usize, usize) {
    let videos = media.iter().filter(|m| m.is_video()).count();
    (media.len() - videos, videos)
}

/// Enforce a destination's character limit.
pub(crate) fn check_character_limit(
    destination: &str,
    content: Option<&str>,
    limit: usize,
) -> Result<(), PublishError> {
    if let Some(content) = content {
        let chars = content.chars().count();
        if chars > limit {
            return Err(PublishError::validation(format!(
                "content exceeds {}'s {} character limit (current: {} characters)",
                destination, limit, chars
            )));
        }
    }
    Ok(())
}

/// Enforce per-item byte-size caps for items whose size is known locally.
pub(crate) fn check_media_sizes(
    media: &[MediaItem],
    caps: &Capabilities,
) -> Result<(), PublishError> {
    for (index, item) in media.iter().enumerate() {
        if let crate::media::MediaSource::Bytes { data, .. } = item.source() {
            let cap = match item.kind() {
                MediaKind::Image => caps.max_image_bytes,
                MediaKind::Video => caps.max_video_bytes,
            };
            if data.len() as u64 > cap {
                return Err(PublishError::validation(format!(
                    "media item {} is {} bytes, over the {} byte {} limit",
                    index,
                    data.len(),
                    cap,
                    item.kind()
                )));
            }
        }
    }
    Ok(())
}

/// Build the shared HTTP client with the configured timeouts.
pub(crate) fn build_client(http: &HttpConfig) -> Result<reqwest::Client, PublishError> {
    reqwest::Client::builder()
        .connect_timeout(http.connect_timeout())
        .timeout(http.request_timeout())
        .build()
        .map_err(|e| PublishError::unknown(format!("failed to build HTTP client: {}", e)))
}
