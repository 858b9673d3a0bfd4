//! Mock destination implementation for testing
//!
//! A configurable destination that can simulate successes, failures, and
//! slow publishes without credentials or network access. Used by the
//! integration tests to exercise the dispatch logic.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::sleep;

use crate::destinations::{Capabilities, Destination};
use crate::error::PublishError;
use crate::media::MediaItem;
use crate::types::{Credential, DestinationId};

/// One recorded publish call, for verification in tests.
#[derive(Debug, Clone)]
pub struct RecordedPublish {
    pub content: Option<String>,
    pub media_count: usize,
}

/// Mock destination for testing
pub struct MockDestination {
    id: DestinationId,
    post_id: String,
    delay: Duration,
    validate_error: Option<PublishError>,
    publish_error: Option<PublishError>,
    /// Failures to emit before succeeding; `usize::MAX` fails forever.
    fails_remaining: Arc<Mutex<usize>>,
    publish_calls: Arc<Mutex<usize>>,
    published: Arc<Mutex<Vec<RecordedPublish>>>,
}

impl MockDestination {
    /// A destination that always succeeds.
    pub fn success(id: DestinationId) -> Self {
        Self {
            id,
            post_id: format!("{}-post-1", id),
            delay: Duration::ZERO,
            validate_error: None,
            publish_error: None,
            fails_remaining: Arc::new(Mutex::new(0)),
            publish_calls: Arc::new(Mutex::new(0)),
            published: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// A destination whose publish always fails with the given error.
    pub fn failure(id: DestinationId, error: PublishError) -> Self {
        Self {
            publish_error: Some(error),
            fails_remaining: Arc::new(Mutex::new(usize::MAX)),
            ..Self::success(id)
        }
    }

    /// A destination that fails `failures` times, then succeeds.
    pub fn flaky(id: DestinationId, error: PublishError, failures: usize) -> Self {
        Self {
            publish_error: Some(error),
            fails_remaining: Arc::new(Mutex::new(failures)),
            ..Self::success(id)
        }
    }

    /// A destination that rejects every post during validation.
    pub fn invalid(id: DestinationId, error: PublishError) -> Self {
        Self {
            validate_error: Some(error),
            ..Self::success(id)
        }
    }

    /// A destination that succeeds after the given delay.
    pub fn with_delay(id: DestinationId, delay: Duration) -> Self {
        Self {
            delay,
            ..Self::success(id)
        }
    }

    pub fn with_post_id(mut self, post_id: impl Into<String>) -> Self {
        self.post_id = post_id.into();
        self
    }

    /// Number of publish calls made against this destination.
    pub fn publish_calls(&self) -> usize {
        *self.publish_calls.lock().unwrap()
    }

    /// The posts that were successfully published.
    pub fn published(&self) -> Vec<RecordedPublish> {
        self.published.lock().unwrap().clone()
    }

    /// A handle sharing this mock's counters, for asserting after the mock
    /// itself has been moved into a dispatcher.
    pub fn counters(&self) -> (Arc<Mutex<usize>>, Arc<Mutex<Vec<RecordedPublish>>>) {
        (self.publish_calls.clone(), self.published.clone())
    }
}

#[async_trait]
impl Destination for MockDestination {
    fn id(&self) -> DestinationId {
        self.id
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            max_media: 10,
            max_images: 10,
            max_videos: 10,
            allows_mixed_kinds: true,
            requires_media: false,
            character_limit: None,
            max_image_bytes: u64::MAX,
            max_video_bytes: u64::MAX,
        }
    }

    fn validate(&self, _content: Option<&str>, _media: &[MediaItem]) -> Result<(), PublishError> {
        match &self.validate_error {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    async fn publish(
        &self,
        content: Option<&str>,
        media: &[MediaItem],
        _credential: &Credential,
    ) -> Result<String, PublishError> {
        *self.publish_calls.lock().unwrap() += 1;

        if self.delay > Duration::ZERO {
            sleep(self.delay).await;
        }

        if let Some(error) = &self.publish_error {
            let mut remaining = self.fails_remaining.lock().unwrap();
            if *remaining > 0 {
                if *remaining != usize::MAX {
                    *remaining -= 1;
                }
                return Err(error.clone());
            }
        }

        self.published.lock().unwrap().push(RecordedPublish {
            content: content.map(str::to_string),
            media_count: media.len(),
        });

        Ok(self.post_id.clone())
    }
}
