//! Multi-destination publish orchestration
//!
//! This module fans one publish request out to the selected destination
//! adapters concurrently, with retry logic for transient failures, and folds
//! every outcome into a single aggregate report. One destination's failure
//! or slowness never affects its siblings; the report always carries one
//! entry per requested destination, in request order.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use futures::future::join_all;
use tracing::{info, warn};

use crate::config::Config;
use crate::destinations::facebook::FacebookDestination;
use crate::destinations::instagram::InstagramDestination;
use crate::destinations::linkedin::LinkedinDestination;
use crate::destinations::twitter::TwitterDestination;
use crate::destinations::{Capabilities, Destination};
use crate::error::{PublishError, Result};
use crate::media::{MediaItem, ObjectStoreUploader};
use crate::retry::RetryPolicy;
use crate::types::{
    BatchReport, Credential, DestinationId, DestinationResult, PublishRequest,
};

/// Coordinator that owns the destination adapters and the retry policy.
pub struct Dispatcher {
    destinations: HashMap<DestinationId, Arc<dyn Destination>>,
    retry: RetryPolicy,
}

impl Dispatcher {
    /// Build a dispatcher over an explicit set of adapters.
    pub fn new(adapters: Vec<Arc<dyn Destination>>, retry: RetryPolicy) -> Self {
        let destinations = adapters
            .into_iter()
            .map(|adapter| (adapter.id(), adapter))
            .collect();
        Self {
            destinations,
            retry,
        }
    }

    /// Build a dispatcher with every supported destination, configured from
    /// `config`. The object-store capability is only consumed by
    /// destinations that require publicly fetchable media URLs.
    pub fn from_config(config: &Config, uploader: Arc<dyn ObjectStoreUploader>) -> Result<Self> {
        let adapters: Vec<Arc<dyn Destination>> = vec![
            Arc::new(TwitterDestination::new(&config.twitter, &config.http)?),
            Arc::new(FacebookDestination::new(&config.facebook, &config.http)?),
            Arc::new(LinkedinDestination::new(&config.linkedin, &config.http)?),
            Arc::new(InstagramDestination::new(
                &config.instagram,
                &config.http,
                uploader,
            )?),
        ];
        Ok(Self::new(adapters, RetryPolicy::default()))
    }

    /// Replace the retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Static per-destination limits. Pure data, no network calls.
    pub fn capabilities(&self) -> Vec<(DestinationId, Capabilities)> {
        DestinationId::ALL
            .iter()
            .filter_map(|id| {
                self.destinations
                    .get(id)
                    .map(|adapter| (*id, adapter.capabilities()))
            })
            .collect()
    }

    /// Publish one post to a single destination.
    ///
    /// Never returns an error: every failure is folded into a failed
    /// [`DestinationResult`] so multi-destination callers can aggregate
    /// without special cases.
    pub async fn publish_one(
        &self,
        destination: DestinationId,
        content: Option<&str>,
        media: &[MediaItem],
        credential: &Credential,
    ) -> DestinationResult {
        let adapter = match self.destinations.get(&destination) {
            Some(adapter) => adapter,
            None => {
                return DestinationResult::failed(
                    destination,
                    PublishError::validation(format!(
                        "destination '{}' is not configured",
                        destination
                    )),
                );
            }
        };

        // Fail fast on the destination's own limits before any network call;
        // validation failures are permanent, so they bypass the retry loop.
        if let Err(e) = adapter.validate(content, media) {
            warn!(destination = %destination, error = %e, "post failed validation");
            return DestinationResult::failed(destination, e);
        }

        info!(destination = %destination, "publishing");
        let outcome = self
            .retry
            .run(&format!("publish to {}", destination), || {
                adapter.publish(content, media, credential)
            })
            .await;

        match outcome {
            Ok(post_id) => {
                info!(destination = %destination, post_id = %post_id, "published");
                DestinationResult::ok(destination, post_id)
            }
            Err(e) => {
                warn!(destination = %destination, error = %e, "publish failed");
                DestinationResult::failed(destination, e)
            }
        }
    }

    /// Fan a request out to every requested destination concurrently.
    ///
    /// Duplicate destinations collapse to their first occurrence. The
    /// report preserves request order regardless of completion order. The
    /// only error this method itself returns is malformed input, surfaced
    /// before any adapter runs.
    pub async fn publish_many(&self, request: &PublishRequest) -> Result<BatchReport> {
        request.validate()?;

        let mut seen = HashSet::new();
        let ordered: Vec<DestinationId> = request
            .destinations
            .iter()
            .copied()
            .filter(|d| seen.insert(*d))
            .collect();

        let content = request.text();
        let futures: Vec<_> = ordered
            .iter()
            .map(|destination| {
                let destination = *destination;
                async move {
                    match request.credentials.get(&destination) {
                        Some(credential) => {
                            self.publish_one(destination, content, &request.media, credential)
                                .await
                        }
                        None => DestinationResult::failed(
                            destination,
                            PublishError::validation(format!(
                                "no credential supplied for destination '{}'",
                                destination
                            )),
                        ),
                    }
                }
            })
            .collect();

        // join_all preserves input order, which is request order.
        let results = join_all(futures).await;
        let report = BatchReport::from_results(results);
        info!(
            request_id = %request.id,
            succeeded = report.success_count,
            failed = report.failure_count,
            "batch complete"
        );
        Ok(report)
    }
}
