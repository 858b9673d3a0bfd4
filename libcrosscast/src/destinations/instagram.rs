//! Instagram destination implementation
//!
//! The only destination with an asynchronous publish protocol: media must be
//! publicly fetchable URLs, referenced from a server-side container that is
//! polled until processing completes, then published. Multi-image posts
//! build one child container per image plus a parent carousel container.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::classify;
use crate::config::{HttpConfig, InstagramConfig};
use crate::destinations::{
    build_client, check_character_limit, check_media_sizes, count_kinds, Capabilities, Destination,
};
use crate::error::{PublishError, Result};
use crate::media::{self, MediaItem, ObjectStoreUploader};
use crate::types::{Credential, DestinationId};

const CAPTION_LIMIT: usize = 2200;
const MAX_CAROUSEL_IMAGES: usize = 10;
const MAX_IMAGE_BYTES: u64 = 8 * 1024 * 1024;
const MAX_VIDEO_BYTES: u64 = 100 * 1024 * 1024;

pub struct InstagramDestination {
    client: reqwest::Client,
    graph_base: String,
    poll_interval: Duration,
    max_poll_attempts: u32,
    uploader: Arc<dyn ObjectStoreUploader>,
}

/// Processing state of a media container, as reported by the status field.
///
/// A container starts processing as soon as it is created; `Ready` and
/// `Errored` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ContainerState {
    Processing,
    Ready,
    Errored,
}

impl ContainerState {
    fn from_status_code(code: &str) -> Self {
        match code {
            "FINISHED" => ContainerState::Ready,
            "ERROR" | "EXPIRED" => ContainerState::Errored,
            _ => ContainerState::Processing,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ContainerResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    status_code: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PublishResponse {
    id: String,
}

impl InstagramDestination {
    pub fn new(
        config: &InstagramConfig,
        http: &HttpConfig,
        uploader: Arc<dyn ObjectStoreUploader>,
    ) -> Result<Self> {
        Ok(Self {
            client: build_client(http)?,
            graph_base: config.graph_base.clone(),
            poll_interval: config.poll_interval(),
            max_poll_attempts: config.max_poll_attempts,
            uploader,
        })
    }

    async fn graph_post(
        &self,
        context: &str,
        url: String,
        params: Vec<(String, String)>,
    ) -> std::result::Result<String, PublishError> {
        let response = self
            .client
            .post(url)
            .form(&params)
            .send()
            .await
            .map_err(|e| classify::classify_transport(context, &e))?;

        if !response.status().is_success() {
            return Err(classify::from_response(context, response).await);
        }

        response
            .text()
            .await
            .map_err(|e| classify::classify_transport(context, &e))
    }

    /// Create one media container. Child containers of a carousel carry no
    /// caption of their own.
    async fn create_container(
        &self,
        user_id: &str,
        token: &str,
        item: &MediaItem,
        caption: Option<&str>,
        carousel_item: bool,
    ) -> std::result::Result<String, PublishError> {
        let context = "instagram container";
        let url = item.url().ok_or_else(|| {
            PublishError::validation("instagram media must be resolved to a public URL")
        })?;

        let mut params = vec![("access_token".to_string(), token.to_string())];
        if item.is_video() {
            params.push(("media_type".to_string(), "VIDEO".to_string()));
            params.push(("video_url".to_string(), url.to_string()));
        } else {
            params.push(("image_url".to_string(), url.to_string()));
        }
        if carousel_item {
            params.push(("is_carousel_item".to_string(), "true".to_string()));
        } else if let Some(caption) = caption {
            params.push(("caption".to_string(), caption.to_string()));
        }

        let body = self
            .graph_post(context, format!("{}/{}/media", self.graph_base, user_id), params)
            .await?;
        let parsed: ContainerResponse =
            serde_json::from_str(&body).map_err(|_| classify::invalid_body(context, &body))?;
        Ok(parsed.id)
    }

    /// Create the parent container referencing every child of a carousel.
    async fn create_carousel(
        &self,
        user_id: &str,
        token: &str,
        children: &[String],
        caption: Option<&str>,
    ) -> std::result::Result<String, PublishError> {
        let context = "instagram carousel container";
        let mut params = vec![
            ("access_token".to_string(), token.to_string()),
            ("media_type".to_string(), "CAROUSEL".to_string()),
            ("children".to_string(), children.join(",")),
        ];
        if let Some(caption) = caption {
            params.push(("caption".to_string(), caption.to_string()));
        }

        let body = self
            .graph_post(context, format!("{}/{}/media", self.graph_base, user_id), params)
            .await?;
        let parsed: ContainerResponse =
            serde_json::from_str(&body).map_err(|_| classify::invalid_body(context, &body))?;
        Ok(parsed.id)
    }

    async fn check_container(
        &self,
        container_id: &str,
        token: &str,
    ) -> std::result::Result<ContainerState, PublishError> {
        let context = "instagram container status";
        let response = self
            .client
            .get(format!("{}/{}", self.graph_base, container_id))
            .query(&[("fields", "status_code"), ("access_token", token)])
            .send()
            .await
            .map_err(|e| classify::classify_transport(context, &e))?;

        if !response.status().is_success() {
            return Err(classify::from_response(context, response).await);
        }

        let body = response
            .text()
            .await
            .map_err(|e| classify::classify_transport(context, &e))?;
        let parsed: StatusResponse =
            serde_json::from_str(&body).map_err(|_| classify::invalid_body(context, &body))?;

        Ok(parsed
            .status_code
            .as_deref()
            .map(ContainerState::from_status_code)
            .unwrap_or(ContainerState::Processing))
    }

    /// Drive the container state machine until it is ready, errors, or the
    /// attempt budget runs out. Exhaustion falls through to a best-effort
    /// publish rather than failing: the status endpoint being slow or flaky
    /// does not mean the publish itself will fail.
    async fn await_container(
        &self,
        container_id: &str,
        token: &str,
    ) -> std::result::Result<(), PublishError> {
        for attempt in 1..=self.max_poll_attempts {
            match self.check_container(container_id, token).await {
                Ok(ContainerState::Ready) => {
                    debug!(container_id, attempt, "container ready");
                    return Ok(());
                }
                Ok(ContainerState::Errored) => {
                    return Err(PublishError::upstream_invalid(format!(
                        "instagram reported a processing failure for container {}",
                        container_id
                    )));
                }
                Ok(ContainerState::Processing) => {
                    debug!(container_id, attempt, "container still processing");
                }
                Err(e) => {
                    warn!(container_id, attempt, error = %e, "container status check failed");
                }
            }
            if attempt < self.max_poll_attempts {
                sleep(self.poll_interval).await;
            }
        }

        warn!(
            container_id,
            attempts = self.max_poll_attempts,
            "container never reported ready, publishing best-effort"
        );
        Ok(())
    }
}

#[async_trait]
impl Destination for InstagramDestination {
    fn id(&self) -> DestinationId {
        DestinationId::Instagram
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            max_media: MAX_CAROUSEL_IMAGES,
            max_images: MAX_CAROUSEL_IMAGES,
            max_videos: 1,
            allows_mixed_kinds: false,
            requires_media: true,
            character_limit: Some(CAPTION_LIMIT),
            max_image_bytes: MAX_IMAGE_BYTES,
            max_video_bytes: MAX_VIDEO_BYTES,
        }
    }

    fn validate(&self, content: Option<&str>, media: &[MediaItem]) -> std::result::Result<(), PublishError> {
        if media.is_empty() {
            return Err(PublishError::validation(
                "instagram requires at least one media item",
            ));
        }

        check_character_limit("instagram", content, CAPTION_LIMIT)?;

        let (images, videos) = count_kinds(media);
        if images > 0 && videos > 0 {
            return Err(PublishError::validation(
                "instagram does not accept images and video in the same post",
            ));
        }
        if videos > 1 {
            return Err(PublishError::validation(
                "instagram accepts only a single video per post",
            ));
        }
        if images > MAX_CAROUSEL_IMAGES {
            return Err(PublishError::validation(format!(
                "instagram carousels accept at most {} images (got {})",
                MAX_CAROUSEL_IMAGES, images
            )));
        }

        check_media_sizes(media, &self.capabilities())
    }

    async fn publish(
        &self,
        content: Option<&str>,
        media: &[MediaItem],
        credential: &Credential,
    ) -> std::result::Result<String, PublishError> {
        let context = "instagram publish";
        self.validate(content, media)?;
        let user_id = credential.require_actor("instagram account id")?.to_string();
        let token = credential.access_token.as_str();

        // Every item must be publicly fetchable before a container can
        // reference it.
        let (resolved, skipped) = media::normalize(media, self.uploader.as_ref()).await;
        if !skipped.is_empty() {
            debug!(skipped = skipped.len(), "some media items did not normalize");
        }
        if resolved.is_empty() {
            return Err(PublishError::validation(
                "no media item could be resolved to a public URL",
            ));
        }

        let container_id = if resolved.len() == 1 {
            self.create_container(&user_id, token, &resolved[0], content, false)
                .await?
        } else {
            let mut children = Vec::with_capacity(resolved.len());
            let mut survivors = Vec::with_capacity(resolved.len());
            for (index, item) in resolved.iter().enumerate() {
                match self.create_container(&user_id, token, item, None, true).await {
                    Ok(id) => {
                        children.push(id);
                        survivors.push(item);
                    }
                    Err(e) => {
                        warn!(index, error = %e, "carousel child container failed, skipping item");
                    }
                }
            }
            match children.len() {
                0 => {
                    return Err(PublishError::validation(
                        "no carousel item could be staged for publishing",
                    ));
                }
                // A single survivor publishes as a plain post, not a
                // one-item carousel.
                1 => {
                    self.create_container(&user_id, token, survivors[0], content, false)
                        .await?
                }
                _ => {
                    self.create_carousel(&user_id, token, &children, content)
                        .await?
                }
            }
        };

        self.await_container(&container_id, token).await?;

        let body = self
            .graph_post(
                context,
                format!("{}/{}/media_publish", self.graph_base, user_id),
                vec![
                    ("access_token".to_string(), token.to_string()),
                    ("creation_id".to_string(), container_id),
                ],
            )
            .await?;
        let parsed: PublishResponse =
            serde_json::from_str(&body).map_err(|_| classify::invalid_body(context, &body))?;

        Ok(parsed.id)
    }
}
