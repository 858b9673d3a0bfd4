//! Twitter destination implementation
//!
//! Publishing is a single `/2/tweets` call; each media item is first pushed
//! through the synchronous multipart upload endpoint, which returns a media
//! id to reference from the tweet payload. Individual upload failures are
//! skipped, never fatal to the tweet itself.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::classify;
use crate::config::{HttpConfig, TwitterConfig};
use crate::destinations::{
    build_client, check_character_limit, check_media_sizes, count_kinds, Capabilities, Destination,
};
use crate::error::{PublishError, Result};
use crate::media::{self, MediaItem, MediaSource, SkippedMedia};
use crate::types::{Credential, DestinationId};

const CHARACTER_LIMIT: usize = 280;
const MAX_IMAGES: usize = 4;
const MAX_VIDEOS: usize = 1;
const MAX_IMAGE_BYTES: u64 = 5 * 1024 * 1024;
const MAX_VIDEO_BYTES: u64 = 512 * 1024 * 1024;

pub struct TwitterDestination {
    client: reqwest::Client,
    api_base: String,
    upload_base: String,
    media_timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct MediaUploadResponse {
    media_id_string: String,
}

#[derive(Debug, Deserialize)]
struct TweetResponse {
    data: TweetData,
}

#[derive(Debug, Deserialize)]
struct TweetData {
    id: String,
}

impl TwitterDestination {
    pub fn new(config: &TwitterConfig, http: &HttpConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(http)?,
            api_base: config.api_base.clone(),
            upload_base: config.upload_base.clone(),
            media_timeout: http.media_timeout(),
        })
    }

    /// Apply the media-count policy: one video, or up to four images.
    /// Overflow items are dropped silently; mixing kinds never reaches here
    /// because `validate` rejects it.
    fn select_media<'a>(&self, media: &'a [MediaItem]) -> Vec<&'a MediaItem> {
        let (_, videos) = count_kinds(media);
        let (limit, kept): (usize, Vec<&MediaItem>) = if videos > 0 {
            (MAX_VIDEOS, media.iter().take(MAX_VIDEOS).collect())
        } else {
            (MAX_IMAGES, media.iter().take(MAX_IMAGES).collect())
        };
        if media.len() > limit {
            debug!(
                dropped = media.len() - limit,
                "twitter media limit reached, dropping overflow items"
            );
        }
        kept
    }

    /// One synchronous multipart upload; returns the media id to reference
    /// from the tweet.
    async fn upload_media(
        &self,
        item: &MediaItem,
        credential: &Credential,
    ) -> std::result::Result<String, PublishError> {
        let context = "twitter media upload";

        let (data, mime_type) = match item.source() {
            MediaSource::Bytes { data, mime_type } => (data.clone(), mime_type.clone()),
            MediaSource::Url(url) => {
                media::fetch_remote(&self.client, url, item.kind(), self.media_timeout).await?
            }
        };

        let part = reqwest::multipart::Part::bytes(data)
            .file_name("media")
            .mime_str(&mime_type)
            .map_err(|_| {
                PublishError::validation(format!("invalid MIME type: {}", mime_type))
            })?;
        let form = reqwest::multipart::Form::new().part("media", part);

        let response = self
            .client
            .post(format!("{}/1.1/media/upload.json", self.upload_base))
            .bearer_auth(&credential.access_token)
            .multipart(form)
            .timeout(self.media_timeout)
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
        let parsed: MediaUploadResponse =
            serde_json::from_str(&body).map_err(|_| classify::invalid_body(context, &body))?;

        Ok(parsed.media_id_string)
    }
}

#[async_trait]
impl Destination for TwitterDestination {
    fn id(&self) -> DestinationId {
        DestinationId::Twitter
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            max_media: MAX_IMAGES,
            max_images: MAX_IMAGES,
            max_videos: MAX_VIDEOS,
            allows_mixed_kinds: false,
            requires_media: false,
            character_limit: Some(CHARACTER_LIMIT),
            max_image_bytes: MAX_IMAGE_BYTES,
            max_video_bytes: MAX_VIDEO_BYTES,
        }
    }

    fn validate(&self, content: Option<&str>, media: &[MediaItem]) -> std::result::Result<(), PublishError> {
        if content.is_none() && media.is_empty() {
            return Err(PublishError::validation(
                "a tweet needs text or at least one media item",
            ));
        }

        check_character_limit("twitter", content, CHARACTER_LIMIT)?;

        let (images, videos) = count_kinds(media);
        if images > 0 && videos > 0 {
            return Err(PublishError::validation(
                "twitter does not accept images and video in the same tweet",
            ));
        }

        check_media_sizes(media, &self.capabilities())
    }

    async fn publish(
        &self,
        content: Option<&str>,
        media: &[MediaItem],
        credential: &Credential,
    ) -> std::result::Result<String, PublishError> {
        let context = "twitter publish";
        self.validate(content, media)?;

        let selected = self.select_media(media);
        let mut media_ids = Vec::with_capacity(selected.len());
        let mut skipped: Vec<SkippedMedia> = Vec::new();

        for (index, item) in selected.iter().enumerate() {
            match self.upload_media(item, credential).await {
                Ok(id) => media_ids.push(id),
                Err(e) => {
                    warn!(index, error = %e, "twitter media upload failed, skipping item");
                    skipped.push(SkippedMedia {
                        index,
                        reason: e.to_string(),
                    });
                }
            }
        }
        if !skipped.is_empty() {
            debug!(skipped = skipped.len(), "tweet proceeding without some media");
        }

        // Tweets with media may carry empty text; the API wants at least a
        // space in the text field.
        let text = match content {
            Some(text) => text.to_string(),
            None if media_ids.is_empty() => {
                return Err(PublishError::validation(
                    "no text and no media item survived upload",
                ));
            }
            None => " ".to_string(),
        };

        let mut payload = serde_json::json!({ "text": text });
        if !media_ids.is_empty() {
            payload["media"] = serde_json::json!({ "media_ids": media_ids });
        }

        let response = self
            .client
            .post(format!("{}/2/tweets", self.api_base))
            .bearer_auth(&credential.access_token)
            .json(&payload)
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
        let parsed: TweetResponse =
            serde_json::from_str(&body).map_err(|_| classify::invalid_body(context, &body))?;

        Ok(parsed.data.id)
    }
}
