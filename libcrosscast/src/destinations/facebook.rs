//! Facebook Page destination implementation
//!
//! Publishing branches on the media shape: a bare feed post for text, a
//! single photos/videos call for one item, and the two-phase album protocol
//! for multiple images (each photo uploaded unpublished, then one feed post
//! referencing all of them). Only a single video per post is accepted.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::classify;
use crate::config::{FacebookConfig, HttpConfig};
use crate::destinations::{
    build_client, check_character_limit, check_media_sizes, count_kinds, Capabilities, Destination,
};
use crate::error::{ErrorKind, PublishError, Result};
use crate::media::{self, MediaItem, MediaSource, SkippedMedia};
use crate::types::{Credential, DestinationId};

const CHARACTER_LIMIT: usize = 63_206;
const MAX_ALBUM_IMAGES: usize = 30;
const MAX_IMAGE_BYTES: u64 = 4 * 1024 * 1024;
const MAX_VIDEO_BYTES: u64 = 1024 * 1024 * 1024;

pub struct FacebookDestination {
    client: reqwest::Client,
    graph_base: String,
    media_timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct FeedResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct PhotoResponse {
    id: String,
    post_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VideoResponse {
    id: String,
}

impl FacebookDestination {
    pub fn new(config: &FacebookConfig, http: &HttpConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(http)?,
            graph_base: config.graph_base.clone(),
            media_timeout: http.media_timeout(),
        })
    }

    async fn send_form<T: DeserializeOwned>(
        &self,
        context: &str,
        url: String,
        params: Vec<(String, String)>,
    ) -> std::result::Result<T, PublishError> {
        let response = self
            .client
            .post(url)
            .form(&params)
            .send()
            .await
            .map_err(|e| classify::classify_transport(context, &e))?;
        self.parse_response(context, response).await
    }

    async fn send_multipart<T: DeserializeOwned>(
        &self,
        context: &str,
        url: String,
        form: reqwest::multipart::Form,
    ) -> std::result::Result<T, PublishError> {
        let response = self
            .client
            .post(url)
            .multipart(form)
            .timeout(self.media_timeout)
            .send()
            .await
            .map_err(|e| classify::classify_transport(context, &e))?;
        self.parse_response(context, response).await
    }

    async fn parse_response<T: DeserializeOwned>(
        &self,
        context: &str,
        response: reqwest::Response,
    ) -> std::result::Result<T, PublishError> {
        if !response.status().is_success() {
            return Err(classify::from_response(context, response).await);
        }
        let body = response
            .text()
            .await
            .map_err(|e| classify::classify_transport(context, &e))?;
        serde_json::from_str(&body).map_err(|_| classify::invalid_body(context, &body))
    }

    /// Bytes of an item plus its MIME type, fetching remote URLs as needed.
    async fn item_bytes(
        &self,
        item: &MediaItem,
    ) -> std::result::Result<(Vec<u8>, String), PublishError> {
        match item.source() {
            MediaSource::Bytes { data, mime_type } => Ok((data.clone(), mime_type.clone())),
            MediaSource::Url(url) => {
                media::fetch_remote(&self.client, url, item.kind(), self.media_timeout).await
            }
        }
    }

    async fn post_feed(
        &self,
        page_id: &str,
        token: &str,
        message: Option<&str>,
        attached: &[String],
    ) -> std::result::Result<String, PublishError> {
        let context = "facebook feed post";
        let mut params = vec![("access_token".to_string(), token.to_string())];
        if let Some(message) = message {
            params.push(("message".to_string(), message.to_string()));
        }
        for (i, media_fbid) in attached.iter().enumerate() {
            params.push((
                format!("attached_media[{}]", i),
                format!(r#"{{"media_fbid":"{}"}}"#, media_fbid),
            ));
        }

        let response: FeedResponse = self
            .send_form(context, format!("{}/{}/feed", self.graph_base, page_id), params)
            .await?;
        Ok(response.id)
    }

    /// Upload one photo. Unpublished photos only get an id for later album
    /// attachment; published ones return the resulting post id.
    async fn post_photo(
        &self,
        page_id: &str,
        token: &str,
        item: &MediaItem,
        caption: Option<&str>,
        published: bool,
    ) -> std::result::Result<String, PublishError> {
        let context = "facebook photo upload";
        let url = format!("{}/{}/photos", self.graph_base, page_id);

        let response: PhotoResponse = match item.url() {
            Some(remote) => {
                let mut params = vec![
                    ("access_token".to_string(), token.to_string()),
                    ("url".to_string(), remote.to_string()),
                    ("published".to_string(), published.to_string()),
                ];
                if let Some(caption) = caption {
                    params.push(("caption".to_string(), caption.to_string()));
                }
                self.send_form(context, url, params).await?
            }
            None => {
                let (data, mime_type) = self.item_bytes(item).await?;
                let part = reqwest::multipart::Part::bytes(data)
                    .file_name("photo")
                    .mime_str(&mime_type)
                    .map_err(|_| {
                        PublishError::validation(format!("invalid MIME type: {}", mime_type))
                    })?;
                let mut form = reqwest::multipart::Form::new()
                    .part("source", part)
                    .text("access_token", token.to_string())
                    .text("published", published.to_string());
                if let Some(caption) = caption {
                    form = form.text("caption", caption.to_string());
                }
                self.send_multipart(context, url, form).await?
            }
        };

        if published {
            Ok(response.post_id.unwrap_or(response.id))
        } else {
            Ok(response.id)
        }
    }

    async fn post_video(
        &self,
        page_id: &str,
        token: &str,
        item: &MediaItem,
        description: Option<&str>,
    ) -> std::result::Result<String, PublishError> {
        let context = "facebook video upload";
        let url = format!("{}/{}/videos", self.graph_base, page_id);

        let response: VideoResponse = match item.url() {
            Some(remote) => {
                let mut params = vec![
                    ("access_token".to_string(), token.to_string()),
                    ("file_url".to_string(), remote.to_string()),
                ];
                if let Some(description) = description {
                    params.push(("description".to_string(), description.to_string()));
                }
                self.send_form(context, url, params).await?
            }
            None => {
                let (data, mime_type) = self.item_bytes(item).await?;
                let part = reqwest::multipart::Part::bytes(data)
                    .file_name("video")
                    .mime_str(&mime_type)
                    .map_err(|_| {
                        PublishError::validation(format!("invalid MIME type: {}", mime_type))
                    })?;
                let mut form = reqwest::multipart::Form::new()
                    .part("source", part)
                    .text("access_token", token.to_string());
                if let Some(description) = description {
                    form = form.text("description", description.to_string());
                }
                self.send_multipart(context, url, form).await?
            }
        };

        Ok(response.id)
    }

    /// Two-phase album: each image uploaded unpublished, then one feed post
    /// referencing every id that made it.
    async fn post_album(
        &self,
        page_id: &str,
        token: &str,
        media: &[MediaItem],
        message: Option<&str>,
    ) -> std::result::Result<String, PublishError> {
        let mut photo_ids = Vec::with_capacity(media.len());
        let mut skipped: Vec<SkippedMedia> = Vec::new();

        for (index, item) in media.iter().enumerate() {
            match self.post_photo(page_id, token, item, None, false).await {
                Ok(id) => photo_ids.push(id),
                Err(e) => {
                    warn!(index, error = %e, "facebook album photo upload failed, skipping item");
                    skipped.push(SkippedMedia {
                        index,
                        reason: e.to_string(),
                    });
                }
            }
        }

        if photo_ids.is_empty() {
            return match message {
                Some(message) => {
                    warn!("every album photo upload failed, degrading to a text-only post");
                    self.post_feed(page_id, token, Some(message), &[]).await
                }
                None => Err(PublishError::validation(
                    "no album photo upload succeeded and there is no text to fall back to",
                )),
            };
        }

        if !skipped.is_empty() {
            debug!(
                attached = photo_ids.len(),
                skipped = skipped.len(),
                "album proceeding without some photos"
            );
        }

        self.post_feed(page_id, token, message, &photo_ids).await
    }
}

/// Swap in page-centric phrasing for throttle and permission failures. The
/// classified kind (and any retry-after hint) stays untouched.
fn rephrase(err: PublishError) -> PublishError {
    match err.kind {
        ErrorKind::RateLimit => PublishError {
            message: format!("Facebook is limiting publishing for this Page ({})", err.message),
            ..err
        },
        ErrorKind::Permission => PublishError {
            message: format!(
                "The connected Facebook account cannot publish to this Page ({})",
                err.message
            ),
            ..err
        },
        _ => err,
    }
}

#[async_trait]
impl Destination for FacebookDestination {
    fn id(&self) -> DestinationId {
        DestinationId::Facebook
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            max_media: MAX_ALBUM_IMAGES,
            max_images: MAX_ALBUM_IMAGES,
            max_videos: 1,
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
                "a facebook post needs text or at least one media item",
            ));
        }

        check_character_limit("facebook", content, CHARACTER_LIMIT)?;

        let (images, videos) = count_kinds(media);
        if videos > 1 {
            return Err(PublishError::validation(
                "facebook accepts only a single video per post",
            ));
        }
        if images > 0 && videos > 0 {
            return Err(PublishError::validation(
                "facebook does not accept photos and a video in the same post",
            ));
        }
        if images > MAX_ALBUM_IMAGES {
            return Err(PublishError::validation(format!(
                "facebook albums accept at most {} photos (got {})",
                MAX_ALBUM_IMAGES, images
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
        self.validate(content, media)?;
        let page_id = credential.require_actor("facebook page id")?;
        let token = credential.access_token.as_str();

        let result = match media {
            [] => self.post_feed(page_id, token, content, &[]).await,
            [item] if item.is_video() => self.post_video(page_id, token, item, content).await,
            [item] => self.post_photo(page_id, token, item, content, true).await,
            items => self.post_album(page_id, token, items, content).await,
        };

        result.map_err(rephrase)
    }
}
