//! LinkedIn destination implementation
//!
//! Every media item goes through the same three-step asset flow: register an
//! upload intent scoped to the media kind and the authoring member, PUT the
//! raw bytes to the returned upload URL, then reference the asset URN from
//! the final ugcPost. No finalize call exists; the asset is usable as soon
//! as the transfer completes.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::classify;
use crate::config::{HttpConfig, LinkedinConfig};
use crate::destinations::{
    build_client, check_character_limit, check_media_sizes, Capabilities, Destination,
};
use crate::error::{PublishError, Result};
use crate::media::{self, MediaItem, MediaSource, SkippedMedia};
use crate::types::{Credential, DestinationId};

const CHARACTER_LIMIT: usize = 3000;
const MAX_MEDIA: usize = 9;
const MAX_IMAGE_BYTES: u64 = 8 * 1024 * 1024;
const MAX_VIDEO_BYTES: u64 = 200 * 1024 * 1024;

const IMAGE_RECIPE: &str = "urn:li:digitalmediaRecipe:feedshare-image";
const VIDEO_RECIPE: &str = "urn:li:digitalmediaRecipe:feedshare-video";
const RESTLI_HEADER: (&str, &str) = ("X-Restli-Protocol-Version", "2.0.0");

pub struct LinkedinDestination {
    client: reqwest::Client,
    api_base: String,
    media_timeout: Duration,
}

#[derive(Debug, Serialize)]
struct RegisterUploadBody<'a> {
    #[serde(rename = "registerUploadRequest")]
    register_upload_request: RegisterUploadRequest<'a>,
}

#[derive(Debug, Serialize)]
struct RegisterUploadRequest<'a> {
    recipes: [&'a str; 1],
    owner: &'a str,
    #[serde(rename = "serviceRelationships")]
    service_relationships: [ServiceRelationship<'a>; 1],
}

#[derive(Debug, Serialize)]
struct ServiceRelationship<'a> {
    #[serde(rename = "relationshipType")]
    relationship_type: &'a str,
    identifier: &'a str,
}

#[derive(Debug, Deserialize)]
struct RegisterUploadResponse {
    value: RegisterUploadValue,
}

#[derive(Debug, Deserialize)]
struct RegisterUploadValue {
    asset: String,
    #[serde(rename = "uploadMechanism")]
    upload_mechanism: UploadMechanism,
}

#[derive(Debug, Deserialize)]
struct UploadMechanism {
    #[serde(rename = "com.linkedin.digitalmedia.uploading.MediaUploadHttpRequest")]
    media_upload: MediaUploadHttpRequest,
}

#[derive(Debug, Deserialize)]
struct MediaUploadHttpRequest {
    #[serde(rename = "uploadUrl")]
    upload_url: String,
}

#[derive(Debug, Deserialize)]
struct ShareResponse {
    id: String,
}

/// The `shareMediaCategory` value for a post's surviving media list.
fn share_category(asset_count: usize, any_video: bool) -> &'static str {
    if asset_count == 0 {
        "NONE"
    } else if any_video {
        "VIDEO"
    } else {
        "IMAGE"
    }
}

/// The ugcPost body, referencing every asset that survived upload.
fn build_share_payload(
    author: &str,
    content: Option<&str>,
    assets: &[String],
    any_video: bool,
) -> serde_json::Value {
    let media_entries: Vec<serde_json::Value> = assets
        .iter()
        .map(|asset| serde_json::json!({ "status": "READY", "media": asset }))
        .collect();

    serde_json::json!({
        "author": author,
        "lifecycleState": "PUBLISHED",
        "specificContent": {
            "com.linkedin.ugc.ShareContent": {
                "shareCommentary": { "text": content.unwrap_or("") },
                "shareMediaCategory": share_category(assets.len(), any_video),
                "media": media_entries,
            }
        },
        "visibility": {
            "com.linkedin.ugc.MemberNetworkVisibility": "PUBLIC"
        }
    })
}

impl LinkedinDestination {
    pub fn new(config: &LinkedinConfig, http: &HttpConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(http)?,
            api_base: config.api_base.clone(),
            media_timeout: http.media_timeout(),
        })
    }

    /// Steps 1 and 2 of the asset flow: register the upload intent, then
    /// transfer the raw bytes. Returns the asset URN, usable immediately.
    async fn upload_asset(
        &self,
        item: &MediaItem,
        author: &str,
        credential: &Credential,
    ) -> std::result::Result<String, PublishError> {
        let context = "linkedin asset registration";

        let recipe = if item.is_video() {
            VIDEO_RECIPE
        } else {
            IMAGE_RECIPE
        };
        let body = RegisterUploadBody {
            register_upload_request: RegisterUploadRequest {
                recipes: [recipe],
                owner: author,
                service_relationships: [ServiceRelationship {
                    relationship_type: "OWNER",
                    identifier: "urn:li:userGeneratedContent",
                }],
            },
        };

        let response = self
            .client
            .post(format!("{}/v2/assets?action=registerUpload", self.api_base))
            .bearer_auth(&credential.access_token)
            .header(RESTLI_HEADER.0, RESTLI_HEADER.1)
            .json(&body)
            .send()
            .await
            .map_err(|e| classify::classify_transport(context, &e))?;

        if !response.status().is_success() {
            return Err(classify::from_response(context, response).await);
        }

        let text = response
            .text()
            .await
            .map_err(|e| classify::classify_transport(context, &e))?;
        let registered: RegisterUploadResponse =
            serde_json::from_str(&text).map_err(|_| classify::invalid_body(context, &text))?;

        let (data, _mime) = match item.source() {
            MediaSource::Bytes { data, mime_type } => (data.clone(), mime_type.clone()),
            MediaSource::Url(url) => {
                media::fetch_remote(&self.client, url, item.kind(), self.media_timeout).await?
            }
        };

        let context = "linkedin binary upload";
        let upload = self
            .client
            .put(&registered.value.upload_mechanism.media_upload.upload_url)
            .bearer_auth(&credential.access_token)
            .body(data)
            .timeout(self.media_timeout)
            .send()
            .await
            .map_err(|e| classify::classify_transport(context, &e))?;

        if !upload.status().is_success() {
            return Err(classify::from_response(context, upload).await);
        }

        Ok(registered.value.asset)
    }
}

#[async_trait]
impl Destination for LinkedinDestination {
    fn id(&self) -> DestinationId {
        DestinationId::Linkedin
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            max_media: MAX_MEDIA,
            max_images: MAX_MEDIA,
            max_videos: MAX_MEDIA,
            allows_mixed_kinds: true,
            requires_media: false,
            character_limit: Some(CHARACTER_LIMIT),
            max_image_bytes: MAX_IMAGE_BYTES,
            max_video_bytes: MAX_VIDEO_BYTES,
        }
    }

    fn validate(&self, content: Option<&str>, media: &[MediaItem]) -> std::result::Result<(), PublishError> {
        if content.is_none() && media.is_empty() {
            return Err(PublishError::validation(
                "a linkedin share needs text or at least one media item",
            ));
        }

        check_character_limit("linkedin", content, CHARACTER_LIMIT)?;

        if media.len() > MAX_MEDIA {
            return Err(PublishError::validation(format!(
                "linkedin shares accept at most {} media items (got {})",
                MAX_MEDIA,
                media.len()
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
        let context = "linkedin publish";
        self.validate(content, media)?;
        let author = credential.require_actor("linkedin author URN")?.to_string();

        let mut assets = Vec::with_capacity(media.len());
        let mut any_video = false;
        let mut skipped: Vec<SkippedMedia> = Vec::new();

        for (index, item) in media.iter().enumerate() {
            match self.upload_asset(item, &author, credential).await {
                Ok(asset) => {
                    any_video |= item.is_video();
                    assets.push(asset);
                }
                Err(e) => {
                    warn!(index, error = %e, "linkedin asset upload failed, skipping item");
                    skipped.push(SkippedMedia {
                        index,
                        reason: e.to_string(),
                    });
                }
            }
        }

        if assets.is_empty() && !media.is_empty() {
            if content.is_none() {
                return Err(PublishError::validation(
                    "no media item survived upload and there is no text to fall back to",
                ));
            }
            warn!("every asset upload failed, sharing text only");
        } else if !skipped.is_empty() {
            debug!(
                attached = assets.len(),
                skipped = skipped.len(),
                "share proceeding without some media"
            );
        }

        let payload = build_share_payload(&author, content, &assets, any_video);

        let response = self
            .client
            .post(format!("{}/v2/ugcPosts", self.api_base))
            .bearer_auth(&credential.access_token)
            .header(RESTLI_HEADER.0, RESTLI_HEADER.1)
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
        let parsed: ShareResponse =
            serde_json::from_str(&body).map_err(|_| classify::invalid_body(context, &body))?;

        Ok(parsed.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn destination() -> LinkedinDestination {
        LinkedinDestination::new(&LinkedinConfig::default(), &HttpConfig::default()).unwrap()
    }

    #[test]
    fn test_capabilities() {
        let caps = destination().capabilities();
        assert_eq!(caps.max_media, 9);
        assert!(caps.allows_mixed_kinds);
        assert!(!caps.requires_media);
        assert_eq!(caps.character_limit, Some(3000));
    }

    #[test]
    fn test_validate_text_only() {
        assert!(destination().validate(Some("hello network"), &[]).is_ok());
    }

    #[test]
    fn test_validate_character_limit() {
        let long = "a".repeat(3001);
        let err = destination().validate(Some(&long), &[]).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
    }

    #[test]
    fn test_validate_mixed_kinds_allowed() {
        let media = vec![
            MediaItem::from_url("https://example.com/a.jpg"),
            MediaItem::from_url("https://example.com/b.mp4"),
        ];
        assert!(destination().validate(Some("hi"), &media).is_ok());
    }

    #[test]
    fn test_validate_too_many_media() {
        let media: Vec<MediaItem> = (0..10)
            .map(|i| MediaItem::from_url(format!("https://example.com/{}.jpg", i)))
            .collect();
        let err = destination().validate(Some("hi"), &media).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
    }

    #[test]
    fn test_share_category() {
        assert_eq!(share_category(0, false), "NONE");
        assert_eq!(share_category(2, false), "IMAGE");
        assert_eq!(share_category(2, true), "VIDEO");
        assert_eq!(share_category(1, true), "VIDEO");
    }

    #[test]
    fn test_share_payload_references_surviving_assets_only() {
        // Three items attempted, the second one's transfer failed: the post
        // body carries exactly the two survivors.
        let assets = vec![
            "urn:li:digitalmediaAsset:one".to_string(),
            "urn:li:digitalmediaAsset:three".to_string(),
        ];
        let payload = build_share_payload("urn:li:person:abc", Some("launch"), &assets, false);

        let media = payload["specificContent"]["com.linkedin.ugc.ShareContent"]["media"]
            .as_array()
            .unwrap();
        assert_eq!(media.len(), 2);
        assert_eq!(media[0]["media"], "urn:li:digitalmediaAsset:one");
        assert_eq!(media[0]["status"], "READY");
        assert_eq!(media[1]["media"], "urn:li:digitalmediaAsset:three");
        assert_eq!(
            payload["specificContent"]["com.linkedin.ugc.ShareContent"]["shareMediaCategory"],
            "IMAGE"
        );
    }

    #[test]
    fn test_share_payload_text_only() {
        let payload = build_share_payload("urn:li:person:abc", Some("just text"), &[], false);
        let share = &payload["specificContent"]["com.linkedin.ugc.ShareContent"];
        assert_eq!(share["shareMediaCategory"], "NONE");
        assert!(share["media"].as_array().unwrap().is_empty());
        assert_eq!(share["shareCommentary"]["text"], "just text");
    }

    #[tokio::test]
    async fn test_publish_requires_author_urn() {
        let err = destination()
            .publish(Some("hi"), &[], &Credential::new("token"))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
        assert!(err.message.contains("author URN"));
    }

    #[test]
    fn test_register_body_shape() {
        let body = RegisterUploadBody {
            register_upload_request: RegisterUploadRequest {
                recipes: [IMAGE_RECIPE],
                owner: "urn:li:person:abc",
                service_relationships: [ServiceRelationship {
                    relationship_type: "OWNER",
                    identifier: "urn:li:userGeneratedContent",
                }],
            },
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(
            json["registerUploadRequest"]["recipes"][0],
            "urn:li:digitalmediaRecipe:feedshare-image"
        );
        assert_eq!(json["registerUploadRequest"]["owner"], "urn:li:person:abc");
        assert_eq!(
            json["registerUploadRequest"]["serviceRelationships"][0]["relationshipType"],
            "OWNER"
        );
    }

    #[test]
    fn test_register_response_parsing() {
        let body = r#"{
            "value": {
                "asset": "urn:li:digitalmediaAsset:C5522AQGTYER3k3ByHQ",
                "uploadMechanism": {
                    "com.linkedin.digitalmedia.uploading.MediaUploadHttpRequest": {
                        "uploadUrl": "https://api.linkedin.com/mediaUpload/C5522/feedshare-uploadedImage/0?ca=vector_feedshare"
                    }
                }
            }
        }"#;
        let parsed: RegisterUploadResponse = serde_json::from_str(body).unwrap();
        assert_eq!(
            parsed.value.asset,
            "urn:li:digitalmediaAsset:C5522AQGTYER3k3ByHQ"
        );
        assert!(parsed
            .value
            .upload_mechanism
            .media_upload
            .upload_url
            .starts_with("https://api.linkedin.com/mediaUpload/"));
    }
}
