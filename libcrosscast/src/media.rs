//! Media descriptors and normalization
//!
//! A [`MediaItem`] is one piece of media attached to a post: either raw bytes
//! with a MIME type, or a remote URL. Destinations that can only ingest
//! publicly fetchable URLs route their items through [`normalize`], which
//! converts bytes to URLs via the external [`ObjectStoreUploader`] capability.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::classify;
use crate::error::PublishError;

const VIDEO_EXTENSIONS: [&str; 5] = ["mp4", "m4v", "mov", "avi", "webm"];

/// The broad kind of a media item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MediaKind::Image => write!(f, "image"),
            MediaKind::Video => write!(f, "video"),
        }
    }
}

/// Where the bytes of a media item live. Exactly one of the two.
#[derive(Clone)]
pub enum MediaSource {
    Bytes { data: Vec<u8>, mime_type: String },
    Url(String),
}

impl std::fmt::Debug for MediaSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MediaSource::Bytes { data, mime_type } => f
                .debug_struct("Bytes")
                .field("len", &data.len())
                .field("mime_type", mime_type)
                .finish(),
            MediaSource::Url(url) => f.debug_tuple("Url").field(url).finish(),
        }
    }
}

/// One piece of media to attach to a post.
///
/// Constructed per request from caller input, immutable afterwards.
#[derive(Debug, Clone)]
pub struct MediaItem {
    source: MediaSource,
    kind: MediaKind,
}

impl MediaItem {
    /// Build an item from raw bytes. The kind is derived from the MIME type.
    pub fn from_bytes(
        data: Vec<u8>,
        mime_type: impl Into<String>,
    ) -> Result<Self, PublishError> {
        let mime_type = mime_type.into();
        let kind = if mime_type.starts_with("image/") {
            MediaKind::Image
        } else if mime_type.starts_with("video/") {
            MediaKind::Video
        } else {
            return Err(PublishError::validation(format!(
                "unsupported media type: {}",
                mime_type
            )));
        };
        Ok(Self {
            source: MediaSource::Bytes { data, mime_type },
            kind,
        })
    }

    /// Build an item from a remote URL. The kind is derived from the URL
    /// extension; unrecognized extensions are treated as images.
    pub fn from_url(url: impl Into<String>) -> Self {
        let url = url.into();
        let kind = kind_from_url(&url);
        Self {
            source: MediaSource::Url(url),
            kind,
        }
    }

    /// Build a URL item with an explicit kind. Used when the kind is already
    /// known and the URL alone would not reveal it (e.g. object-store URLs).
    pub fn from_url_with_kind(url: impl Into<String>, kind: MediaKind) -> Self {
        Self {
            source: MediaSource::Url(url.into()),
            kind,
        }
    }

    pub fn kind(&self) -> MediaKind {
        self.kind
    }

    pub fn is_video(&self) -> bool {
        self.kind == MediaKind::Video
    }

    pub fn source(&self) -> &MediaSource {
        &self.source
    }

    /// The remote URL, if this item has one.
    pub fn url(&self) -> Option<&str> {
        match &self.source {
            MediaSource::Url(url) => Some(url),
            MediaSource::Bytes { .. } => None,
        }
    }
}

/// Derive the media kind from a URL's file extension.
pub fn kind_from_url(url: &str) -> MediaKind {
    let path = url
        .split(['?', '#'])
        .next()
        .unwrap_or(url);
    let ext = path.rsplit('.').next().unwrap_or("").to_lowercase();
    if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
        MediaKind::Video
    } else {
        MediaKind::Image
    }
}

/// External object-storage capability: bytes in, publicly fetchable URL out.
///
/// The implementation lives outside this crate; the orchestrator only depends
/// on the contract.
#[async_trait]
pub trait ObjectStoreUploader: Send + Sync {
    async fn upload(
        &self,
        data: &[u8],
        mime_type: &str,
        kind: MediaKind,
    ) -> Result<String, PublishError>;
}

/// A media item that was dropped during normalization, with the reason.
#[derive(Debug, Clone)]
pub struct SkippedMedia {
    /// Index of the item in the caller-supplied sequence.
    pub index: usize,
    pub reason: String,
}

/// Resolve every item to a publicly fetchable URL.
///
/// URL items pass through unchanged. Bytes items are uploaded through the
/// object-store capability; identical payloads within one call are uploaded
/// once. A failed upload drops that item into the skipped list and the rest
/// of the sequence continues — destinations that need at least one media item
/// re-validate the count afterwards.
pub async fn normalize(
    items: &[MediaItem],
    uploader: &dyn ObjectStoreUploader,
) -> (Vec<MediaItem>, Vec<SkippedMedia>) {
    let mut resolved = Vec::with_capacity(items.len());
    let mut skipped = Vec::new();
    let mut memo: HashMap<[u8; 32], String> = HashMap::new();

    for (index, item) in items.iter().enumerate() {
        match &item.source {
            MediaSource::Url(_) => resolved.push(item.clone()),
            MediaSource::Bytes { data, mime_type } => {
                let digest: [u8; 32] = Sha256::digest(data).into();
                if let Some(url) = memo.get(&digest) {
                    debug!(index, "media payload already uploaded, reusing url");
                    resolved.push(MediaItem::from_url_with_kind(url.clone(), item.kind));
                    continue;
                }
                match uploader.upload(data, mime_type, item.kind).await {
                    Ok(url) => {
                        memo.insert(digest, url.clone());
                        resolved.push(MediaItem::from_url_with_kind(url, item.kind));
                    }
                    Err(e) => {
                        warn!(index, error = %e, "media upload failed, skipping item");
                        skipped.push(SkippedMedia {
                            index,
                            reason: e.to_string(),
                        });
                    }
                }
            }
        }
    }

    (resolved, skipped)
}

/// Fetch a remote media item's bytes, for destinations that ingest binary
/// uploads rather than URLs. Returns the bytes and the MIME type reported by
/// the host (falling back to a kind-appropriate default).
pub(crate) async fn fetch_remote(
    client: &reqwest::Client,
    url: &str,
    kind: MediaKind,
    timeout: Duration,
) -> Result<(Vec<u8>, String), PublishError> {
    let context = "media fetch";
    let response = client
        .get(url)
        .timeout(timeout)
        .send()
        .await
        .map_err(|e| classify::classify_transport(context, &e))?;

    if !response.status().is_success() {
        return Err(classify::from_response(context, response).await);
    }

    let mime_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.split(';').next().unwrap_or(v).trim().to_string())
        .unwrap_or_else(|| match kind {
            MediaKind::Image => "image/jpeg".to_string(),
            MediaKind::Video => "video/mp4".to_string(),
        });

    let data = response
        .bytes()
        .await
        .map_err(|e| classify::classify_transport(context, &e))?
        .to_vec();

    Ok((data, mime_type))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct MockUploader {
        calls: AtomicUsize,
        fail_message: Option<String>,
        uploaded: Mutex<Vec<String>>,
    }

    impl MockUploader {
        fn ok() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail_message: None,
                uploaded: Mutex::new(Vec::new()),
            }
        }

        fn failing(message: &str) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail_message: Some(message.to_string()),
                uploaded: Mutex::new(Vec::new()),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ObjectStoreUploader for MockUploader {
        async fn upload(
            &self,
            _data: &[u8],
            mime_type: &str,
            _kind: MediaKind,
        ) -> Result<String, PublishError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(msg) = &self.fail_message {
                return Err(PublishError::unknown(msg.clone()));
            }
            let url = format!("https://cdn.example.com/{}-{}", n, mime_type.replace('/', "."));
            self.uploaded.lock().unwrap().push(url.clone());
            Ok(url)
        }
    }

    #[test]
    fn test_kind_from_mime_type() {
        let item = MediaItem::from_bytes(vec![1, 2, 3], "image/png").unwrap();
        assert_eq!(item.kind(), MediaKind::Image);

        let item = MediaItem::from_bytes(vec![1, 2, 3], "video/mp4").unwrap();
        assert_eq!(item.kind(), MediaKind::Video);
        assert!(item.is_video());
    }

    #[test]
    fn test_unsupported_mime_type_rejected() {
        let result = MediaItem::from_bytes(vec![1, 2, 3], "application/pdf");
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::Validation);
        assert!(err.message.contains("application/pdf"));
    }

    #[test]
    fn test_kind_from_url_extension() {
        assert_eq!(kind_from_url("https://example.com/a.jpg"), MediaKind::Image);
        assert_eq!(kind_from_url("https://example.com/a.png"), MediaKind::Image);
        assert_eq!(kind_from_url("https://example.com/a.mp4"), MediaKind::Video);
        assert_eq!(kind_from_url("https://example.com/a.MOV"), MediaKind::Video);
        assert_eq!(
            kind_from_url("https://example.com/a.webm?token=abc#frag"),
            MediaKind::Video
        );
        // Unknown extensions default to image.
        assert_eq!(kind_from_url("https://example.com/asset"), MediaKind::Image);
    }

    #[test]
    fn test_url_accessor() {
        let item = MediaItem::from_url("https://example.com/a.jpg");
        assert_eq!(item.url(), Some("https://example.com/a.jpg"));

        let item = MediaItem::from_bytes(vec![0], "image/png").unwrap();
        assert_eq!(item.url(), None);
    }

    #[test]
    fn test_from_url_with_kind_overrides_extension() {
        let item = MediaItem::from_url_with_kind("https://cdn.example.com/blob", MediaKind::Video);
        assert!(item.is_video());
    }

    #[test]
    fn test_source_debug_does_not_dump_bytes() {
        let item = MediaItem::from_bytes(vec![0u8; 4096], "image/png").unwrap();
        let debug = format!("{:?}", item.source());
        assert!(debug.contains("4096"));
        assert!(debug.len() < 100);
    }

    #[tokio::test]
    async fn test_normalize_passes_urls_through() {
        let uploader = MockUploader::ok();
        let items = vec![
            MediaItem::from_url("https://example.com/a.jpg"),
            MediaItem::from_url("https://example.com/b.mp4"),
        ];

        let (resolved, skipped) = normalize(&items, &uploader).await;

        assert_eq!(resolved.len(), 2);
        assert!(skipped.is_empty());
        assert_eq!(uploader.call_count(), 0);
        assert_eq!(resolved[0].url(), Some("https://example.com/a.jpg"));
    }

    #[tokio::test]
    async fn test_normalize_uploads_bytes() {
        let uploader = MockUploader::ok();
        let items = vec![MediaItem::from_bytes(vec![1, 2, 3], "image/png").unwrap()];

        let (resolved, skipped) = normalize(&items, &uploader).await;

        assert_eq!(resolved.len(), 1);
        assert!(skipped.is_empty());
        assert_eq!(uploader.call_count(), 1);
        assert!(resolved[0].url().unwrap().starts_with("https://cdn.example.com/"));
        assert_eq!(resolved[0].kind(), MediaKind::Image);
    }

    #[tokio::test]
    async fn test_normalize_drops_failed_items() {
        let uploader = MockUploader::failing("bucket unavailable");
        let items = vec![
            MediaItem::from_url("https://example.com/a.jpg"),
            MediaItem::from_bytes(vec![1, 2, 3], "image/png").unwrap(),
            MediaItem::from_bytes(vec![4, 5, 6], "video/mp4").unwrap(),
        ];

        let (resolved, skipped) = normalize(&items, &uploader).await;

        // The URL item survives; both bytes items are dropped, not fatal.
        assert_eq!(resolved.len(), 1);
        assert_eq!(skipped.len(), 2);
        assert_eq!(skipped[0].index, 1);
        assert_eq!(skipped[1].index, 2);
        assert!(skipped[0].reason.contains("bucket unavailable"));
    }

    #[tokio::test]
    async fn test_normalize_all_failures_yields_empty_list() {
        let uploader = MockUploader::failing("bucket unavailable");
        let items = vec![
            MediaItem::from_bytes(vec![1], "image/png").unwrap(),
            MediaItem::from_bytes(vec![2], "image/png").unwrap(),
        ];

        let (resolved, skipped) = normalize(&items, &uploader).await;

        assert!(resolved.is_empty());
        assert_eq!(skipped.len(), 2);
    }

    #[tokio::test]
    async fn test_normalize_memoizes_identical_payloads() {
        let uploader = MockUploader::ok();
        let items = vec![
            MediaItem::from_bytes(vec![9, 9, 9], "image/png").unwrap(),
            MediaItem::from_bytes(vec![9, 9, 9], "image/png").unwrap(),
            MediaItem::from_bytes(vec![8, 8, 8], "image/png").unwrap(),
        ];

        let (resolved, skipped) = normalize(&items, &uploader).await;

        assert_eq!(resolved.len(), 3);
        assert!(skipped.is_empty());
        // The duplicate payload reuses the first upload's URL.
        assert_eq!(uploader.call_count(), 2);
        assert_eq!(resolved[0].url(), resolved[1].url());
        assert_ne!(resolved[0].url(), resolved[2].url());
    }

    #[tokio::test]
    async fn test_normalize_preserves_order() {
        let uploader = MockUploader::ok();
        let items = vec![
            MediaItem::from_url("https://example.com/1.jpg"),
            MediaItem::from_bytes(vec![1], "image/png").unwrap(),
            MediaItem::from_url("https://example.com/3.jpg"),
        ];

        let (resolved, _) = normalize(&items, &uploader).await;

        assert_eq!(resolved[0].url(), Some("https://example.com/1.jpg"));
        assert!(resolved[1].url().unwrap().contains("cdn.example.com"));
        assert_eq!(resolved[2].url(), Some("https://example.com/3.jpg"));
    }
}
