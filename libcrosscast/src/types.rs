//! Core types for Crosscast

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CrosscastError, PublishError, Result};
use crate::media::MediaItem;

/// Identifier of one supported destination network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DestinationId {
    Twitter,
    Facebook,
    Linkedin,
    Instagram,
}

impl DestinationId {
    pub const ALL: [DestinationId; 4] = [
        DestinationId::Twitter,
        DestinationId::Facebook,
        DestinationId::Linkedin,
        DestinationId::Instagram,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DestinationId::Twitter => "twitter",
            DestinationId::Facebook => "facebook",
            DestinationId::Linkedin => "linkedin",
            DestinationId::Instagram => "instagram",
        }
    }
}

impl std::fmt::Display for DestinationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for DestinationId {
    type Err = CrosscastError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "twitter" => Ok(DestinationId::Twitter),
            "facebook" => Ok(DestinationId::Facebook),
            "linkedin" => Ok(DestinationId::Linkedin),
            "instagram" => Ok(DestinationId::Instagram),
            other => Err(CrosscastError::InvalidInput(format!(
                "unknown destination: '{}'. Valid destinations: twitter, facebook, linkedin, instagram",
                other
            ))),
        }
    }
}

/// Credential record for one destination.
///
/// The core consumes these as plain, read-only data; acquiring and storing
/// them belongs to the surrounding application.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credential {
    pub access_token: String,
    /// Destination-specific actor: the facebook page id, the instagram
    /// business-account id, or the linkedin author URN.
    #[serde(default)]
    pub actor_id: Option<String>,
}

impl Credential {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            actor_id: None,
        }
    }

    pub fn with_actor(access_token: impl Into<String>, actor_id: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            actor_id: Some(actor_id.into()),
        }
    }

    /// The actor id, or a validation error naming what is missing.
    pub fn require_actor(&self, what: &str) -> std::result::Result<&str, PublishError> {
        self.actor_id
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                PublishError::validation(format!("credential is missing the {}", what))
            })
    }
}

/// One logical post to fan out to several destinations.
#[derive(Debug, Clone)]
pub struct PublishRequest {
    pub id: String,
    pub content: Option<String>,
    pub media: Vec<MediaItem>,
    pub destinations: Vec<DestinationId>,
    pub credentials: HashMap<DestinationId, Credential>,
    pub created_at: i64,
}

impl PublishRequest {
    pub fn new(
        content: Option<String>,
        media: Vec<MediaItem>,
        destinations: Vec<DestinationId>,
        credentials: HashMap<DestinationId, Credential>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            content,
            media,
            destinations,
            credentials,
            created_at: chrono::Utc::now().timestamp(),
        }
    }

    /// Check the request invariants before any adapter runs.
    ///
    /// Returns `InvalidInput` when the destination set is empty, when both
    /// content and media are empty, or when a requested destination has no
    /// credential record.
    pub fn validate(&self) -> Result<()> {
        if self.destinations.is_empty() {
            return Err(CrosscastError::InvalidInput(
                "at least one destination is required".to_string(),
            ));
        }

        let has_content = self
            .content
            .as_deref()
            .map(|c| !c.trim().is_empty())
            .unwrap_or(false);
        if !has_content && self.media.is_empty() {
            return Err(CrosscastError::InvalidInput(
                "a post needs content or at least one media item".to_string(),
            ));
        }

        for destination in &self.destinations {
            if !self.credentials.contains_key(destination) {
                return Err(CrosscastError::InvalidInput(format!(
                    "no credential supplied for destination '{}'",
                    destination
                )));
            }
        }

        Ok(())
    }

    /// Trimmed content, or `None` when it is empty or whitespace.
    pub fn text(&self) -> Option<&str> {
        self.content
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
    }
}

/// Outcome of publishing to a single destination.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DestinationResult {
    pub destination: DestinationId,
    pub success: bool,
    /// Destination-side post id, present iff `success`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_id: Option<String>,
    /// Classified failure, present iff not `success`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<PublishError>,
}

impl DestinationResult {
    pub fn ok(destination: DestinationId, post_id: impl Into<String>) -> Self {
        Self {
            destination,
            success: true,
            post_id: Some(post_id.into()),
            error: None,
        }
    }

    pub fn failed(destination: DestinationId, error: PublishError) -> Self {
        Self {
            destination,
            success: false,
            post_id: None,
            error: Some(error),
        }
    }
}

/// Aggregate report for one multi-destination publish call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    pub results: Vec<DestinationResult>,
    pub success_count: usize,
    pub failure_count: usize,
}

impl BatchReport {
    pub fn from_results(results: Vec<DestinationResult>) -> Self {
        let success_count = results.iter().filter(|r| r.success).count();
        let failure_count = results.len() - success_count;
        Self {
            results,
            success_count,
            failure_count,
        }
    }

    pub fn any_succeeded(&self) -> bool {
        self.success_count > 0
    }

    pub fn all_failed(&self) -> bool {
        self.success_count == 0 && !self.results.is_empty()
    }
}
