//! Asset-related API types
//!

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::VaultError;

pub const DEFAULT_STATUS: &str = "pending";
pub const DESCRIPTION_MAX_LEN: usize = 255;
pub const TAG_MAX_LEN: usize = 100;
pub const STATUS_MAX_LEN: usize = 32;

/// Caller-supplied metadata stored next to the derived image fields.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq, ToSchema)]
pub struct AssetMetadata {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tag1: Option<String>,
    #[serde(default)]
    pub tag2: Option<String>,
    #[serde(default)]
    pub tag3: Option<String>,
    /// Defaults to `pending`
    #[serde(default)]
    pub status: Option<String>,
}

impl AssetMetadata {
    /// Builds metadata the way the upload form supplies it, a category plus a
    /// comma separated tag list. The category wins the first tag slot.
    pub fn from_form(
        description: Option<String>,
        category: Option<String>,
        tags: Option<&str>,
        status: Option<String>,
    ) -> Self {
        let mut tags: Vec<String> = tags
            .unwrap_or_default()
            .split(',')
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();
        if let Some(category) = category.filter(|c| !c.trim().is_empty()) {
            tags.insert(0, category);
        }
        let mut tags = tags.into_iter();

        Self {
            description,
            tag1: tags.next(),
            tag2: tags.next(),
            tag3: tags.next(),
            status,
        }
    }

    /// Cleans every field and rejects anything over its length bound.
    pub fn validated(self) -> Result<Self, VaultError> {
        let status = match clean_field("status", self.status, STATUS_MAX_LEN)? {
            Some(status) => {
                if !status
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
                {
                    return Err(VaultError::Validation(format!(
                        "status '{status}' may only contain letters, digits, '_' and '-'"
                    )));
                }
                status
            }
            None => DEFAULT_STATUS.to_string(),
        };

        Ok(Self {
            description: clean_field("description", self.description, DESCRIPTION_MAX_LEN)?,
            tag1: clean_field("tag1", self.tag1, TAG_MAX_LEN)?,
            tag2: clean_field("tag2", self.tag2, TAG_MAX_LEN)?,
            tag3: clean_field("tag3", self.tag3, TAG_MAX_LEN)?,
            status: Some(status),
        })
    }

    pub fn tags(&self) -> Vec<String> {
        [&self.tag1, &self.tag2, &self.tag3]
            .into_iter()
            .flatten()
            .cloned()
            .collect()
    }
}

/// Strips NUL bytes and surrounding whitespace, empty becomes `None`.
fn clean_field(
    name: &str,
    value: Option<String>,
    max_len: usize,
) -> Result<Option<String>, VaultError> {
    let Some(value) = value else {
        return Ok(None);
    };
    let cleaned = value.replace('\0', "");
    let cleaned = cleaned.trim();
    if cleaned.chars().count() > max_len {
        return Err(VaultError::Validation(format!(
            "{name} exceeds maximum length of {max_len} characters"
        )));
    }
    match cleaned.is_empty() {
        true => Ok(None),
        false => Ok(Some(cleaned.to_string())),
    }
}

/// Asset ids are positive integers assigned by the store.
pub fn validate_id(id: i64) -> Result<i64, VaultError> {
    match id > 0 {
        true => Ok(id),
        false => Err(VaultError::Validation(format!(
            "invalid id {id}: must be a positive integer"
        ))),
    }
}

/// Result of ingesting one image.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq, ToSchema)]
pub struct IngestOutcome {
    pub id: i64,
    /// Width of the original input
    pub width: u32,
    /// Height of the original input
    pub height: u32,
    pub placeholder: String,
    pub thumbnail_size: usize,
    pub full_size: usize,
    pub original_size: usize,
}

/// Asset metadata as served to clients, never carries image bytes.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq, ToSchema)]
pub struct AssetSummary {
    pub id: i64,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub status: String,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub byte_size: Option<i64>,
    pub mime_type: Option<String>,
    /// Null when the store predates placeholders or the row isn't migrated
    #[serde(default)]
    pub placeholder: Option<String>,
    pub view_count: i64,
    pub download_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub thumbnail_url: String,
    pub image_url: String,
}

impl AssetSummary {
    pub fn thumbnail_url(id: i64) -> String {
        format!("/api/v1/images/{id}/thumbnail")
    }

    pub fn image_url(id: i64) -> String {
        format!("/api/v1/images/{id}/file")
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq, ToSchema)]
pub struct AssetPage {
    pub data: Vec<AssetSummary>,
    pub limit: u64,
    pub offset: u64,
    pub total: u64,
}
