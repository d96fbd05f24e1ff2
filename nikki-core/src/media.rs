//! Binary files kept next to the diary document: the avatar picture and
//! images attached to entries. Both go through the same [`DocumentStore`].

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::Utc;
use rand::seq::SliceRandom;
use serde::Serialize;
use uuid::Uuid;

use crate::config::{AvatarConfig, UploadConfig};
use crate::error::DiaryError;
use crate::models::instant;
use crate::store::{DocumentStore, StoreError};

/// What the avatar endpoint hands back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Avatar {
    #[serde(rename = "url")]
    Url(String),
    /// `data:` URI with the image inlined.
    #[serde(rename = "imageData")]
    Inline(String),
}

#[derive(Clone)]
pub struct AvatarService {
    store: Arc<dyn DocumentStore>,
    config: AvatarConfig,
}

impl AvatarService {
    pub fn new(store: Arc<dyn DocumentStore>, config: AvatarConfig) -> Self {
        Self { store, config }
    }

    pub async fn avatar(&self) -> Result<Avatar, DiaryError> {
        if let Some(url) = self.config.url.as_ref().filter(|u| !u.is_empty()) {
            return Ok(Avatar::Url(url.clone()));
        }

        let path = self
            .config
            .images
            .choose(&mut rand::thread_rng())
            .ok_or_else(|| {
                DiaryError::Store(StoreError::NotFound {
                    key: "avatar".to_string(),
                })
            })?;

        let file = self.store.fetch(path).await?.ok_or_else(|| {
            tracing::warn!(path = %path, "Avatar image missing from store");
            DiaryError::Store(StoreError::NotFound { key: path.clone() })
        })?;

        Ok(Avatar::Inline(format!(
            "data:{};base64,{}",
            mime_for_path(path),
            STANDARD.encode(&file.content)
        )))
    }
}

pub fn mime_for_path(path: &str) -> &'static str {
    let ext = path
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        _ => "image/png",
    }
}

fn extension_for_mime(content_type: Option<&str>) -> &'static str {
    let essence = content_type
        .and_then(|ct| ct.split(';').next())
        .map(|ct| ct.trim().to_ascii_lowercase());
    match essence.as_deref() {
        Some("image/jpeg") | Some("image/jpg") => "jpg",
        Some("image/gif") => "gif",
        Some("image/webp") => "webp",
        _ => "png",
    }
}

/// Stores uploaded images under fresh names and returns their public URL.
#[derive(Clone)]
pub struct ImageUploader {
    store: Arc<dyn DocumentStore>,
    config: UploadConfig,
}

impl ImageUploader {
    pub fn new(store: Arc<dyn DocumentStore>, config: UploadConfig) -> Self {
        Self { store, config }
    }

    pub fn object_path(&self, content_type: Option<&str>) -> String {
        let suffix = Uuid::new_v4().simple().to_string();
        format!(
            "{}/img_{}_{}.{}",
            self.config.directory.trim_end_matches('/'),
            Utc::now().timestamp_millis(),
            &suffix[..8],
            extension_for_mime(content_type)
        )
    }

    pub fn public_url(&self, path: &str) -> String {
        let base = self.config.public_base_url.trim_end_matches('/');
        if base.is_empty() {
            path.to_string()
        } else {
            format!("{base}/{path}")
        }
    }

    pub async fn upload(&self, bytes: &[u8], content_type: Option<&str>) -> Result<String, DiaryError> {
        if bytes.is_empty() {
            return Err(DiaryError::InvalidRequest("image body is empty".to_string()));
        }

        let path = self.object_path(content_type);
        let message = format!("[diary] {} upload image", instant::to_iso(&Utc::now()));
        self.store.put(&path, bytes, None, &message).await?;
        tracing::info!(path = %path, bytes = bytes.len(), "Stored uploaded image");
        Ok(self.public_url(&path))
    }
}
